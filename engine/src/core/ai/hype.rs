//! Hype Remover
//!
//! Rewrites promotional text into neutral, factual language through a chat
//! provider in JSON mode, and reports every replacement it made.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::adapter::ChatCompletionAdapter;
use super::provider::{ChatProvider, CompletionRequest};
use crate::core::{CoreError, CoreResult};

const DEFAULT_CHANGE_CONFIDENCE: f32 = 0.9;
const DEFAULT_HYPE_SCORE: f32 = 0.5;
const DEFAULT_ACCURACY_SCORE: f32 = 0.9;

/// How aggressively hype is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypeStrength {
    Mild,
    #[default]
    Moderate,
    Strong,
}

impl HypeStrength {
    fn system_prompt(&self) -> &'static str {
        match self {
            HypeStrength::Mild => {
                "You are a fact-checking assistant that identifies and tones down mild \
                 exaggerations and marketing hype in text. Maintain the overall message but \
                 replace clearly exaggerated claims with more measured, factual statements. \
                 Only modify phrases that contain obvious hype or exaggeration."
            }
            HypeStrength::Moderate => {
                "You are a balanced fact-checking assistant that identifies and removes \
                 marketing hype and exaggerated claims from text. Replace promotional language \
                 and exaggerated statements with more measured, factual alternatives. Focus on \
                 modifying claims that lack substantiation or use excessive superlatives."
            }
            HypeStrength::Strong => {
                "You are a rigorous fact-checking assistant that aggressively identifies and \
                 removes marketing hype, exaggerations, and unsubstantiated claims from text. \
                 Replace all promotional language, superlatives, and exaggerated claims with \
                 strictly factual, neutral statements. Be thorough in identifying and modifying \
                 any language that makes claims without evidence."
            }
        }
    }
}

impl std::str::FromStr for HypeStrength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mild" => Ok(HypeStrength::Mild),
            "moderate" => Ok(HypeStrength::Moderate),
            "strong" => Ok(HypeStrength::Strong),
            _ => Err(format!("Unknown strength: {}", s)),
        }
    }
}

/// One phrase the model replaced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypeChange {
    pub original: String,
    pub replacement: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_change_confidence")]
    pub confidence: f32,
}

fn default_change_confidence() -> f32 {
    DEFAULT_CHANGE_CONFIDENCE
}
fn default_hype_score() -> f32 {
    DEFAULT_HYPE_SCORE
}
fn default_accuracy_score() -> f32 {
    DEFAULT_ACCURACY_SCORE
}

/// Result of a hype-removal pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypeReport {
    /// Input text, attached after the model replies
    #[serde(default)]
    pub original_text: String,
    pub processed_text: String,
    #[serde(default)]
    pub changes: Vec<HypeChange>,
    #[serde(default = "default_hype_score")]
    pub overall_hype_score: f32,
    #[serde(default = "default_accuracy_score")]
    pub accuracy_score: f32,
}

/// Hype removal over a chat provider
pub struct HypeRemover {
    adapter: Arc<ChatCompletionAdapter>,
}

impl HypeRemover {
    pub fn new(adapter: Arc<ChatCompletionAdapter>) -> Self {
        Self { adapter }
    }

    /// Builds the system prompt for a pass
    pub fn system_prompt(
        strength: HypeStrength,
        custom_terms: &[String],
        context: Option<&str>,
    ) -> String {
        let mut prompt = strength.system_prompt().to_string();

        if !custom_terms.is_empty() {
            let terms = custom_terms
                .iter()
                .map(|t| format!("\"{}\"", t))
                .collect::<Vec<_>>()
                .join(", ");
            prompt.push_str(&format!(
                "\n\nPay special attention to the following terms or phrases that should be \
                 considered as hype: {}.",
                terms
            ));
        }

        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str(&format!(
                "\n\nContext about the text: {}\nUse this context to better understand the \
                 domain and ensure you don't remove legitimate terminology or claims that are \
                 factual within this context.",
                context
            ));
        }

        prompt
    }

    fn user_prompt(text: &str) -> String {
        format!(
            "Process the following text to remove hype and exaggerated claims according to the \
             guidelines. Return a JSON object with the following structure:\n\
             {{\n  \"processed_text\": \"The text with hype removed\",\n  \"changes\": [\n    \
             {{\"original\": \"Original phrase\", \"replacement\": \"Replacement phrase\", \
             \"reason\": \"Reason for replacement\", \"confidence\": 0.95}}\n  ],\n  \
             \"overall_hype_score\": 0.75,\n  \"accuracy_score\": 0.9\n}}\n\
             Scores and confidences are numbers between 0 and 1.\n\nText to process:\n{}",
            text
        )
    }

    /// Removes hype from `text` using `backend`
    pub async fn remove(
        &self,
        text: &str,
        strength: HypeStrength,
        custom_terms: &[String],
        context: Option<&str>,
        backend: &dyn ChatProvider,
    ) -> CoreResult<HypeReport> {
        if text.trim().is_empty() {
            return Err(CoreError::ValidationError("Text is empty".to_string()));
        }

        let request = CompletionRequest::prompt(
            Some(&Self::system_prompt(strength, custom_terms, context)),
            &Self::user_prompt(text),
        )
        .with_temperature(0.2)
        .with_max_tokens(4000);

        let mut report: HypeReport = self.adapter.complete_json(backend, request).await?;
        report.original_text = text.to_string();

        info!(
            "Hype removal via {}: {} changes, hype score {:.2}",
            backend.id(),
            report.changes.len(),
            report.overall_hype_score
        );
        Ok(report)
    }

    /// Records a user's rating of a hype-removal result
    pub fn record_feedback(
        &self,
        original_text: &str,
        processed_text: &str,
        rating: u8,
        comments: Option<&str>,
    ) -> CoreResult<()> {
        if !(1..=5).contains(&rating) {
            return Err(CoreError::ValidationError(format!(
                "Rating must be between 1 and 5, got {}",
                rating
            )));
        }
        info!(
            rating,
            original_len = original_text.len(),
            processed_len = processed_text.len(),
            comments = comments.unwrap_or(""),
            "Hype remover feedback received"
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::provider::ChatRole;
    use crate::core::config::ChatSettings;
    use crate::core::factory::testing::{MockChatProvider, MockFactory};
    use crate::core::ProviderId;

    fn remover(chat: Arc<MockChatProvider>) -> HypeRemover {
        let factory = Arc::new(MockFactory::new().with_chat(chat));
        HypeRemover::new(Arc::new(ChatCompletionAdapter::new(
            factory,
            ChatSettings::default(),
        )))
    }

    #[test]
    fn test_system_prompt_includes_terms_and_context() {
        let prompt = HypeRemover::system_prompt(
            HypeStrength::Strong,
            &["revolutionary".to_string(), "game-changing".to_string()],
            Some("medical device brochure"),
        );
        assert!(prompt.starts_with("You are a rigorous"));
        assert!(prompt.contains("\"revolutionary\", \"game-changing\""));
        assert!(prompt.contains("Context about the text: medical device brochure"));
    }

    #[test]
    fn test_strength_parsing() {
        assert_eq!("MILD".parse::<HypeStrength>().unwrap(), HypeStrength::Mild);
        assert!("extreme".parse::<HypeStrength>().is_err());
        assert_eq!(HypeStrength::default(), HypeStrength::Moderate);
    }

    #[tokio::test]
    async fn test_remove_fills_defaults_and_original_text() {
        let reply = r#"{
            "processed_text": "A capable phone.",
            "changes": [{"original": "revolutionary", "replacement": "capable", "reason": "superlative"}]
        }"#;
        let chat = Arc::new(MockChatProvider::replying(ProviderId::Xai, reply));
        let remover = remover(chat.clone());

        let report = remover
            .remove(
                "A revolutionary phone.",
                HypeStrength::Moderate,
                &[],
                None,
                &*chat,
            )
            .await
            .unwrap();

        assert_eq!(report.original_text, "A revolutionary phone.");
        assert_eq!(report.processed_text, "A capable phone.");
        assert_eq!(report.changes[0].confidence, 0.9);
        assert_eq!(report.overall_hype_score, 0.5);
        assert_eq!(report.accuracy_score, 0.9);

        let request = &chat.requests()[0];
        assert!(request.json_mode);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert!(request.messages[1].content.ends_with("A revolutionary phone."));
    }

    #[tokio::test]
    async fn test_remove_rejects_non_json_reply() {
        let chat = Arc::new(MockChatProvider::replying(ProviderId::Xai, "Sorry, I can't."));
        let err = remover(chat.clone())
            .remove("Best ever!", HypeStrength::Mild, &[], None, &*chat)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ResponseParseError { .. }));
    }

    #[test]
    fn test_feedback_rating_bounds() {
        let chat = Arc::new(MockChatProvider::replying(ProviderId::Xai, "{}"));
        let remover = remover(chat);
        assert!(remover.record_feedback("a", "b", 5, None).is_ok());
        assert!(remover.record_feedback("a", "b", 0, Some("bad")).is_err());
    }
}
