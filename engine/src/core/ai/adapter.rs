//! Chat Completion Adapter
//!
//! One request/response contract over every chat backend. Fills in the
//! configured defaults, dispatches to the provider chosen by the resolver and,
//! for structured output, decodes the JSON embedded in the reply.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::info;

use super::provider::{ChatMessage, ChatProvider, CompletionRequest, CompletionResponse};
use crate::core::config::ChatSettings;
use crate::core::factory::ProviderFactory;
use crate::core::{CoreError, CoreResult, ProviderId};

/// Normalizes chat calls across providers
pub struct ChatCompletionAdapter {
    factory: Arc<dyn ProviderFactory>,
    defaults: ChatSettings,
}

impl ChatCompletionAdapter {
    pub fn new(factory: Arc<dyn ProviderFactory>, defaults: ChatSettings) -> Self {
        Self { factory, defaults }
    }

    /// Chat defaults applied to requests that leave them unset
    pub fn defaults(&self) -> &ChatSettings {
        &self.defaults
    }

    /// Sends `messages` to `provider` and returns the reply text.
    pub async fn complete(
        &self,
        provider: ProviderId,
        messages: Vec<ChatMessage>,
        model: Option<String>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> CoreResult<String> {
        let mut request = CompletionRequest::new(messages);
        request.model = model;
        request.temperature = temperature;
        request.max_tokens = max_tokens;
        Ok(self.send(provider, request).await?.text)
    }

    /// Sends a fully-formed request. Errors from the provider propagate as-is.
    pub async fn send(
        &self,
        provider: ProviderId,
        request: CompletionRequest,
    ) -> CoreResult<CompletionResponse> {
        let backend = self.factory.chat(provider)?;
        self.send_to(backend.as_ref(), request).await
    }

    /// Sends a request to an already-built backend
    pub async fn send_to(
        &self,
        backend: &dyn ChatProvider,
        mut request: CompletionRequest,
    ) -> CoreResult<CompletionResponse> {
        request.temperature = request.temperature.or(Some(self.defaults.temperature));
        request.max_tokens = request.max_tokens.or(Some(self.defaults.max_tokens));

        let response = backend.complete(request).await?;
        info!(
            "Chat completion from {} ({}): {} chars",
            backend.id(),
            response.model,
            response.text.len()
        );
        Ok(response)
    }

    /// Requests JSON output from `backend` and decodes it into `T`.
    ///
    /// A reply that is not the expected JSON is a `ResponseParseError`, distinct
    /// from the transport failures `send` can return.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        backend: &dyn ChatProvider,
        request: CompletionRequest,
    ) -> CoreResult<T> {
        let response = self.send_to(backend, request.with_json_mode()).await?;
        parse_embedded_json(&backend.id().to_string(), &response.text)
    }
}

/// Decodes JSON that may be wrapped in a markdown code fence or prose.
pub fn parse_embedded_json<T: DeserializeOwned>(provider: &str, text: &str) -> CoreResult<T> {
    if let Ok(value) = serde_json::from_str::<T>(text.trim()) {
        return Ok(value);
    }

    let fenced = if text.contains("```json") {
        text.split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
    } else if text.contains("```") {
        text.split("```").nth(1)
    } else {
        None
    };

    let candidate = match fenced {
        Some(inner) => inner.trim(),
        None => match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => &text[start..=end],
            _ => text.trim(),
        },
    };

    serde_json::from_str(candidate).map_err(|e| {
        CoreError::parse(provider, format!("Reply is not the expected JSON: {}", e))
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::factory::testing::{MockChatProvider, MockFactory};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        ok: bool,
    }

    #[test]
    fn test_parse_embedded_json_variants() {
        let plain: Verdict = parse_embedded_json("xai", r#"{"ok":true}"#).unwrap();
        assert!(plain.ok);

        let fenced: Verdict =
            parse_embedded_json("xai", "Here you go:\n```json\n{\"ok\": false}\n```").unwrap();
        assert!(!fenced.ok);

        let prose: Verdict = parse_embedded_json("xai", "Result: {\"ok\": true} done").unwrap();
        assert!(prose.ok);
    }

    #[test]
    fn test_parse_embedded_json_failure_is_parse_error() {
        let err = parse_embedded_json::<Verdict>("gemini", "no json here").unwrap_err();
        match err {
            CoreError::ResponseParseError { provider, .. } => assert_eq!(provider, "gemini"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_applies_defaults() {
        let chat = Arc::new(MockChatProvider::replying(ProviderId::Xai, "pong"));
        let factory = Arc::new(MockFactory::new().with_chat(chat.clone()));
        let adapter = ChatCompletionAdapter::new(factory, ChatSettings::default());

        let text = adapter
            .complete(ProviderId::Xai, vec![ChatMessage::user("ping")], None, None, None)
            .await
            .unwrap();

        assert_eq!(text, "pong");
        let seen = chat.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].temperature, Some(0.7));
        assert_eq!(seen[0].max_tokens, Some(1000));
        assert!(!seen[0].json_mode);
    }

    #[tokio::test]
    async fn test_complete_json_sets_json_mode() {
        let chat = Arc::new(MockChatProvider::replying(
            ProviderId::OpenAI,
            "```json\n{\"ok\":true}\n```",
        ));
        let adapter =
            ChatCompletionAdapter::new(Arc::new(MockFactory::new()), ChatSettings::default());

        let verdict: Verdict = adapter
            .complete_json(&*chat, CompletionRequest::prompt(None, "judge"))
            .await
            .unwrap();

        assert!(verdict.ok);
        assert!(chat.requests()[0].json_mode);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_credential_missing() {
        let adapter =
            ChatCompletionAdapter::new(Arc::new(MockFactory::new()), ChatSettings::default());
        let err = adapter
            .complete(ProviderId::Gemini, vec![ChatMessage::user("x")], None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::CredentialMissing {
                provider: ProviderId::Gemini
            }
        ));
    }
}
