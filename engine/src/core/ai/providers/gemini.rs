//! Google Gemini Chat Provider
//!
//! Gemini accepts only two roles in `contents`. Every non-user message,
//! system prompts included, is sent in the `model` role.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ProviderConfig;
use crate::core::ai::provider::{ChatProvider, ChatRole, CompletionRequest, CompletionResponse};
use crate::core::http;
use crate::core::{CoreError, CoreResult, ProviderId};

// =============================================================================
// Gemini Provider
// =============================================================================

/// Google Gemini API provider
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    default_model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Creates a new Gemini provider
    pub fn new(config: ProviderConfig) -> CoreResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(CoreError::CredentialMissing {
                provider: ProviderId::Gemini,
            });
        }
        let client = http::build_client(config.timeout_secs)?;
        Ok(Self::with_client(config, client))
    }

    /// Creates a provider sharing an existing HTTP client
    pub fn with_client(config: ProviderConfig, client: reqwest::Client) -> Self {
        Self {
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_model: config.model,
            client,
        }
    }

    fn gemini_role(role: ChatRole) -> &'static str {
        match role {
            ChatRole::User => "user",
            ChatRole::Assistant | ChatRole::System => "model",
        }
    }

    fn build_generate_content_request(
        &self,
        request: &CompletionRequest,
    ) -> CoreResult<GenerateContentRequest> {
        if request.messages.is_empty() {
            return Err(CoreError::ValidationError(
                "Gemini request must include at least one message".to_string(),
            ));
        }

        let contents = request
            .messages
            .iter()
            .map(|msg| Content {
                role: Some(Self::gemini_role(msg.role).to_string()),
                parts: vec![Part {
                    text: Some(msg.content.clone()),
                }],
            })
            .collect();

        let generation_config = GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
            response_mime_type: request
                .json_mode
                .then(|| "application/json".to_string()),
        };

        Ok(GenerateContentRequest {
            contents,
            generation_config: Some(generation_config),
        })
    }
}

// =============================================================================
// Gemini API Types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

// =============================================================================
// ChatProvider Implementation
// =============================================================================

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: CompletionRequest) -> CoreResult<CompletionResponse> {
        let provider = ProviderId::Gemini.to_string();
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let api_request = self.build_generate_content_request(&request)?;

        // Key travels in a header so it never shows up in logged URLs
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        debug!("gemini generateContent: model={}", model);

        let response: GenerateContentResponse = http::send_for_json(
            &provider,
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&api_request),
        )
        .await?;

        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            warn!("Gemini blocked prompt: {}", reason);
            return Err(CoreError::parse(
                &provider,
                format!("Content blocked by safety filters: {}", reason),
            ));
        }

        // Long answers may arrive split across several parts of one candidate
        let text = response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
            })
            .filter(|texts| !texts.is_empty())
            .map(|texts| texts.concat())
            .ok_or_else(|| CoreError::parse(&provider, "Response contained no text"))?;

        Ok(CompletionResponse {
            text,
            model,
            provider: ProviderId::Gemini,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
