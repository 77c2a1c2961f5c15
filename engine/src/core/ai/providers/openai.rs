//! OpenAI-compatible Chat Provider
//!
//! Serves both OpenAI and xAI: the two speak the same `/chat/completions`
//! dialect and differ only in base URL, key and default model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ProviderConfig;
use crate::core::ai::provider::{ChatProvider, CompletionRequest, CompletionResponse};
use crate::core::http;
use crate::core::{CoreError, CoreResult, ProviderId};

// =============================================================================
// Provider
// =============================================================================

/// Chat provider for OpenAI-style APIs
pub struct OpenAiCompatibleProvider {
    id: ProviderId,
    api_key: String,
    base_url: String,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Creates a new provider
    pub fn new(config: ProviderConfig) -> CoreResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(CoreError::CredentialMissing {
                provider: config.provider,
            });
        }
        let client = http::build_client(config.timeout_secs)?;
        Ok(Self::with_client(config, client))
    }

    /// Creates a provider sharing an existing HTTP client
    pub fn with_client(config: ProviderConfig, client: reqwest::Client) -> Self {
        Self {
            id: config.provider,
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_model: config.model,
            client,
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

// =============================================================================
// API Types
// =============================================================================

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

// =============================================================================
// ChatProvider Implementation
// =============================================================================

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: CompletionRequest) -> CoreResult<CompletionResponse> {
        let provider = self.id.to_string();
        let api_request = self.build_request(&request);
        let model = api_request.model.clone();
        let url = format!("{}/chat/completions", self.base_url);

        debug!("{} chat completion: model={}", provider, model);

        let response: ChatCompletionResponse = http::send_for_json(
            &provider,
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&api_request),
        )
        .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CoreError::parse(&provider, "No completion choices returned"))?;

        Ok(CompletionResponse {
            text,
            model: response.model.unwrap_or(model),
            provider: self.id,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
