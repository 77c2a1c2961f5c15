//! Chat Provider Module
//!
//! Canonical chat types and the trait every chat backend implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{CoreResult, ProviderId};

// =============================================================================
// Chat Provider Trait
// =============================================================================

/// Trait for chat completion backends (OpenAI, xAI, Gemini)
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider identity
    fn id(&self) -> ProviderId;

    /// Default model used when the request names none
    fn default_model(&self) -> &str;

    /// Sends one completion request. Implementations never retry.
    async fn complete(&self, request: CompletionRequest) -> CoreResult<CompletionResponse>;
}

// =============================================================================
// Chat Message
// =============================================================================

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

// =============================================================================
// Completion Request
// =============================================================================

/// Canonical completion request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// Ordered conversation
    pub messages: Vec<ChatMessage>,
    /// Model to use (provider-specific)
    pub model: Option<String>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON object
    #[serde(default)]
    pub json_mode: bool,
}

impl CompletionRequest {
    /// Creates a request from a conversation
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    /// Creates a single-turn request with an optional system prompt
    pub fn prompt(system: Option<&str>, prompt: &str) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        Self::new(messages)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enables JSON mode
    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

// =============================================================================
// Completion Response
// =============================================================================

/// Canonical completion response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
    pub provider: ProviderId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_request_orders_system_first() {
        let request = CompletionRequest::prompt(Some("be terse"), "hi")
            .with_temperature(0.2)
            .with_json_mode();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert_eq!(request.messages[1], ChatMessage::user("hi"));
        assert!(request.json_mode);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
