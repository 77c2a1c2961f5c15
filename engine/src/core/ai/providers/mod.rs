//! Chat Provider Implementations
//!
//! Concrete implementations of the ChatProvider trait.

mod gemini;
mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiCompatibleProvider;

use crate::core::config::EngineConfig;
use crate::core::{CoreError, CoreResult, ProviderId};

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for creating a chat provider
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub provider: ProviderId,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Builds the config for a chat provider from engine settings
    pub fn from_engine(
        provider: ProviderId,
        config: &EngineConfig,
        api_key: impl Into<String>,
    ) -> CoreResult<Self> {
        let (base_url, model) = match provider {
            ProviderId::OpenAI => (&config.endpoints.openai, &config.models.openai_chat),
            ProviderId::Xai => (&config.endpoints.xai, &config.models.xai_chat),
            ProviderId::Gemini => (&config.endpoints.gemini, &config.models.gemini_chat),
            other => {
                return Err(CoreError::NotSupported(format!(
                    "{} is not a chat provider",
                    other
                )))
            }
        };

        Ok(Self {
            provider,
            api_key: api_key.into(),
            base_url: base_url.clone(),
            model: model.clone(),
            timeout_secs: config.http.timeout_secs,
        })
    }

    /// Sets the base URL
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Sets the model
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}
