//! Provider Construction
//!
//! Builds a backend for a resolved `ProviderId`. Credentials are read at
//! construction time, so each request sees the secret source as it is now.
//! A key that has gone missing or is malformed by then is `CredentialMissing`,
//! which the engine treats as "try the next provider".
//! Tests swap the HTTP factory for in-memory doubles through the same trait.

use std::sync::Arc;

use tracing::{debug, warn};

use super::ai::providers::{GeminiProvider, OpenAiCompatibleProvider, ProviderConfig};
use super::ai::ChatProvider;
use super::config::EngineConfig;
use super::credentials::{CredentialType, SecretSource};
use super::generative::provider_impls::{
    ChatImageProvider, ElevenLabsProvider, HedraProvider, ImagenProvider, ImagesApiProvider,
    RunwayLegacyProvider, RunwayProvider,
};
use super::generative::{
    CharacterVideoProvider, ContentFetcher, HttpFetcher, ImageProvider, SpeechProvider,
    VideoJobProvider,
};
use super::http;
use super::{Capability, CoreError, CoreResult, ProviderId};

/// Creates provider backends on demand
pub trait ProviderFactory: Send + Sync {
    fn chat(&self, provider: ProviderId) -> CoreResult<Arc<dyn ChatProvider>>;

    fn image(&self, provider: ProviderId) -> CoreResult<Arc<dyn ImageProvider>>;

    fn video(&self, provider: ProviderId) -> CoreResult<Arc<dyn VideoJobProvider>>;

    fn character_video(&self, provider: ProviderId) -> CoreResult<Arc<dyn CharacterVideoProvider>>;

    fn speech(&self, provider: ProviderId) -> CoreResult<Arc<dyn SpeechProvider>>;

    /// Downloader used for result URLs and remote face images
    fn fetcher(&self) -> Arc<dyn ContentFetcher>;
}

fn wrong_capability(provider: ProviderId, wanted: Capability) -> CoreError {
    CoreError::NotSupported(format!("{} is not a {} provider", provider, wanted))
}

// =============================================================================
// HTTP Factory
// =============================================================================

/// Factory for the real vendor APIs
pub struct HttpProviderFactory {
    config: EngineConfig,
    secrets: Arc<dyn SecretSource>,
    client: reqwest::Client,
}

impl HttpProviderFactory {
    pub fn new(config: EngineConfig, secrets: Arc<dyn SecretSource>) -> CoreResult<Self> {
        let client = http::build_client(config.http.timeout_secs)?;
        Ok(Self {
            config,
            secrets,
            client,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reads and checks the key a provider needs
    fn api_key(&self, provider: ProviderId) -> CoreResult<String> {
        let credential: CredentialType = provider
            .credential()
            .ok_or_else(|| CoreError::NotSupported(format!("{} takes no credential", provider)))?;
        let value = self
            .secrets
            .credential(credential)
            .ok_or(CoreError::CredentialMissing { provider })?;
        // A malformed key is reported as missing
        if let Err(e) = credential.validate(&value) {
            warn!("Ignoring {} for {}: {}", credential, provider, e);
            return Err(CoreError::CredentialMissing { provider });
        }
        debug!(
            "Using {} for {} ({})",
            credential,
            provider,
            CredentialType::redact(&value)
        );
        Ok(value)
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn chat(&self, provider: ProviderId) -> CoreResult<Arc<dyn ChatProvider>> {
        if provider.capability() != Capability::Chat {
            return Err(wrong_capability(provider, Capability::Chat));
        }
        let config = ProviderConfig::from_engine(provider, &self.config, self.api_key(provider)?)?;
        let backend: Arc<dyn ChatProvider> = match provider {
            ProviderId::Gemini => Arc::new(GeminiProvider::with_client(config, self.client.clone())),
            _ => Arc::new(OpenAiCompatibleProvider::with_client(
                config,
                self.client.clone(),
            )),
        };
        Ok(backend)
    }

    fn image(&self, provider: ProviderId) -> CoreResult<Arc<dyn ImageProvider>> {
        let endpoints = &self.config.endpoints;
        let models = &self.config.models;
        let backend: Arc<dyn ImageProvider> = match provider {
            ProviderId::DallE => Arc::new(ImagesApiProvider::new(
                provider,
                self.api_key(provider)?,
                &endpoints.openai,
                &models.dalle,
                self.client.clone(),
            )),
            ProviderId::XaiImage => Arc::new(ImagesApiProvider::new(
                provider,
                self.api_key(provider)?,
                &endpoints.xai,
                &models.xai_image,
                self.client.clone(),
            )),
            ProviderId::OpenAIChatImage => Arc::new(ChatImageProvider::new(
                self.api_key(provider)?,
                &endpoints.openai,
                &models.openai_chat_image,
                self.client.clone(),
            )),
            ProviderId::Imagen => Arc::new(ImagenProvider),
            ProviderId::DefaultImage => {
                return Err(CoreError::NotSupported(
                    "The default image has no generator".to_string(),
                ))
            }
            other => return Err(wrong_capability(other, Capability::Image)),
        };
        Ok(backend)
    }

    fn video(&self, provider: ProviderId) -> CoreResult<Arc<dyn VideoJobProvider>> {
        let endpoints = &self.config.endpoints;
        let backend: Arc<dyn VideoJobProvider> = match provider {
            ProviderId::Runway => Arc::new(RunwayProvider::new(
                self.api_key(provider)?,
                &endpoints.runway,
                &endpoints.runway_api_version,
                &self.config.models.runway,
                self.client.clone(),
            )),
            ProviderId::RunwayLegacy => Arc::new(RunwayLegacyProvider::new(
                self.api_key(provider)?,
                &endpoints.runway_legacy,
                self.client.clone(),
            )),
            other => {
                return Err(CoreError::NotSupported(format!(
                    "{} does not run asynchronous video jobs",
                    other
                )))
            }
        };
        Ok(backend)
    }

    fn character_video(&self, provider: ProviderId) -> CoreResult<Arc<dyn CharacterVideoProvider>> {
        match provider {
            ProviderId::Hedra => Ok(Arc::new(HedraProvider::new(
                self.api_key(provider)?,
                &self.config.endpoints.hedra,
                self.client.clone(),
            ))),
            other => Err(CoreError::NotSupported(format!(
                "{} does not render character videos",
                other
            ))),
        }
    }

    fn speech(&self, provider: ProviderId) -> CoreResult<Arc<dyn SpeechProvider>> {
        match provider {
            ProviderId::ElevenLabs => Ok(Arc::new(ElevenLabsProvider::new(
                self.api_key(provider)?,
                &self.config.endpoints.elevenlabs,
                &self.config.models.elevenlabs,
                self.config.assets.default_voice_id.clone(),
                self.client.clone(),
            ))),
            other => Err(wrong_capability(other, Capability::Audio)),
        }
    }

    fn fetcher(&self) -> Arc<dyn ContentFetcher> {
        Arc::new(HttpFetcher::new(self.client.clone()))
    }
}

// =============================================================================
// Test Doubles
// =============================================================================


// =============================================================================
// Tests
// =============================================================================
