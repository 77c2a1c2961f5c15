//! Image Generation
//!
//! Image generators return a URL (or data URI) or nothing at all. The adapter
//! never fails for lack of a result: an unavailable generator, an empty reply
//! or a failed call all degrade to the configured default image.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::normalize::{decode_data_uri, guess_mime, Artifact, ResultNormalizer};
use crate::core::factory::ProviderFactory;
use crate::core::{ArtifactKind, CoreResult, ProviderId};

// =============================================================================
// Provider Trait
// =============================================================================

/// Image generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub size: String,
    pub quality: String,
    pub count: u32,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            size: "1024x1024".to_string(),
            quality: "standard".to_string(),
            count: 1,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Trait for image generators
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Generates one image. `Ok(None)` means the generator produced nothing.
    async fn generate(&self, request: &ImageRequest) -> CoreResult<Option<String>>;
}

// =============================================================================
// Adapter
// =============================================================================

/// Result of an image request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGeneration {
    pub artifact: Artifact,
    /// Provider that actually produced the artifact
    pub provider: ProviderId,
}

/// Normalizes image generation across providers
pub struct ImageGenerationAdapter {
    factory: Arc<dyn ProviderFactory>,
    normalizer: ResultNormalizer,
    default_image_url: String,
}

impl ImageGenerationAdapter {
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        normalizer: ResultNormalizer,
        default_image_url: impl Into<String>,
    ) -> Self {
        Self {
            factory,
            normalizer,
            default_image_url: default_image_url.into(),
        }
    }

    /// The static fallback image
    pub fn default_artifact(&self) -> Artifact {
        Artifact::from_uri(
            ArtifactKind::Image,
            self.default_image_url.clone(),
            guess_mime(&self.default_image_url).unwrap_or(ArtifactKind::Image.default_mime()),
        )
    }

    /// Generates an image with `provider`.
    ///
    /// With `inline` set the result is downloaded and returned as a data URI;
    /// a failed download there is an error.
    pub async fn generate(
        &self,
        prompt: &str,
        provider: ProviderId,
        model: Option<String>,
        inline: bool,
    ) -> CoreResult<ImageGeneration> {
        let generator = if provider == ProviderId::DefaultImage {
            None
        } else {
            match self.factory.image(provider) {
                Ok(generator) => Some(generator),
                Err(e) => {
                    warn!("Image generator {} unavailable: {}", provider, e);
                    None
                }
            }
        };
        self.generate_with(prompt, generator.as_deref(), model, inline).await
    }

    /// Generates an image with an already-built generator, or the default
    /// image when there is none
    pub async fn generate_with(
        &self,
        prompt: &str,
        generator: Option<&dyn ImageProvider>,
        model: Option<String>,
        inline: bool,
    ) -> CoreResult<ImageGeneration> {
        let request = ImageRequest::new(prompt).with_model(model);
        let produced = match generator {
            Some(generator) => Self::try_generate(generator, &request)
                .await
                .map(|artifact| (artifact, generator.id())),
            None => None,
        };
        let (artifact, produced_by) = match produced {
            Some(found) => found,
            None => {
                info!(
                    "Using default image for {} request",
                    generator.map_or(ProviderId::DefaultImage, |g| g.id())
                );
                (self.default_artifact(), ProviderId::DefaultImage)
            }
        };

        let artifact = if inline {
            self.normalizer.inline(artifact).await?
        } else {
            artifact
        };

        Ok(ImageGeneration {
            artifact,
            provider: produced_by,
        })
    }

    async fn try_generate(
        generator: &dyn ImageProvider,
        request: &ImageRequest,
    ) -> Option<Artifact> {
        let provider = generator.id();
        match generator.generate(request).await {
            Ok(Some(uri)) => Some(Self::artifact_for(uri)),
            Ok(None) => {
                warn!("Image generator {} returned no result", provider);
                None
            }
            Err(e) => {
                warn!("Image generator {} failed: {}", provider, e);
                None
            }
        }
    }

    fn artifact_for(uri: String) -> Artifact {
        let mime = if uri.starts_with("data:") {
            decode_data_uri(&uri)
                .ok()
                .map(|(mime, _)| mime)
                .filter(|m| !m.is_empty())
        } else {
            guess_mime(&uri).map(str::to_string)
        };
        let mime = mime.unwrap_or_else(|| ArtifactKind::Image.default_mime().to_string());
        Artifact::from_uri(ArtifactKind::Image, uri, mime)
    }
}

// =============================================================================
// Tests
// =============================================================================
