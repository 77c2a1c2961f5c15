//! Hedra Character Video Provider
//!
//! Synchronous: `POST {base}/generate` returns the rendered video as the
//! response body.

use async_trait::async_trait;
use tracing::info;

use crate::core::generative::normalize::Artifact;
use crate::core::generative::video::{CharacterVideoProvider, CharacterVideoRequest};
use crate::core::http;
use crate::core::{ArtifactKind, CoreError, CoreResult, ProviderId};

/// Hedra API provider
pub struct HedraProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl HedraProvider {
    pub fn new(api_key: String, base_url: &str, client: reqwest::Client) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn get_listing(&self, path: &str) -> CoreResult<serde_json::Value> {
        http::send_for_json(
            "hedra",
            self.client
                .get(format!("{}/{}", self.base_url, path))
                .bearer_auth(&self.api_key),
        )
        .await
    }
}

#[async_trait]
impl CharacterVideoProvider for HedraProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Hedra
    }

    async fn generate(&self, request: &CharacterVideoRequest) -> CoreResult<Artifact> {
        if request.text.trim().is_empty() {
            return Err(CoreError::ValidationError("Text is empty".to_string()));
        }

        let (bytes, content_type) = http::send_for_bytes(
            "hedra",
            self.client
                .post(format!("{}/generate", self.base_url))
                .bearer_auth(&self.api_key)
                .json(request),
        )
        .await?;

        info!("Hedra rendered {} bytes of video", bytes.len());
        let mime = content_type
            .filter(|ct| ct.starts_with("video/"))
            .unwrap_or_else(|| ArtifactKind::Video.default_mime().to_string());
        Ok(Artifact::from_bytes(ArtifactKind::Video, bytes, mime))
    }

    async fn list_characters(&self) -> CoreResult<serde_json::Value> {
        self.get_listing("characters").await
    }

    async fn list_voices(&self) -> CoreResult<serde_json::Value> {
        self.get_listing("voices").await
    }
}
