//! Speech Synthesis

use async_trait::async_trait;

use super::normalize::Artifact;
use crate::core::{CoreResult, ProviderId};

/// Trait for text-to-speech backends
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Synthesizes `text`, returning an audio artifact held in memory.
    ///
    /// `voice_id` falls back to the provider's configured default voice.
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> CoreResult<Artifact>;
}
