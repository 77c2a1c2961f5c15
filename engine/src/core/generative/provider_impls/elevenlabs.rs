//! ElevenLabs Text-to-Speech

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::core::generative::audio::SpeechProvider;
use crate::core::generative::normalize::Artifact;
use crate::core::http;
use crate::core::{ArtifactKind, CoreError, CoreResult, ProviderId};

/// ElevenLabs speech provider
pub struct ElevenLabsProvider {
    api_key: String,
    base_url: String,
    model_id: String,
    default_voice_id: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

impl ElevenLabsProvider {
    pub fn new(
        api_key: String,
        base_url: &str,
        model_id: &str,
        default_voice_id: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_id: model_id.to_string(),
            default_voice_id,
            client,
        }
    }
}

#[async_trait]
impl SpeechProvider for ElevenLabsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::ElevenLabs
    }

    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> CoreResult<Artifact> {
        let voice_id = voice_id
            .filter(|v| !v.trim().is_empty())
            .or(self.default_voice_id.as_deref())
            .ok_or_else(|| {
                CoreError::ValidationError("No ElevenLabs voice id configured".to_string())
            })?;

        let body = SpeechRequest {
            text,
            model_id: &self.model_id,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.5,
            },
        };

        let (bytes, _) = http::send_for_bytes(
            "elevenlabs",
            self.client
                .post(format!("{}/v1/text-to-speech/{}", self.base_url, voice_id))
                .header("xi-api-key", &self.api_key)
                .header("Accept", "audio/mpeg")
                .json(&body),
        )
        .await?;

        info!("ElevenLabs synthesized {} bytes of audio", bytes.len());
        Ok(Artifact::from_bytes(
            ArtifactKind::Audio,
            bytes,
            ArtifactKind::Audio.default_mime(),
        ))
    }
}
