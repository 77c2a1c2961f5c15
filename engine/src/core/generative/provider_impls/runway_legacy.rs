//! Runway Legacy Lip-Sync Provider
//!
//! Older `generationJob` API: audio travels hex-encoded, the face image by
//! reference, and success is reported as `COMPLETED` with the URL at
//! `output.video.url`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::generative::video::{VideoJobInput, VideoJobProvider, VideoJobStatus};
use crate::core::http;
use crate::core::{CoreError, CoreResult, JobId, ProviderId};

/// Legacy Runway lip-sync provider
pub struct RunwayLegacyProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SubmitRequest {
    model: &'static str,
    input: SubmitInput,
    webhook: Option<String>,
}

#[derive(Serialize)]
struct SubmitInput {
    audio: AudioInput,
    image: ImageInput,
}

#[derive(Serialize)]
struct AudioInput {
    data: String,
    mime_type: String,
}

#[derive(Serialize)]
struct ImageInput {
    url: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: Option<String>,
    output: Option<LegacyOutput>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct LegacyOutput {
    video: Option<LegacyVideo>,
}

#[derive(Deserialize)]
struct LegacyVideo {
    url: Option<String>,
}

impl RunwayLegacyProvider {
    pub fn new(api_key: String, base_url: &str, client: reqwest::Client) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl VideoJobProvider for RunwayLegacyProvider {
    fn id(&self) -> ProviderId {
        ProviderId::RunwayLegacy
    }

    async fn submit(&self, input: &VideoJobInput) -> CoreResult<JobId> {
        let audio = input.audio.bytes().ok_or_else(|| {
            CoreError::ValidationError("Audio must be resolved to bytes".to_string())
        })?;
        let face = input.face_image.to_data_uri().ok_or_else(|| {
            CoreError::ValidationError("Face image must be resolved to bytes".to_string())
        })?;

        let body = SubmitRequest {
            model: "lip-sync",
            input: SubmitInput {
                audio: AudioInput {
                    data: hex::encode(audio),
                    mime_type: input.audio.mime_type.clone(),
                },
                image: ImageInput { url: face },
            },
            webhook: None,
        };

        let response: SubmitResponse = http::send_for_json(
            "runway_legacy",
            self.client
                .post(format!("{}/v1/generationJob", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        let job_id = response.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            CoreError::parse("runway_legacy", "Submission response has no job id")
        })?;
        info!("Runway legacy job submitted: job_id={}", job_id);
        Ok(job_id)
    }

    async fn poll(&self, job_id: &str) -> CoreResult<VideoJobStatus> {
        let response: StatusResponse = http::send_for_json(
            "runway_legacy",
            self.client
                .get(format!("{}/v1/generationJob/{}", self.base_url, job_id))
                .bearer_auth(&self.api_key),
        )
        .await?;

        let status = response.status.unwrap_or_default();
        debug!("Runway legacy poll for job {}: status={}", job_id, status);

        match status.as_str() {
            "COMPLETED" => {
                let result_url = response
                    .output
                    .and_then(|o| o.video)
                    .and_then(|v| v.url)
                    .ok_or_else(|| {
                        CoreError::parse("runway_legacy", "Completed status missing output.video.url")
                    })?;
                Ok(VideoJobStatus::Succeeded { result_url })
            }
            "FAILED" => Ok(VideoJobStatus::Failed {
                detail: response
                    .error
                    .as_ref()
                    .filter(|e| !e.is_null())
                    .map(super::error_detail)
                    .unwrap_or_else(|| "Unknown error".to_string()),
            }),
            "PENDING" | "QUEUED" => Ok(VideoJobStatus::Pending),
            "RUNNING" | "PROCESSING" => Ok(VideoJobStatus::Running),
            other => {
                warn!("Unknown Runway legacy status '{}', treating as running", other);
                Ok(VideoJobStatus::Running)
            }
        }
    }
}
