//! Runway Video Provider
//!
//! Current image-to-video API. The face image and the audio are both sent
//! inline as base64 data URIs; requests carry the `X-Runway-Version` header.
//!
//! API flow:
//! 1. POST `/v1/image_to_video` → job id
//! 2. GET `/v1/image_to_video/{id}` until `SUCCEEDED` or `FAILED`
//! 3. Result URL from `result.video`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::generative::video::{VideoJobInput, VideoJobProvider, VideoJobStatus};
use crate::core::http;
use crate::core::{CoreError, CoreResult, JobId, ProviderId};

/// Runway image-to-video provider
pub struct RunwayProvider {
    api_key: String,
    base_url: String,
    api_version: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    model: &'a str,
    prompt_image: String,
    prompt_audio: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    failure: Option<String>,
}

impl RunwayProvider {
    pub fn new(
        api_key: String,
        base_url: &str,
        api_version: &str,
        model: &str,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            model: model.to_string(),
            client,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", &self.api_version)
    }

    /// `result.video` may be a bare URL or an object carrying one
    fn result_url(response: &StatusResponse) -> Option<String> {
        let from_result = response.result.as_ref().and_then(|r| {
            let video = r.get("video")?;
            video
                .as_str()
                .or_else(|| video.get("url").and_then(Value::as_str))
                .map(str::to_string)
        });
        from_result.or_else(|| {
            response
                .output
                .as_ref()
                .and_then(|o| o.get(0))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    fn failure_detail(response: &StatusResponse) -> String {
        if let Some(error) = &response.error {
            return super::error_detail(error);
        }
        response
            .failure
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

#[async_trait]
impl VideoJobProvider for RunwayProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Runway
    }

    async fn submit(&self, input: &VideoJobInput) -> CoreResult<JobId> {
        let prompt_image = input.face_image.to_data_uri().ok_or_else(|| {
            CoreError::ValidationError("Face image must be resolved to bytes".to_string())
        })?;
        let prompt_audio = input.audio.to_data_uri().ok_or_else(|| {
            CoreError::ValidationError("Audio must be resolved to bytes".to_string())
        })?;

        let body = SubmitRequest {
            model: &self.model,
            prompt_image,
            prompt_audio,
        };

        let response: SubmitResponse = http::send_for_json(
            "runway",
            self.authed(
                self.client
                    .post(format!("{}/v1/image_to_video", self.base_url)),
            )
            .json(&body),
        )
        .await?;

        let job_id = response
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CoreError::parse("runway", "Submission response has no job id"))?;
        info!("Runway video job submitted: job_id={}", job_id);
        Ok(job_id)
    }

    async fn poll(&self, job_id: &str) -> CoreResult<VideoJobStatus> {
        let response: StatusResponse = http::send_for_json(
            "runway",
            self.authed(
                self.client
                    .get(format!("{}/v1/image_to_video/{}", self.base_url, job_id)),
            ),
        )
        .await?;

        let status = response.status.clone().unwrap_or_default();
        debug!("Runway poll for job {}: status={}", job_id, status);

        match status.as_str() {
            "SUCCEEDED" | "COMPLETED" => {
                let result_url = Self::result_url(&response).ok_or_else(|| {
                    CoreError::parse("runway", "Succeeded status missing result.video")
                })?;
                Ok(VideoJobStatus::Succeeded { result_url })
            }
            "FAILED" | "CANCELLED" => Ok(VideoJobStatus::Failed {
                detail: Self::failure_detail(&response),
            }),
            "PENDING" | "THROTTLED" => Ok(VideoJobStatus::Pending),
            "RUNNING" => Ok(VideoJobStatus::Running),
            other => {
                warn!("Unknown Runway status '{}', treating as running", other);
                Ok(VideoJobStatus::Running)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
