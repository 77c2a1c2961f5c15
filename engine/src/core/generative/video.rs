//! Video Job Types
//!
//! Lip-sync video generation is asynchronous on every vendor: submit, then
//! poll until a terminal status. This module holds the job record and its
//! state machine, the poll policy and the provider trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalize::Artifact;
use crate::core::config::VideoSettings;
use crate::core::{CoreError, CoreResult, JobId, ProviderId, RequestId};

// =============================================================================
// Job State
// =============================================================================

/// Lifecycle of a generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Created,
    Submitted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    /// Whether no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut
        )
    }

    /// Allowed forward transitions. A failed submission goes straight to `Failed`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Created, JobState::Submitted)
                | (JobState::Created, JobState::Failed)
                | (JobState::Submitted, JobState::Polling)
                | (JobState::Polling, JobState::Succeeded)
                | (JobState::Polling, JobState::Failed)
                | (JobState::Polling, JobState::TimedOut)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Created => "CREATED",
            JobState::Submitted => "SUBMITTED",
            JobState::Polling => "POLLING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
            JobState::TimedOut => "TIMED_OUT",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Poll Policy
// =============================================================================

/// Fixed-interval polling with a bounded attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_polls: 60,
        }
    }
}

impl From<&VideoSettings> for PollPolicy {
    fn from(settings: &VideoSettings) -> Self {
        Self {
            interval: settings.poll_interval(),
            max_polls: settings.max_polls,
        }
    }
}

// =============================================================================
// Generation Job
// =============================================================================

/// One video job, owned exclusively by the orchestrator driving it
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: String,
    pub request_id: RequestId,
    pub provider: ProviderId,
    /// Vendor-assigned id, known once submitted
    pub provider_job_id: Option<JobId>,
    pub state: JobState,
    pub submitted_at: Option<DateTime<Utc>>,
    pub poll_count: u32,
    pub max_polls: u32,
    pub poll_interval: Duration,
}

impl GenerationJob {
    pub fn new(request_id: impl Into<RequestId>, provider: ProviderId, policy: PollPolicy) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            request_id: request_id.into(),
            provider,
            provider_job_id: None,
            state: JobState::Created,
            submitted_at: None,
            poll_count: 0,
            max_polls: policy.max_polls,
            poll_interval: policy.interval,
        }
    }

    /// Moves to `next`, rejecting anything the state machine does not allow
    pub fn transition(&mut self, next: JobState) -> CoreResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::InvalidJobTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Records the accepted submission
    pub fn mark_submitted(&mut self, provider_job_id: JobId) -> CoreResult<()> {
        self.transition(JobState::Submitted)?;
        self.provider_job_id = Some(provider_job_id);
        self.submitted_at = Some(Utc::now());
        Ok(())
    }

    /// Counts one non-terminal poll
    pub fn record_poll(&mut self) {
        self.poll_count += 1;
    }

    pub fn budget_exhausted(&self) -> bool {
        self.poll_count >= self.max_polls
    }
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Canonical status reported by a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VideoJobStatus {
    Pending,
    Running,
    Succeeded { result_url: String },
    Failed { detail: String },
}

impl VideoJobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VideoJobStatus::Succeeded { .. } | VideoJobStatus::Failed { .. }
        )
    }
}

/// Inputs for a lip-sync job, already resolved to bytes
#[derive(Debug, Clone)]
pub struct VideoJobInput {
    pub audio: Artifact,
    pub face_image: Artifact,
}

/// Trait for asynchronous video backends
#[async_trait]
pub trait VideoJobProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Submits a job and returns the vendor job id
    async fn submit(&self, input: &VideoJobInput) -> CoreResult<JobId>;

    /// Reads the current job status
    async fn poll(&self, job_id: &str) -> CoreResult<VideoJobStatus>;
}

/// Text-driven character video request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterVideoRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

/// Trait for synchronous character video backends
#[async_trait]
pub trait CharacterVideoProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Renders the video in a single call
    async fn generate(&self, request: &CharacterVideoRequest) -> CoreResult<Artifact>;

    /// Characters the backend offers
    async fn list_characters(&self) -> CoreResult<serde_json::Value>;

    /// Voices the backend offers
    async fn list_voices(&self) -> CoreResult<serde_json::Value>;
}

// =============================================================================
// Tests
// =============================================================================
