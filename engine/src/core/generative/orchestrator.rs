//! Video Job Orchestrator
//!
//! Drives one video job from submission to a terminal state:
//!
//! 1. submit (a rejected submission never reaches polling)
//! 2. poll sequentially at a fixed interval
//! 3. on success download the result, on failure surface the vendor detail,
//!    and give up once the poll budget is spent
//!
//! Only non-terminal polls count against the budget. A job that is still
//! running after `max_polls` such polls times out; the remote job is left
//! alone.

use tracing::{debug, info, warn};

use super::normalize::{Artifact, ArtifactSource, ResultNormalizer};
use super::video::{
    GenerationJob, JobState, PollPolicy, VideoJobInput, VideoJobProvider, VideoJobStatus,
};
use crate::core::{ArtifactKind, CoreError, CoreResult, JobId, ProviderId};

/// Completed video job
#[derive(Debug, Clone)]
pub struct VideoJobOutcome {
    pub artifact: Artifact,
    pub job_id: JobId,
    pub provider: ProviderId,
    /// Non-terminal polls observed before the terminal one
    pub poll_count: u32,
}

/// Submit/poll/download driver
#[derive(Clone)]
pub struct VideoJobOrchestrator {
    normalizer: ResultNormalizer,
    policy: PollPolicy,
}

impl VideoJobOrchestrator {
    pub fn new(normalizer: ResultNormalizer, policy: PollPolicy) -> Self {
        Self { normalizer, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Resolves a face image reference (data URI, URL or local path) to bytes
    pub async fn prepare_face_image(&self, reference: &str) -> CoreResult<Artifact> {
        self.normalizer
            .normalize(ArtifactSource::parse(reference), ArtifactKind::Image)
            .await
    }

    /// Runs a job to completion on `provider`
    pub async fn run(
        &self,
        provider: &dyn VideoJobProvider,
        request_id: &str,
        input: &VideoJobInput,
    ) -> CoreResult<VideoJobOutcome> {
        let mut job = GenerationJob::new(request_id, provider.id(), self.policy);

        let job_id = match provider.submit(input).await {
            Ok(job_id) => job_id,
            Err(e) => {
                job.transition(JobState::Failed)?;
                warn!("{} rejected video submission: {}", job.provider, e);
                return Err(e);
            }
        };
        job.mark_submitted(job_id.clone())?;
        job.transition(JobState::Polling)?;
        info!(
            "Polling {} job {} every {:?} (max {} polls)",
            job.provider, job_id, job.poll_interval, job.max_polls
        );

        while !job.budget_exhausted() {
            tokio::time::sleep(job.poll_interval).await;

            let status = match provider.poll(&job_id).await {
                Ok(status) => status,
                Err(e) => {
                    job.transition(JobState::Failed)?;
                    return Err(e);
                }
            };

            match status {
                VideoJobStatus::Succeeded { result_url } => {
                    job.transition(JobState::Succeeded)?;
                    info!(
                        "{} job {} succeeded after {} polls",
                        job.provider, job_id, job.poll_count
                    );
                    let artifact = self
                        .normalizer
                        .normalize(ArtifactSource::RemoteUrl(result_url), ArtifactKind::Video)
                        .await?;
                    return Ok(VideoJobOutcome {
                        artifact,
                        job_id,
                        provider: job.provider,
                        poll_count: job.poll_count,
                    });
                }
                VideoJobStatus::Failed { detail } => {
                    job.transition(JobState::Failed)?;
                    warn!("{} job {} failed: {}", job.provider, job_id, detail);
                    return Err(CoreError::ProviderJobFailed {
                        provider: job.provider,
                        job_id,
                        detail,
                    });
                }
                VideoJobStatus::Pending | VideoJobStatus::Running => {
                    job.record_poll();
                    debug!(
                        "{} job {} not finished ({}/{})",
                        job.provider, job_id, job.poll_count, job.max_polls
                    );
                }
            }
        }

        job.transition(JobState::TimedOut)?;
        warn!(
            "{} job {} timed out after {} polls",
            job.provider, job_id, job.poll_count
        );
        Err(CoreError::JobTimeout {
            provider: job.provider,
            job_id,
            polls: job.poll_count,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
