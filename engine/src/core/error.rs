//! GenRelay Error Definitions
//!
//! Defines error types used throughout the engine.

use thiserror::Error;

use super::{Capability, JobId, ProviderId};

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Routing Errors
    // =========================================================================
    #[error("Credential missing for provider {provider}")]
    CredentialMissing { provider: ProviderId },

    #[error("No provider available for {capability} (tried: {})", format_attempted(.attempted))]
    NoProviderAvailable {
        capability: Capability,
        attempted: Vec<ProviderId>,
    },

    // =========================================================================
    // Provider Call Errors
    // =========================================================================
    #[error("{provider} transport error{}: {body}", format_status(.status))]
    TransportError {
        provider: String,
        status: Option<u16>,
        body: String,
    },

    #[error("{provider} response could not be parsed: {message}")]
    ResponseParseError { provider: String, message: String },

    #[error("{provider} job {job_id} failed: {detail}")]
    ProviderJobFailed {
        provider: ProviderId,
        job_id: JobId,
        detail: String,
    },

    #[error("{provider} job {job_id} timed out after {polls} polls")]
    JobTimeout {
        provider: ProviderId,
        job_id: JobId,
        polls: u32,
    },

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidJobTransition { from: String, to: String },

    #[error("A job is already active for request {0}")]
    JobAlreadyActive(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Builds a transport error from an HTTP status and response body.
    pub fn transport(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        CoreError::TransportError {
            provider: provider.into(),
            status: Some(status),
            body: body.into(),
        }
    }

    /// Builds a transport error for a request that never produced a response.
    pub fn network(provider: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CoreError::TransportError {
            provider: provider.into(),
            status: None,
            body: err.to_string(),
        }
    }

    /// Builds a response parse error.
    pub fn parse(provider: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CoreError::ResponseParseError {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Whether the fallback resolver may move on to the next provider.
    ///
    /// Only configuration problems qualify. Once a provider has actually been
    /// called, its failure belongs to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::CredentialMissing { .. } | CoreError::NoProviderAvailable { .. }
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CoreError::TransportError { status, .. } => *status,
            _ => None,
        }
    }
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

fn format_attempted(attempted: &[ProviderId]) -> String {
    if attempted.is_empty() {
        return "none".to_string();
    }
    attempted
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
