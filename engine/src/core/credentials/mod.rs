//! Credential Lookup
//!
//! Resolves provider API keys by name. Lookup is layered:
//!
//! 1. Process environment (or any caller-supplied map standing in for it)
//! 2. A managed secret store, consulted only when one is configured
//!
//! Values are never cached here. Every generation request re-reads its
//! credentials so rotated keys take effect without a restart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{CoreError, CoreResult};

/// Credential type identifier for logging and validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    /// OpenAI API key (sk-...)
    OpenaiApiKey,
    /// xAI API key (xai-...)
    XaiApiKey,
    /// Google AI API key (AIza...)
    GeminiApiKey,
    /// RunwayML API key
    RunwayApiKey,
    /// ElevenLabs API key
    ElevenLabsApiKey,
    /// Hedra API key
    HedraApiKey,
}

impl CredentialType {
    /// Returns the secret name used for lookup
    pub fn secret_name(&self) -> &'static str {
        match self {
            Self::OpenaiApiKey => "OPENAI_API_KEY",
            Self::XaiApiKey => "XAI_API_KEY",
            Self::GeminiApiKey => "GEMINI_API_KEY",
            Self::RunwayApiKey => "RUNWAYML_API_KEY",
            Self::ElevenLabsApiKey => "ELEVENLABS_API_KEY",
            Self::HedraApiKey => "HEDRA_API_KEY",
        }
    }

    /// Returns all credential types
    pub fn all() -> [CredentialType; 6] {
        [
            Self::OpenaiApiKey,
            Self::XaiApiKey,
            Self::GeminiApiKey,
            Self::RunwayApiKey,
            Self::ElevenLabsApiKey,
            Self::HedraApiKey,
        ]
    }

    /// Validates the format of the credential value
    pub fn validate(&self, value: &str) -> CoreResult<()> {
        if value.trim().is_empty() {
            return Err(CoreError::ValidationError(format!(
                "{} is empty",
                self.secret_name()
            )));
        }

        if value.len() > 1024 {
            return Err(CoreError::ValidationError(format!(
                "{} is too long (max 1024 bytes)",
                self.secret_name()
            )));
        }

        // Basic format validation (not exhaustive - APIs will reject invalid keys)
        match self {
            Self::OpenaiApiKey => {
                if !value.starts_with("sk-") && !value.starts_with("sess-") {
                    warn!("OpenAI API key does not match expected format (sk-*), proceeding anyway");
                }
            }
            Self::XaiApiKey => {
                if !value.starts_with("xai-") {
                    warn!("xAI API key does not match expected format (xai-*), proceeding anyway");
                }
            }
            Self::GeminiApiKey => {
                if !value.starts_with("AIza") {
                    warn!("Google API key does not match expected format (AIza*), proceeding anyway");
                }
            }
            Self::RunwayApiKey | Self::ElevenLabsApiKey | Self::HedraApiKey => {}
        }

        Ok(())
    }

    /// Returns a redacted preview of the credential for logging
    pub fn redact(value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() < 12 {
            "*".repeat(chars.len())
        } else {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}

impl std::fmt::Display for CredentialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.secret_name())
    }
}

// =============================================================================
// Secret Sources
// =============================================================================

/// Read-only secret lookup by name
pub trait SecretSource: Send + Sync {
    /// Returns the secret value, or `None` when it is not configured.
    fn get_secret(&self, name: &str) -> Option<String>;

    /// Looks up a typed credential, treating blank values as absent.
    fn credential(&self, credential: CredentialType) -> Option<String> {
        self.get_secret(credential.secret_name())
            .filter(|v| !v.trim().is_empty())
    }
}

/// Reads secrets from the process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretSource;

impl SecretSource for EnvSecretSource {
    fn get_secret(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

/// Fixed name/value map.
///
/// Used for secrets loaded from a file and as the test double for the
/// environment.
#[derive(Debug, Default, Clone)]
pub struct StaticSecretSource {
    values: HashMap<String, String>,
}

impl StaticSecretSource {
    /// Creates an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Adds a typed credential
    pub fn with_credential(self, credential: CredentialType, value: impl Into<String>) -> Self {
        self.with(credential.secret_name(), value)
    }

    /// Loads a flat JSON object of `name: value` pairs
    pub fn from_json_file(path: &std::path::Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let values: HashMap<String, String> = serde_json::from_str(&raw)?;
        debug!("Loaded {} secrets from {}", values.len(), path.display());
        Ok(Self { values })
    }
}

impl SecretSource for StaticSecretSource {
    fn get_secret(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

/// Environment first, managed secret store second.
///
/// The managed store is only consulted when a project is configured for it,
/// matching how a cloud secret manager needs a project scope to resolve a
/// secret name.
pub struct LayeredSecretSource {
    primary: Arc<dyn SecretSource>,
    managed: Option<Arc<dyn SecretSource>>,
    project_id: Option<String>,
}

impl LayeredSecretSource {
    /// Creates a source backed only by `primary`
    pub fn new(primary: Arc<dyn SecretSource>) -> Self {
        Self {
            primary,
            managed: None,
            project_id: None,
        }
    }

    /// Attaches a managed store scoped to `project_id`
    pub fn with_managed_store(
        mut self,
        project_id: Option<String>,
        store: Arc<dyn SecretSource>,
    ) -> Self {
        self.project_id = project_id.filter(|p| !p.trim().is_empty());
        self.managed = Some(store);
        self
    }
}

impl SecretSource for LayeredSecretSource {
    fn get_secret(&self, name: &str) -> Option<String> {
        if let Some(value) = self.primary.get_secret(name) {
            return Some(value);
        }

        let project = self.project_id.as_deref()?;
        let store = self.managed.as_ref()?;
        let value = store.get_secret(name);
        if value.is_some() {
            debug!("Resolved secret {} from managed store (project {})", name, project);
        }
        value
    }
}

// =============================================================================
// Tests
// =============================================================================
