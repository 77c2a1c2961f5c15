//! Engine Configuration
//!
//! Provider endpoints, default models, polling policy and asset locations.
//! Loaded from an optional JSON file; every section falls back to defaults so
//! a partial or missing file still yields a usable engine.
//!
//! A few values may also be overridden through the secret source
//! (`XAI_API_URL`, `HEDRA_API_URL`, `ELEVENLABS_VOICE_ID`, `GCP_PROJECT_ID`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use super::credentials::SecretSource;
use super::{CoreError, CoreResult};

/// Fixed interval between video status polls, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Poll attempts before a video job is abandoned
pub const DEFAULT_MAX_POLLS: u32 = 60;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Provider base URLs
    #[serde(default)]
    pub endpoints: EndpointSettings,

    /// Default model per provider
    #[serde(default)]
    pub models: ModelSettings,

    /// Chat defaults
    #[serde(default)]
    pub chat: ChatSettings,

    /// Video job polling
    #[serde(default)]
    pub video: VideoSettings,

    /// Static asset locations
    #[serde(default)]
    pub assets: AssetSettings,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Cloud project used to scope the managed secret store
    #[serde(default)]
    pub gcp_project_id: Option<String>,
}

/// Provider base URLs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSettings {
    #[serde(default = "default_openai_base_url")]
    pub openai: String,
    #[serde(default = "default_xai_base_url")]
    pub xai: String,
    #[serde(default = "default_gemini_base_url")]
    pub gemini: String,
    #[serde(default = "default_runway_base_url")]
    pub runway: String,
    #[serde(default = "default_runway_legacy_base_url")]
    pub runway_legacy: String,
    /// Value of the `X-Runway-Version` header
    #[serde(default = "default_runway_api_version")]
    pub runway_api_version: String,
    #[serde(default = "default_elevenlabs_base_url")]
    pub elevenlabs: String,
    #[serde(default = "default_hedra_base_url")]
    pub hedra: String,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_xai_base_url() -> String {
    "https://api.xai.com/v1".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_runway_base_url() -> String {
    "https://api.dev.runwayml.com".to_string()
}
fn default_runway_legacy_base_url() -> String {
    "https://api.runwayml.com".to_string()
}
fn default_runway_api_version() -> String {
    "2024-11-06".to_string()
}
fn default_elevenlabs_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}
fn default_hedra_base_url() -> String {
    "https://api.hedra.com/v1".to_string()
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            openai: default_openai_base_url(),
            xai: default_xai_base_url(),
            gemini: default_gemini_base_url(),
            runway: default_runway_base_url(),
            runway_legacy: default_runway_legacy_base_url(),
            runway_api_version: default_runway_api_version(),
            elevenlabs: default_elevenlabs_base_url(),
            hedra: default_hedra_base_url(),
        }
    }
}

/// Default model per provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    pub openai_chat: String,
    pub xai_chat: String,
    pub gemini_chat: String,
    pub dalle: String,
    pub openai_chat_image: String,
    pub xai_image: String,
    pub imagen: String,
    pub runway: String,
    pub elevenlabs: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            openai_chat: "gpt-4-turbo".to_string(),
            xai_chat: "grok-3".to_string(),
            gemini_chat: "gemini-1.5-flash".to_string(),
            dalle: "dall-e-3".to_string(),
            openai_chat_image: "gpt-4o-mini".to_string(),
            xai_image: "grok-image-1".to_string(),
            imagen: "imagen-3.0-generate-002".to_string(),
            runway: "gen4_turbo".to_string(),
            elevenlabs: "eleven_monolingual_v1".to_string(),
        }
    }
}

/// Chat defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Messages kept per conversation
    pub memory_limit: usize,
    /// Seed message for new conversations
    pub system_prompt: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            memory_limit: 20,
            system_prompt: "You are a helpful AI assistant. You are knowledgeable, friendly, \
                and provide accurate information. You can help with a wide range of tasks, \
                from answering questions to providing creative content."
                .to_string(),
        }
    }
}

/// Video job polling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSettings {
    pub poll_interval_secs: u64,
    pub max_polls: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

impl VideoSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Static asset locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetSettings {
    /// Image returned when no generator produces a result
    pub default_image_url: String,
    /// Face used for talking-head videos when the caller supplies none
    pub default_face_image_url: String,
    /// Voice used for speech when the caller supplies none
    pub default_voice_id: Option<String>,
    /// Directory persisted artifacts are written to
    pub static_dir: PathBuf,
    /// URL prefix the static directory is served under
    pub public_prefix: String,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            default_image_url: "https://storage.googleapis.com/genrelay-assets/default_image.jpg"
                .to_string(),
            default_face_image_url:
                "https://storage.googleapis.com/genrelay-assets/default_face.jpg".to_string(),
            default_voice_id: None,
            static_dir: PathBuf::from("static"),
            public_prefix: "/static".to_string(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 180 }
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file, normalizing invalid values
    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ValidationError(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut config: EngineConfig = serde_json::from_str(&raw)?;
        config.normalize();
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Clamps values so the engine never runs with a degenerate policy.
    ///
    /// Tolerant by design of the file format: bad values are corrected with a
    /// warning rather than rejected.
    pub fn normalize(&mut self) {
        if self.video.poll_interval_secs == 0 {
            warn!("pollIntervalSecs must be positive, using default");
            self.video.poll_interval_secs = DEFAULT_POLL_INTERVAL_SECS;
        }
        if self.video.max_polls == 0 {
            warn!("maxPolls must be positive, using default");
            self.video.max_polls = DEFAULT_MAX_POLLS;
        }
        self.chat.temperature = self.chat.temperature.clamp(0.0, 2.0);
        self.chat.max_tokens = self.chat.max_tokens.clamp(1, 32_000);
        self.chat.memory_limit = self.chat.memory_limit.clamp(2, 200);
        self.http.timeout_secs = self.http.timeout_secs.clamp(5, 900);

        for url in [
            &mut self.endpoints.openai,
            &mut self.endpoints.xai,
            &mut self.endpoints.gemini,
            &mut self.endpoints.runway,
            &mut self.endpoints.runway_legacy,
            &mut self.endpoints.elevenlabs,
            &mut self.endpoints.hedra,
        ] {
            while url.ends_with('/') {
                url.pop();
            }
        }
    }

    /// Applies overrides that may live next to the credentials.
    pub fn apply_secret_overrides(&mut self, secrets: &dyn SecretSource) {
        if let Some(url) = secrets.get_secret("XAI_API_URL") {
            self.endpoints.xai = url;
        }
        if let Some(url) = secrets.get_secret("HEDRA_API_URL") {
            self.endpoints.hedra = url;
        }
        if let Some(voice) = secrets.get_secret("ELEVENLABS_VOICE_ID") {
            self.assets.default_voice_id = Some(voice);
        }
        if let Some(project) = secrets.get_secret("GCP_PROJECT_ID") {
            self.gcp_project_id = Some(project);
        }
        self.normalize();
    }
}

// =============================================================================
// Tests
// =============================================================================
