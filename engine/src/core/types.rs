//! GenRelay Core Type Definitions
//!
//! Defines fundamental types used throughout the engine.

use serde::{Deserialize, Serialize};

use super::credentials::CredentialType;

// =============================================================================
// ID Types
// =============================================================================

/// Generation request identifier (ULID)
pub type RequestId = String;

/// Provider-assigned job identifier
pub type JobId = String;

// =============================================================================
// Capability
// =============================================================================

/// Logical kind of generation a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Text/chat completion
    Chat,
    /// Image generation
    Image,
    /// Video generation (lip-sync or character)
    Video,
    /// Text-to-speech
    Audio,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Chat => write!(f, "chat"),
            Capability::Image => write!(f, "image"),
            Capability::Video => write!(f, "video"),
            Capability::Audio => write!(f, "audio"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" | "text" => Ok(Capability::Chat),
            "image" => Ok(Capability::Image),
            "video" => Ok(Capability::Video),
            "audio" | "speech" | "tts" => Ok(Capability::Audio),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}

// =============================================================================
// Provider Identity
// =============================================================================

/// Every routable backend, one variant per vendor code path.
///
/// Image generators are separate variants from the chat providers of the same
/// vendor because they hit different endpoints and fall back differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    // Chat
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "xai")]
    Xai,
    #[serde(rename = "gemini")]
    Gemini,
    // Image
    #[serde(rename = "dalle")]
    DallE,
    #[serde(rename = "gpt4o")]
    OpenAIChatImage,
    #[serde(rename = "xai_image")]
    XaiImage,
    #[serde(rename = "imagen")]
    Imagen,
    #[serde(rename = "default")]
    DefaultImage,
    // Video
    #[serde(rename = "runway")]
    Runway,
    #[serde(rename = "runway_legacy")]
    RunwayLegacy,
    #[serde(rename = "hedra")]
    Hedra,
    // Audio
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
}

impl ProviderId {
    /// Capability served by this provider
    pub fn capability(&self) -> Capability {
        match self {
            ProviderId::OpenAI | ProviderId::Xai | ProviderId::Gemini => Capability::Chat,
            ProviderId::DallE
            | ProviderId::OpenAIChatImage
            | ProviderId::XaiImage
            | ProviderId::Imagen
            | ProviderId::DefaultImage => Capability::Image,
            ProviderId::Runway | ProviderId::RunwayLegacy | ProviderId::Hedra => {
                Capability::Video
            }
            ProviderId::ElevenLabs => Capability::Audio,
        }
    }

    /// Credential the provider needs, or `None` if it needs no key at all.
    pub fn credential(&self) -> Option<CredentialType> {
        match self {
            ProviderId::OpenAI | ProviderId::DallE | ProviderId::OpenAIChatImage => {
                Some(CredentialType::OpenaiApiKey)
            }
            ProviderId::Xai | ProviderId::XaiImage => Some(CredentialType::XaiApiKey),
            ProviderId::Gemini | ProviderId::Imagen => Some(CredentialType::GeminiApiKey),
            ProviderId::Runway | ProviderId::RunwayLegacy => Some(CredentialType::RunwayApiKey),
            ProviderId::Hedra => Some(CredentialType::HedraApiKey),
            ProviderId::ElevenLabs => Some(CredentialType::ElevenLabsApiKey),
            ProviderId::DefaultImage => None,
        }
    }

    /// All providers serving a capability, in declaration order
    pub fn for_capability(capability: Capability) -> Vec<ProviderId> {
        Self::all()
            .into_iter()
            .filter(|p| p.capability() == capability)
            .collect()
    }

    /// Returns all providers
    pub fn all() -> Vec<ProviderId> {
        vec![
            ProviderId::OpenAI,
            ProviderId::Xai,
            ProviderId::Gemini,
            ProviderId::DallE,
            ProviderId::OpenAIChatImage,
            ProviderId::XaiImage,
            ProviderId::Imagen,
            ProviderId::DefaultImage,
            ProviderId::Runway,
            ProviderId::RunwayLegacy,
            ProviderId::Hedra,
            ProviderId::ElevenLabs,
        ]
    }

    /// Parses a caller-facing provider name in the context of a capability.
    ///
    /// Vendor names are ambiguous across capabilities ("openai" is a chat
    /// provider and an image generator), so the capability picks the variant.
    pub fn parse_for(capability: Capability, name: &str) -> Result<ProviderId, String> {
        let lowered = name.trim().to_lowercase();
        let parsed = match (capability, lowered.as_str()) {
            (Capability::Chat, "openai" | "gpt") => ProviderId::OpenAI,
            (Capability::Chat, "xai" | "grok") => ProviderId::Xai,
            (Capability::Chat, "gemini" | "google") => ProviderId::Gemini,
            (Capability::Image, "dalle" | "dall-e" | "openai") => ProviderId::DallE,
            (Capability::Image, "gpt4o" | "gpt-4o") => ProviderId::OpenAIChatImage,
            (Capability::Image, "xai" | "grok") => ProviderId::XaiImage,
            (Capability::Image, "imagen" | "gemini") => ProviderId::Imagen,
            (Capability::Image, "default") => ProviderId::DefaultImage,
            (Capability::Video, "runway" | "runwayml") => ProviderId::Runway,
            (Capability::Video, "runway-legacy" | "runway_legacy") => ProviderId::RunwayLegacy,
            (Capability::Video, "hedra") => ProviderId::Hedra,
            (Capability::Audio, "elevenlabs") => ProviderId::ElevenLabs,
            _ => {
                return Err(format!(
                    "Unknown {} provider: {}",
                    capability,
                    name.trim()
                ))
            }
        };
        Ok(parsed)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderId::OpenAI => "openai",
            ProviderId::Xai => "xai",
            ProviderId::Gemini => "gemini",
            ProviderId::DallE => "dalle",
            ProviderId::OpenAIChatImage => "gpt4o",
            ProviderId::XaiImage => "xai_image",
            ProviderId::Imagen => "imagen",
            ProviderId::DefaultImage => "default",
            ProviderId::Runway => "runway",
            ProviderId::RunwayLegacy => "runway_legacy",
            ProviderId::Hedra => "hedra",
            ProviderId::ElevenLabs => "elevenlabs",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Artifact Kind
// =============================================================================

/// Media kind of a generated artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Video,
    Audio,
}

impl ArtifactKind {
    /// Mime type assumed when nothing better can be inferred
    pub fn default_mime(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image/jpeg",
            ArtifactKind::Video => "video/mp4",
            ArtifactKind::Audio => "audio/mpeg",
        }
    }

    /// File extension used when persisting
    pub fn default_extension(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "jpg",
            ArtifactKind::Video => "mp4",
            ArtifactKind::Audio => "mp3",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Image => write!(f, "image"),
            ArtifactKind::Video => write!(f, "video"),
            ArtifactKind::Audio => write!(f, "audio"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_parsing() {
        assert_eq!("chat".parse::<Capability>().unwrap(), Capability::Chat);
        assert_eq!("TEXT".parse::<Capability>().unwrap(), Capability::Chat);
        assert_eq!("tts".parse::<Capability>().unwrap(), Capability::Audio);
        assert!("music".parse::<Capability>().is_err());
    }

    #[test]
    fn test_provider_parse_depends_on_capability() {
        assert_eq!(
            ProviderId::parse_for(Capability::Chat, "openai").unwrap(),
            ProviderId::OpenAI
        );
        assert_eq!(
            ProviderId::parse_for(Capability::Image, "openai").unwrap(),
            ProviderId::DallE
        );
        assert_eq!(
            ProviderId::parse_for(Capability::Image, " Gemini ").unwrap(),
            ProviderId::Imagen
        );
        assert!(ProviderId::parse_for(Capability::Chat, "hedra").is_err());
    }

    #[test]
    fn test_provider_capability_partition() {
        let chat = ProviderId::for_capability(Capability::Chat);
        assert_eq!(
            chat,
            vec![ProviderId::OpenAI, ProviderId::Xai, ProviderId::Gemini]
        );
        assert_eq!(
            ProviderId::for_capability(Capability::Audio),
            vec![ProviderId::ElevenLabs]
        );
    }

    #[test]
    fn test_default_image_needs_no_credential() {
        assert!(ProviderId::DefaultImage.credential().is_none());
        assert_eq!(
            ProviderId::RunwayLegacy.credential(),
            Some(CredentialType::RunwayApiKey)
        );
    }

    #[test]
    fn test_provider_serialization() {
        assert_eq!(
            serde_json::to_string(&ProviderId::OpenAIChatImage).unwrap(),
            "\"gpt4o\""
        );
        assert_eq!(
            serde_json::from_str::<ProviderId>("\"xai\"").unwrap(),
            ProviderId::Xai
        );
    }

    #[test]
    fn test_artifact_kind_defaults() {
        assert_eq!(ArtifactKind::Image.default_mime(), "image/jpeg");
        assert_eq!(ArtifactKind::Video.default_mime(), "video/mp4");
        assert_eq!(ArtifactKind::Audio.default_mime(), "audio/mpeg");
    }
}
