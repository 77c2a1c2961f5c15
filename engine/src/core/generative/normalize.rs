//! Result Normalization
//!
//! Every generator hands back something different: raw bytes, a remote URL,
//! or a base64 data URI. `ResultNormalizer` turns all of them into one
//! [`Artifact`] shape. Persistence is left to an [`ArtifactSink`].
//!
//! [`ArtifactSink`]: super::sink::ArtifactSink

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::http;
use crate::core::{ArtifactKind, CoreError, CoreResult};

/// Maximum size of a downloaded artifact (2 GB)
const MAX_DOWNLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

// =============================================================================
// Artifact
// =============================================================================

/// Payload of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ArtifactData {
    /// Content held in memory
    Bytes(Vec<u8>),
    /// Remote URL or `data:` URI
    Uri(String),
}

/// Canonical generation result. Ownership passes to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub data: ArtifactData,
    pub mime_type: String,
    /// Public location once an `ArtifactSink` has stored it
    pub persisted_path: Option<String>,
}

impl Artifact {
    pub fn from_bytes(kind: ArtifactKind, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            kind,
            data: ArtifactData::Bytes(bytes),
            mime_type: mime_type.into(),
            persisted_path: None,
        }
    }

    pub fn from_uri(kind: ArtifactKind, uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            kind,
            data: ArtifactData::Uri(uri.into()),
            mime_type: mime_type.into(),
            persisted_path: None,
        }
    }

    /// In-memory bytes, if any
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.data {
            ArtifactData::Bytes(bytes) => Some(bytes),
            ArtifactData::Uri(_) => None,
        }
    }

    /// URI, if the artifact is held by reference
    pub fn uri(&self) -> Option<&str> {
        match &self.data {
            ArtifactData::Uri(uri) => Some(uri),
            ArtifactData::Bytes(_) => None,
        }
    }

    /// Encodes in-memory bytes as a data URI
    pub fn to_data_uri(&self) -> Option<String> {
        self.bytes().map(|b| encode_data_uri(&self.mime_type, b))
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Raw generator output before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    Bytes {
        data: Vec<u8>,
        mime_type: Option<String>,
    },
    RemoteUrl(String),
    DataUri(String),
    LocalPath(PathBuf),
}

impl ArtifactSource {
    /// Classifies a caller-supplied reference string
    pub fn parse(reference: &str) -> Self {
        let trimmed = reference.trim();
        if trimmed.starts_with("data:") {
            ArtifactSource::DataUri(trimmed.to_string())
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ArtifactSource::RemoteUrl(trimmed.to_string())
        } else {
            ArtifactSource::LocalPath(PathBuf::from(trimmed))
        }
    }
}

// =============================================================================
// Data URIs
// =============================================================================

/// Builds `data:{mime};base64,{payload}`
pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Splits a base64 data URI into its mime type and decoded bytes
pub fn decode_data_uri(uri: &str) -> CoreResult<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| CoreError::ValidationError("Not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CoreError::ValidationError("Data URI has no payload".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| CoreError::ValidationError("Only base64 data URIs are supported".to_string()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| CoreError::ValidationError(format!("Invalid base64 payload: {}", e)))?;

    Ok((mime.to_string(), bytes))
}

/// Guesses a mime type from a file name or URL extension
pub fn guess_mime(reference: &str) -> Option<&'static str> {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();

    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        _ => return None,
    };
    Some(mime)
}

/// Picks the mime type for downloaded content
fn resolve_mime(kind: ArtifactKind, reference: &str, content_type: Option<&str>) -> String {
    if let Some(mime) = guess_mime(reference) {
        return mime.to_string();
    }
    match content_type {
        Some(ct) if ct != "application/octet-stream" && ct.contains('/') => ct.to_string(),
        _ => kind.default_mime().to_string(),
    }
}

// =============================================================================
// Content Fetching
// =============================================================================

/// Downloads remote content
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Returns the body and the response content type
    async fn fetch(&self, url: &str) -> CoreResult<(Vec<u8>, Option<String>)>;
}

/// `reqwest`-backed fetcher restricted to http(s)
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: MAX_DOWNLOAD_BYTES,
        }
    }

    /// Lowers the download size limit
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes.min(MAX_DOWNLOAD_BYTES);
        self
    }

    fn validate_download_url(url: &str) -> CoreResult<reqwest::Url> {
        let parsed = reqwest::Url::parse(url).map_err(|e| {
            CoreError::ValidationError(format!("Invalid download URL '{}': {}", url, e))
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(CoreError::ValidationError(format!(
                "Unsupported download URL scheme '{}'. Only http/https are allowed.",
                scheme
            ))),
        }
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CoreResult<(Vec<u8>, Option<String>)> {
        let validated = Self::validate_download_url(url)?;
        let host = validated.host_str().unwrap_or("download").to_string();
        let (bytes, content_type) =
            http::send_for_bytes_limited(&host, self.client.get(validated), self.max_bytes)
                .await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), host);
        Ok((bytes, content_type))
    }
}

// =============================================================================
// Normalizer
// =============================================================================

/// Converts generator output into artifacts
#[derive(Clone)]
pub struct ResultNormalizer {
    fetcher: Arc<dyn ContentFetcher>,
}

impl ResultNormalizer {
    pub fn new(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolves a source into an artifact holding bytes.
    ///
    /// Remote URLs are downloaded, data URIs decoded, local paths read and raw
    /// bytes passed through.
    pub async fn normalize(&self, source: ArtifactSource, kind: ArtifactKind) -> CoreResult<Artifact> {
        match source {
            ArtifactSource::Bytes { data, mime_type } => {
                let mime = mime_type.unwrap_or_else(|| kind.default_mime().to_string());
                Ok(Artifact::from_bytes(kind, data, mime))
            }
            ArtifactSource::DataUri(uri) => {
                let (mime, bytes) = decode_data_uri(&uri)?;
                let mime = if mime.is_empty() {
                    kind.default_mime().to_string()
                } else {
                    mime
                };
                Ok(Artifact::from_bytes(kind, bytes, mime))
            }
            ArtifactSource::RemoteUrl(url) => {
                let (bytes, content_type) = self.fetcher.fetch(&url).await?;
                let mime = resolve_mime(kind, &url, content_type.as_deref());
                Ok(Artifact::from_bytes(kind, bytes, mime))
            }
            ArtifactSource::LocalPath(path) => {
                let bytes = tokio::fs::read(&path).await.map_err(|e| {
                    CoreError::ValidationError(format!(
                        "Failed to read {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let mime = resolve_mime(kind, &path.to_string_lossy(), None);
                Ok(Artifact::from_bytes(kind, bytes, mime))
            }
        }
    }

    /// Rewrites an artifact so its content travels inline as a data URI
    pub async fn inline(&self, artifact: Artifact) -> CoreResult<Artifact> {
        if artifact.uri().is_some_and(|u| u.starts_with("data:")) {
            return Ok(artifact);
        }

        let kind = artifact.kind;
        let resolved = match artifact.data {
            ArtifactData::Uri(uri) => {
                self.normalize(ArtifactSource::RemoteUrl(uri), kind).await?
            }
            ArtifactData::Bytes(bytes) => Artifact::from_bytes(kind, bytes, artifact.mime_type),
        };

        let data_uri = encode_data_uri(&resolved.mime_type, resolved.bytes().unwrap_or_default());
        Ok(Artifact::from_uri(kind, data_uri, resolved.mime_type))
    }
}

// =============================================================================
// Tests
// =============================================================================
