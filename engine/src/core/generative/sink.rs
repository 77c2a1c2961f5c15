//! Artifact Persistence
//!
//! Writes generated media under the static directory and hands back the
//! public path it will be served from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::normalize::{decode_data_uri, Artifact, ArtifactData};
use crate::core::config::AssetSettings;
use crate::core::{CoreError, CoreResult};

/// Storage for finished artifacts
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Stores the artifact and returns its public URL
    async fn persist(&self, artifact: &Artifact, file_name: &str) -> CoreResult<String>;
}

/// Filesystem sink serving files under a URL prefix
#[derive(Debug, Clone)]
pub struct LocalArtifactSink {
    root: PathBuf,
    public_prefix: String,
}

impl LocalArtifactSink {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &AssetSettings) -> Self {
        Self::new(&settings.static_dir, &settings.public_prefix)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rejects names that could escape the static directory
    fn sanitize_file_name(file_name: &str) -> CoreResult<String> {
        let cleaned: String = file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if cleaned.is_empty() || cleaned.starts_with('.') {
            return Err(CoreError::ValidationError(format!(
                "Invalid artifact file name: {:?}",
                file_name
            )));
        }
        Ok(cleaned)
    }
}

#[async_trait]
impl ArtifactSink for LocalArtifactSink {
    async fn persist(&self, artifact: &Artifact, file_name: &str) -> CoreResult<String> {
        let bytes = match &artifact.data {
            ArtifactData::Bytes(bytes) => bytes.clone(),
            ArtifactData::Uri(uri) if uri.starts_with("data:") => decode_data_uri(uri)?.1,
            ArtifactData::Uri(_) => {
                return Err(CoreError::ValidationError(
                    "Remote artifacts must be normalized before persisting".to_string(),
                ))
            }
        };

        let subdir = artifact.kind.to_string();
        let file_name = Self::sanitize_file_name(file_name)?;
        let dir = self.root.join(&subdir);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file_name), &bytes).await?;

        let public = format!("{}/{}/{}", self.public_prefix, subdir, file_name);
        info!("Persisted {} ({} bytes)", public, bytes.len());
        Ok(public)
    }
}
