//! Blob Store abstraction
//!
//! Backends implement the object primitives (`put_object`, `fetch`, `delete`,
//! `exists`) and inherit the picture-aware `store_picture` operation, which
//! stores the original and its derived copies under sibling keys.

use crate::picture::{self, DerivationRules, EncodedArtifact};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use gallery_core::AppError;
use std::path::Path;
use std::pin::Pin;
use std::time::Instant;
use thiserror::Error;
use tokio::fs;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object content.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::InvalidParams(msg),
            StorageError::InvalidImage(msg) => {
                AppError::InvalidParams(format!("Unreadable picture: {}", msg))
            }
            StorageError::NotFound(key) => AppError::NotFound(format!("Blob not found: {}", key)),
            other => AppError::UpstreamFailure(other.to_string()),
        }
    }
}

/// Role of a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Original,
    Compressed,
    Thumbnail,
}

/// Where an artifact was stored and what it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactInfo {
    pub kind: ArtifactKind,
    pub key: String,
    pub url: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub format: String,
}

/// Result of `store_picture`: the stored original plus whatever was derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PictureStoreOutcome {
    pub primary: ArtifactInfo,
    pub derived: Vec<ArtifactInfo>,
}

impl PictureStoreOutcome {
    pub fn compressed(&self) -> Option<&ArtifactInfo> {
        self.derived
            .iter()
            .find(|a| a.kind == ArtifactKind::Compressed)
    }

    pub fn thumbnail(&self) -> Option<&ArtifactInfo> {
        self.derived
            .iter()
            .find(|a| a.kind == ArtifactKind::Thumbnail)
    }
}

/// Blob Store trait
///
/// All storage backends (S3, local filesystem) implement this trait so the
/// upload pipeline and the cleanup worker never depend on a concrete backend.
/// Deleting an absent key is not an error.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `key` and return its public URL.
    async fn put_object(&self, key: &str, data: Bytes) -> StorageResult<String>;

    /// Read an object as a stream of chunks.
    async fn fetch(&self, key: &str) -> StorageResult<ByteStream>;

    /// Remove an object. Succeeds when the key does not exist.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Base URL that object keys are appended to.
    fn public_base_url(&self) -> String;

    fn derivation_rules(&self) -> &DerivationRules;

    fn backend_type(&self) -> StorageBackend;

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url().trim_end_matches('/'), key)
    }

    /// Inverse of `url_for`. `None` for URLs this store did not hand out.
    fn key_from_url(&self, url: &str) -> Option<String> {
        let base = format!("{}/", self.public_base_url().trim_end_matches('/'));
        url.strip_prefix(&base)
            .filter(|key| !key.is_empty())
            .map(String::from)
    }

    /// Store a local file as-is.
    async fn store(&self, key: &str, local_file: &Path) -> StorageResult<ArtifactInfo> {
        let data = Bytes::from(fs::read(local_file).await?);
        let size = data.len() as u64;
        let url = self.put_object(key, data).await?;
        Ok(ArtifactInfo {
            kind: ArtifactKind::Original,
            key: key.to_string(),
            url,
            size,
            width: 0,
            height: 0,
            format: crate::keys::extension(key).unwrap_or_default().to_string(),
        })
    }

    /// Store a picture and its derived copies.
    ///
    /// The original is always written under `key`. When derivation is enabled a
    /// compressed WebP copy and, above the size threshold, a thumbnail are
    /// written next to it. If any write fails, the keys already written are
    /// removed before the error is returned.
    async fn store_picture(
        &self,
        key: &str,
        local_file: &Path,
    ) -> StorageResult<PictureStoreOutcome> {
        crate::keys::validate_key(key)?;
        let start = Instant::now();
        let data = Bytes::from(fs::read(local_file).await?);

        let rules = self.derivation_rules().clone();
        let (metadata, encoded) = {
            let data = data.clone();
            let key = key.to_string();
            tokio::task::spawn_blocking(move || picture::process(&data, &key, &rules))
                .await
                .map_err(|e| StorageError::BackendError(format!("Derivation task failed: {}", e)))??
        };

        let size = data.len() as u64;
        let url = self.put_object(key, data).await?;
        let primary = ArtifactInfo {
            kind: ArtifactKind::Original,
            key: key.to_string(),
            url,
            size,
            width: metadata.width,
            height: metadata.height,
            format: metadata.format,
        };

        let mut derived: Vec<ArtifactInfo> = Vec::with_capacity(encoded.len());
        for artifact in encoded {
            let EncodedArtifact {
                kind,
                key: artifact_key,
                data,
                width,
                height,
                format,
            } = artifact;
            let size = data.len() as u64;
            match self.put_object(&artifact_key, Bytes::from(data)).await {
                Ok(url) => derived.push(ArtifactInfo {
                    kind,
                    key: artifact_key,
                    url,
                    size,
                    width,
                    height,
                    format,
                }),
                Err(e) => {
                    let written = std::iter::once(primary.key.as_str())
                        .chain(derived.iter().map(|a| a.key.as_str()));
                    for written_key in written {
                        if let Err(cleanup_err) = self.delete(written_key).await {
                            tracing::warn!(
                                error = %cleanup_err,
                                key = %written_key,
                                "Failed to remove partially stored picture"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(
            key = %key,
            size_bytes = size,
            derived = derived.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Picture stored"
        );

        Ok(PictureStoreOutcome { primary, derived })
    }
}
