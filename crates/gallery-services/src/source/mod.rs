//! Picture sources.
//!
//! Every upload starts from one [`PictureSource`] variant. Each variant knows
//! how to validate itself, stage its content into a local temporary file, and
//! describe the name the picture had at its origin.

pub mod checks;
pub mod remote;
pub mod ssrf;

use bytes::Bytes;
use gallery_core::AppError;
use reqwest::Url;
use std::path::Path;
use tempfile::TempPath;

use crate::config::UploadConfig;
use checks::{extension_of, validate_extension, validate_size, FALLBACK_EXTENSION};

/// Shared state the sources need: limits and an HTTP client.
#[derive(Clone)]
pub struct SourceContext {
    config: UploadConfig,
    client: reqwest::Client,
}

impl SourceContext {
    pub fn new(config: UploadConfig) -> Result<Self, AppError> {
        // Redirects are followed by `remote::download`, which checks every hop.
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }
}

/// Where the picture content comes from.
#[derive(Debug, Clone)]
pub enum PictureSource {
    /// Bytes sent by the caller.
    File { file_name: String, data: Bytes },
    /// A remote picture named by the caller.
    Url { url: String },
    /// A remote picture found by a batch scrape.
    Scraped { url: String },
}

impl PictureSource {
    pub fn kind(&self) -> &'static str {
        match self {
            PictureSource::File { .. } => "file",
            PictureSource::Url { .. } => "url",
            PictureSource::Scraped { .. } => "scrape",
        }
    }

    fn remote_url(&self) -> Option<&str> {
        match self {
            PictureSource::Url { url } | PictureSource::Scraped { url } => Some(url.as_str()),
            PictureSource::File { .. } => None,
        }
    }

    /// Reject content that must not reach the Blob Store.
    pub async fn validate(&self, ctx: &SourceContext) -> Result<(), AppError> {
        let config = ctx.config();
        match self {
            PictureSource::File { file_name, data } => {
                if data.is_empty() {
                    return Err(AppError::InvalidParams("File must not be empty".to_string()));
                }
                validate_size(data.len() as u64, config.max_picture_size_bytes)?;
                validate_extension(file_name, &config.allowed_extensions)?;
                Ok(())
            }
            PictureSource::Url { url } | PictureSource::Scraped { url } => {
                let url = remote::parse_remote_url(url)?;
                if !config.allow_private_ips {
                    ssrf::ensure_public_host(&url).await?;
                }
                remote::probe(ctx, &url).await
            }
        }
    }

    /// Copy the content into a fresh temporary file.
    ///
    /// A failed stage leaves nothing behind.
    pub async fn stage(&self, ctx: &SourceContext) -> Result<StagedFile, AppError> {
        let extension = self.extension(ctx.config());
        let path = create_temp_path(&ctx.config().temp_dir, &extension).await?;

        let size = match self {
            PictureSource::File { data, .. } => {
                tokio::fs::write(&path, data).await?;
                data.len() as u64
            }
            PictureSource::Url { url } | PictureSource::Scraped { url } => {
                let url = remote::parse_remote_url(url)?;
                remote::download(ctx, &url, &path).await?
            }
        };

        tracing::debug!(
            source = self.kind(),
            path = %path.display(),
            size_bytes = size,
            "Picture source staged"
        );

        Ok(StagedFile {
            path,
            extension,
            size,
        })
    }

    /// Name of the picture at its origin: the uploaded file name or the last URL segment.
    pub fn describe_original_name(&self) -> String {
        match self {
            PictureSource::File { file_name, .. } => Path::new(file_name)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(file_name.as_str())
                .to_string(),
            PictureSource::Url { url } | PictureSource::Scraped { url } => Url::parse(url)
                .ok()
                .and_then(|u| {
                    u.path_segments()
                        .and_then(|mut segments| segments.next_back().map(String::from))
                })
                .filter(|segment| !segment.is_empty())
                .unwrap_or_else(|| "picture".to_string()),
        }
    }

    /// Extension used for the storage key.
    fn extension(&self, config: &UploadConfig) -> String {
        let from_name = extension_of(&self.describe_original_name());
        match (self.remote_url(), from_name) {
            (None, Some(ext)) => ext,
            (Some(_), Some(ext)) if config.allowed_extensions.contains(&ext) => ext,
            _ => FALLBACK_EXTENSION.to_string(),
        }
    }
}

async fn create_temp_path(dir: &Path, extension: &str) -> Result<TempPath, AppError> {
    tokio::fs::create_dir_all(dir).await?;
    let file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&format!(".{}", extension))
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

/// A source's content on local disk. Deleted by [`StagedFile::remove`] or on drop.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    extension: String,
    size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the file. A failure is logged and otherwise ignored.
    pub fn remove(self) {
        let staged_path = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            tracing::warn!(path = %staged_path, error = %e, "Failed to remove staged upload");
        }
    }
}
