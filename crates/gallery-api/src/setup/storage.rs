//! Blob Store setup

use anyhow::{Context, Result};
use gallery_core::Config;
use gallery_storage::{create_storage, BlobStore};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn BlobStore>> {
    tracing::info!(backend = ?config.storage_backend(), "Initializing blob store...");
    let blobs = create_storage(config)
        .await
        .context("Failed to initialize blob store")?;
    tracing::info!(
        backend = ?blobs.backend_type(),
        derivatives = config.derivatives_enabled(),
        "Blob store initialized"
    );
    Ok(blobs)
}
