//! Blob cleanup after a picture is deleted or replaced.

use anyhow::Context;
use async_trait::async_trait;
use gallery_db::PictureStore;
use gallery_storage::BlobStore;
use gallery_worker::{CleanupHandler, CleanupJob, CleanupOutcome};
use std::sync::Arc;

/// Deletes a job's blobs once no picture record references its primary URL.
pub struct BlobCleanupHandler {
    pictures: Arc<dyn PictureStore>,
    blobs: Arc<dyn BlobStore>,
}

impl BlobCleanupHandler {
    pub fn new(pictures: Arc<dyn PictureStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { pictures, blobs }
    }
}

#[async_trait]
impl CleanupHandler for BlobCleanupHandler {
    async fn handle_cleanup(&self, job: &CleanupJob) -> anyhow::Result<CleanupOutcome> {
        let references = self
            .pictures
            .count_by_url(&job.reference_url)
            .await
            .context("Failed to count references to picture blob")?;
        if references > 0 {
            tracing::info!(
                picture_id = %job.picture_id,
                url = %job.reference_url,
                references = references,
                "Blob still referenced, skipping cleanup"
            );
            return Ok(CleanupOutcome::StillReferenced);
        }

        let mut deleted = 0;
        for url in &job.urls {
            let Some(key) = self.blobs.key_from_url(url) else {
                tracing::warn!(url = %url, "URL does not belong to this Blob Store, skipping");
                continue;
            };
            self.blobs
                .delete(&key)
                .await
                .with_context(|| format!("Failed to delete blob {}", key))?;
            deleted += 1;
        }

        tracing::info!(
            picture_id = %job.picture_id,
            deleted = deleted,
            "Picture blobs removed"
        );
        Ok(CleanupOutcome::Deleted(deleted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{picture, InMemoryPictureStore, MemoryBlobStore};
    use bytes::Bytes;
    use gallery_core::models::ReviewStatus;
    use uuid::Uuid;

    async fn seed(blobs: &MemoryBlobStore, keys: &[&str]) -> Vec<String> {
        let mut urls = Vec::new();
        for key in keys {
            urls.push(
                blobs
                    .put_object(key, Bytes::from_static(b"blob"))
                    .await
                    .unwrap(),
            );
        }
        urls
    }

    #[tokio::test]
    async fn test_deletes_unreferenced_blobs() {
        let pictures = Arc::new(InMemoryPictureStore::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        let urls = seed(&blobs, &["public/u/a.webp", "public/u/a_thumbnail.png"]).await;
        let handler = BlobCleanupHandler::new(pictures, blobs.clone());

        let job = CleanupJob::new(Uuid::new_v4(), urls[0].clone(), urls);
        let outcome = handler.handle_cleanup(&job).await.unwrap();

        assert_eq!(outcome, CleanupOutcome::Deleted(2));
        assert!(blobs.keys().is_empty());
    }

    #[tokio::test]
    async fn test_keeps_blobs_still_referenced() {
        let pictures = Arc::new(InMemoryPictureStore::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        let urls = seed(&blobs, &["public/u/shared.webp"]).await;

        let mut survivor = picture(Uuid::new_v4(), ReviewStatus::Pass);
        survivor.url = urls[0].clone();
        pictures.put(survivor);

        let handler = BlobCleanupHandler::new(pictures, blobs.clone());
        let job = CleanupJob::new(Uuid::new_v4(), urls[0].clone(), urls);

        assert_eq!(
            handler.handle_cleanup(&job).await.unwrap(),
            CleanupOutcome::StillReferenced
        );
        assert!(blobs.contains("public/u/shared.webp"));
    }

    #[tokio::test]
    async fn test_foreign_urls_are_skipped() {
        let pictures = Arc::new(InMemoryPictureStore::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        let handler = BlobCleanupHandler::new(pictures, blobs);

        let foreign = "https://elsewhere.example/x.png".to_string();
        let job = CleanupJob::new(Uuid::new_v4(), foreign.clone(), vec![foreign]);
        assert_eq!(
            handler.handle_cleanup(&job).await.unwrap(),
            CleanupOutcome::Deleted(0)
        );
    }
}
