//! Application state shared by every handler.

use gallery_core::DistributedCache;
use gallery_db::{PictureStore, SpaceStore, UserStore};
use gallery_services::{
    BatchScraper, BlobCleanupHandler, PictureService, QueryCache, QueryCacheConfig,
    ReviewStateMachine, ScrapeConfig, SourceContext, SpaceAllocator, UploadConfig,
    UploadPipeline,
};
use gallery_storage::BlobStore;
use gallery_worker::{CleanupQueue, CleanupQueueConfig};
use std::sync::Arc;

/// Collaborators behind the service traits.
#[derive(Clone)]
pub struct Backends {
    pub pictures: Arc<dyn PictureStore>,
    pub spaces: Arc<dyn SpaceStore>,
    pub users: Arc<dyn UserStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub remote_cache: Option<Arc<dyn DistributedCache>>,
}

/// Service settings derived from [`gallery_core::Config`], or built directly in tests.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub upload: UploadConfig,
    pub cache: QueryCacheConfig,
    pub scrape: ScrapeConfig,
    pub cleanup: CleanupQueueConfig,
}

pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub uploads: Arc<UploadPipeline>,
    pub scraper: BatchScraper,
    pub pictures: PictureService,
    pub reviews: ReviewStateMachine,
    pub spaces: SpaceAllocator,
    pub listing: QueryCache,
    pub cleanup: CleanupQueue,
}

impl AppState {
    /// Wire the services. Spawns the cleanup worker pool on the current runtime.
    pub fn build(backends: Backends, settings: Settings) -> anyhow::Result<Self> {
        let cleanup = CleanupQueue::new(
            settings.cleanup,
            Arc::new(BlobCleanupHandler::new(
                backends.pictures.clone(),
                backends.blobs.clone(),
            )),
        );

        let uploads = Arc::new(UploadPipeline::new(
            SourceContext::new(settings.upload)?,
            backends.pictures.clone(),
            backends.spaces.clone(),
            backends.blobs.clone(),
            cleanup.clone(),
        ));

        Ok(Self {
            users: backends.users.clone(),
            scraper: BatchScraper::new(uploads.clone(), settings.scrape)?,
            uploads,
            pictures: PictureService::new(
                backends.pictures.clone(),
                backends.users.clone(),
                cleanup.clone(),
            ),
            reviews: ReviewStateMachine::new(backends.pictures.clone()),
            spaces: SpaceAllocator::new(backends.spaces),
            listing: QueryCache::new(
                backends.pictures,
                backends.users,
                backends.remote_cache,
                settings.cache,
            ),
            cleanup,
        })
    }

    /// Largest request body accepted: one picture plus room for the form fields.
    pub fn max_body_bytes(&self) -> usize {
        let picture = self.uploads.sources().config().max_picture_size_bytes;
        usize::try_from(picture)
            .unwrap_or(usize::MAX)
            .saturating_add(64 * 1024)
    }
}
