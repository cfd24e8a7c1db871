//! Repository and service wiring

use anyhow::Result;
use gallery_core::{Config, DistributedCache};
use gallery_db::{PgPictureRepository, PgSpaceRepository, PgUserRepository};
use gallery_infra::RedisCache;
use gallery_services::{QueryCacheConfig, ScrapeConfig, UploadConfig};
use gallery_storage::BlobStore;
use gallery_worker::CleanupQueueConfig;
use sqlx::PgPool;
use std::sync::Arc;

use crate::state::{AppState, Backends, Settings};

pub async fn initialize_services(
    config: &Config,
    pool: PgPool,
    blobs: Arc<dyn BlobStore>,
) -> Result<Arc<AppState>> {
    let backends = Backends {
        pictures: Arc::new(PgPictureRepository::new(pool.clone())),
        spaces: Arc::new(PgSpaceRepository::new(pool.clone())),
        users: Arc::new(PgUserRepository::new(pool)),
        blobs,
        remote_cache: connect_remote_cache(config).await,
    };

    let settings = Settings {
        upload: UploadConfig::from_config(config),
        cache: QueryCacheConfig::from_config(config),
        scrape: ScrapeConfig::from_config(config),
        cleanup: CleanupQueueConfig {
            max_workers: config.cleanup_max_workers(),
            max_retries: config.cleanup_max_retries(),
            ..CleanupQueueConfig::default()
        },
    };
    tracing::info!(
        max_picture_mb = settings.upload.max_picture_size_bytes / 1024 / 1024,
        cleanup_workers = settings.cleanup.max_workers,
        "Services configured"
    );

    Ok(Arc::new(AppState::build(backends, settings)?))
}

/// The listing keeps working on its local tier when Redis is absent or down.
async fn connect_remote_cache(config: &Config) -> Option<Arc<dyn DistributedCache>> {
    let url = config.redis_url()?;
    match RedisCache::connect(url).await {
        Ok(cache) => {
            tracing::info!("Distributed listing cache connected");
            Some(Arc::new(cache))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Distributed listing cache unavailable, using local tier only");
            None
        }
    }
}
