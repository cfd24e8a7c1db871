//! Gallery Services Library
//!
//! Business rules of the gallery: the upload pipeline and its picture sources,
//! batch scraping, moderation, space allocation, the cached picture listing,
//! and blob cleanup. Persistence, blob storage and the distributed cache are
//! reached only through the traits in `gallery-db`, `gallery-storage` and
//! `gallery-core`.

pub mod cleanup;
pub mod config;
pub mod picture;
pub mod query_cache;
pub mod review;
pub mod scrape;
pub mod source;
pub mod space;
pub mod upload;
pub mod views;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use cleanup::BlobCleanupHandler;
pub use config::{QueryCacheConfig, ScrapeConfig, UploadConfig};
pub use picture::PictureService;
pub use query_cache::QueryCache;
pub use review::ReviewStateMachine;
pub use scrape::BatchScraper;
pub use source::{PictureSource, SourceContext, StagedFile};
pub use space::SpaceAllocator;
pub use upload::{UploadPipeline, UploadResult};
