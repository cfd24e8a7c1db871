//! Distributed cache seam
//!
//! The query cache talks to a shared cache tier through this trait. The Redis
//! implementation lives in `gallery-infra`; tests use in-memory doubles.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Shared key/value cache with per-entry expiry.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Look up a value. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl_seconds`.
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;
}
