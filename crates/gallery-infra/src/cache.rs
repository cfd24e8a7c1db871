//! Redis-backed distributed cache

use async_trait::async_trait;
use gallery_core::{CacheError, DistributedCache};
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisResult};
use std::time::Duration;

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared cache tier on Redis.
///
/// Every round trip is bounded by `operation_timeout`; a slow Redis surfaces
/// as `CacheError::Unavailable` rather than stalling the caller.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
    operation_timeout: Duration,
}

impl RedisCache {
    /// Connect to `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(|e| CacheError::Backend(e.to_string()))?;
        let manager = tokio::time::timeout(DEFAULT_OPERATION_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Unavailable("Redis connection timed out".to_string()))?
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        Ok(Self {
            manager,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        })
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_io_error() || e.is_connection_dropped() => {
                Err(CacheError::Unavailable(format!("Redis {} failed: {}", op, e)))
            }
            Ok(Err(e)) => Err(CacheError::Backend(format!("Redis {} failed: {}", op, e))),
            Err(_) => Err(CacheError::Unavailable(format!("Redis {} timed out", op))),
        }
    }
}

#[async_trait]
impl DistributedCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        self.bounded("GET", async move {
            let result: RedisResult<Option<String>> = conn.get(key).await;
            result
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        self.bounded("SETEX", async move {
            conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await
        })
        .await
    }
}
