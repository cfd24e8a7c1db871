//! Cleanup handler trait
//!
//! The services crate implements this with access to the picture Store and
//! the Blob Store. The queue calls `handle_cleanup` for every attempt, so
//! implementations must be idempotent.

use anyhow::Result;
use async_trait::async_trait;

use crate::job::{CleanupJob, CleanupOutcome};

#[async_trait]
pub trait CleanupHandler: Send + Sync {
    async fn handle_cleanup(&self, job: &CleanupJob) -> Result<CleanupOutcome>;
}
