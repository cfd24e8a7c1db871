//! Gallery Worker Library
//!
//! Background queue that deletes blobs once no picture record references them.
//! Jobs are retried with capped exponential backoff until they succeed or
//! exhaust their retry budget.

pub mod context;
pub mod job;
pub mod queue;

pub use context::CleanupHandler;
pub use job::{CleanupJob, CleanupOutcome};
pub use queue::{CleanupQueue, CleanupQueueConfig, QueueStats, MAX_RETRY_BACKOFF_SECS};
