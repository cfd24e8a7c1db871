//! Gallery Infrastructure Library
//!
//! Shared infrastructure used by the gallery binaries:
//! - Telemetry initialization (tracing subscriber)
//! - Redis-backed distributed cache for the picture listing

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "redis-cache")]
pub mod cache;

// Re-export commonly used types
#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};

#[cfg(feature = "redis-cache")]
pub use cache::RedisCache;
