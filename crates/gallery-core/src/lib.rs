//! Gallery Core Library
//!
//! This crate provides core domain models, error types, configuration, and validation
//! that are shared across all Gallery components.

pub mod config;
pub mod constants;
pub mod distributed_cache;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{BaseConfig, Config, GalleryConfig};
pub use distributed_cache::{CacheError, DistributedCache};
pub use error::{AppError, ErrorKind, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
