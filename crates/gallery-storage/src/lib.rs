//! Gallery Storage Library
//!
//! The Blob Store: where picture binaries and their derived copies live.
//! It provides the [`BlobStore`] trait plus local filesystem and S3 backends.
//!
//! # Storage key format
//!
//! Keys are `{prefix}/{yyyy-MM-dd}_{random16}.{ext}` where the prefix is
//! `public/{user_id}` for public uploads and `space/{space_id}` for uploads
//! into a private space. Derived copies sit next to the original:
//!
//! - compressed copy: `{stem}.webp`
//! - thumbnail: `{stem}_thumbnail.{ext}`
//!
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod picture;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use gallery_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use picture::{DerivationRules, ImageMetadata};
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{
    ArtifactInfo, ArtifactKind, BlobStore, ByteStream, PictureStoreOutcome, StorageError,
    StorageResult,
};
