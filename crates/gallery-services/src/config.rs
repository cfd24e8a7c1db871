//! Service-level settings.
//!
//! Services never read the environment. The composition root derives these
//! from [`gallery_core::Config`]; tests build them directly.

use gallery_core::constants::MAX_BATCH_COUNT;
use gallery_core::Config;
use std::path::PathBuf;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Limits and staging settings for single-picture uploads.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_picture_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
    /// Directory holding staged files while they are handed to the Blob Store.
    pub temp_dir: PathBuf,
    pub http_timeout: Duration,
    pub allow_private_ips: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_picture_size_bytes: 2 * MIB,
            allowed_extensions: ["png", "jpg", "jpeg", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_content_types: ["image/jpeg", "image/jpg", "image/png", "image/webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            temp_dir: std::env::temp_dir().join("gallery-uploads"),
            http_timeout: Duration::from_secs(10),
            allow_private_ips: false,
        }
    }
}

impl UploadConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_picture_size_bytes: config.max_picture_size_bytes(),
            allowed_extensions: config.allowed_extensions().to_vec(),
            allowed_content_types: config.allowed_content_types().to_vec(),
            temp_dir: PathBuf::from(config.upload_temp_dir()),
            http_timeout: Duration::from_secs(config.http_client_timeout_secs()),
            allow_private_ips: config.url_upload_allow_private_ips(),
        }
    }
}

/// Sizing and expiry of the two listing cache tiers.
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    pub local_capacity: usize,
    pub local_ttl: Duration,
    pub remote_base_ttl_secs: u64,
    /// Upper bound of the random extra expiry added to each remote entry.
    pub remote_jitter_secs: u64,
    pub key_prefix: String,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            local_capacity: 10_000,
            local_ttl: Duration::from_secs(300),
            remote_base_ttl_secs: 300,
            remote_jitter_secs: 300,
            key_prefix: "gallery:listPictureViewByPage:".to_string(),
        }
    }
}

impl QueryCacheConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            local_capacity: config.cache_local_capacity(),
            local_ttl: Duration::from_secs(config.cache_local_ttl_secs()),
            remote_base_ttl_secs: config.cache_remote_base_ttl_secs(),
            remote_jitter_secs: config.cache_remote_jitter_secs(),
            key_prefix: config.cache_key_prefix().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Search page URL with a `{query}` placeholder.
    pub search_url: String,
    pub max_count: u32,
    pub http_timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            search_url: "https://cn.bing.com/images/async?q={query}&mmasync=1".to_string(),
            max_count: MAX_BATCH_COUNT,
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl ScrapeConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_url: config.scrape_search_url().to_string(),
            max_count: config.scrape_max_count(),
            http_timeout: Duration::from_secs(config.http_client_timeout_secs()),
        }
    }
}
