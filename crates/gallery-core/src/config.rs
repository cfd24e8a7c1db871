//! Configuration module
//!
//! Server, database, blob storage, upload, cache, scrape and cleanup settings,
//! all read from the environment (with `.env` support).

use std::env;

use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SERVER_PORT: u16 = 4000;

/// Base configuration shared by every binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
}

/// Gallery backend configuration
#[derive(Clone, Debug)]
pub struct GalleryConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Blob storage
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Upload limits
    pub max_picture_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
    pub upload_temp_dir: String,
    // Derivatives
    pub derivatives_enabled: bool,
    pub thumbnail_threshold_bytes: u64,
    pub thumbnail_max_edge: u32,
    // Outbound HTTP
    pub http_client_timeout_secs: u64,
    pub url_upload_allow_private_ips: bool,
    // Query cache
    pub redis_url: Option<String>,
    pub cache_local_capacity: usize,
    pub cache_local_ttl_secs: u64,
    pub cache_remote_base_ttl_secs: u64,
    pub cache_remote_jitter_secs: u64,
    pub cache_key_prefix: String,
    // Batch scrape
    pub scrape_search_url: String,
    pub scrape_max_count: u32,
    // Blob cleanup queue
    pub cleanup_max_workers: usize,
    pub cleanup_max_retries: u32,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<GalleryConfig>);

impl Config {
    fn as_gallery(&self) -> &GalleryConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_gallery().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = GalleryConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_gallery().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_gallery().base.server_port
    }

    pub fn database_url(&self) -> &str {
        &self.as_gallery().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_gallery().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_gallery().base.db_timeout_seconds
    }

    pub fn environment(&self) -> &str {
        &self.as_gallery().base.environment
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_gallery().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.as_gallery().s3_bucket.as_deref()
    }

    /// `S3_REGION`, falling back to `AWS_REGION`.
    pub fn s3_region(&self) -> Option<&str> {
        self.as_gallery()
            .s3_region
            .as_deref()
            .or(self.as_gallery().aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_gallery().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_gallery().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_gallery().local_storage_base_url.as_deref()
    }

    pub fn max_picture_size_bytes(&self) -> u64 {
        self.as_gallery().max_picture_size_bytes
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.as_gallery().allowed_extensions
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.as_gallery().allowed_content_types
    }

    pub fn upload_temp_dir(&self) -> &str {
        &self.as_gallery().upload_temp_dir
    }

    pub fn derivatives_enabled(&self) -> bool {
        self.as_gallery().derivatives_enabled
    }

    pub fn thumbnail_threshold_bytes(&self) -> u64 {
        self.as_gallery().thumbnail_threshold_bytes
    }

    pub fn thumbnail_max_edge(&self) -> u32 {
        self.as_gallery().thumbnail_max_edge
    }

    pub fn http_client_timeout_secs(&self) -> u64 {
        self.as_gallery().http_client_timeout_secs
    }

    pub fn url_upload_allow_private_ips(&self) -> bool {
        self.as_gallery().url_upload_allow_private_ips
    }

    pub fn redis_url(&self) -> Option<&str> {
        self.as_gallery().redis_url.as_deref()
    }

    pub fn cache_local_capacity(&self) -> usize {
        self.as_gallery().cache_local_capacity
    }

    pub fn cache_local_ttl_secs(&self) -> u64 {
        self.as_gallery().cache_local_ttl_secs
    }

    pub fn cache_remote_base_ttl_secs(&self) -> u64 {
        self.as_gallery().cache_remote_base_ttl_secs
    }

    pub fn cache_remote_jitter_secs(&self) -> u64 {
        self.as_gallery().cache_remote_jitter_secs
    }

    pub fn cache_key_prefix(&self) -> &str {
        &self.as_gallery().cache_key_prefix
    }

    pub fn scrape_search_url(&self) -> &str {
        &self.as_gallery().scrape_search_url
    }

    pub fn scrape_max_count(&self) -> u32 {
        self.as_gallery().scrape_max_count
    }

    pub fn cleanup_max_workers(&self) -> usize {
        self.as_gallery().cleanup_max_workers
    }

    pub fn cleanup_max_retries(&self) -> u32 {
        self.as_gallery().cleanup_max_retries
    }
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .to_lowercase()
        .parse()
        .unwrap_or(default)
}

impl GalleryConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MAX_PICTURE_SIZE_BYTES: u64 = 2 * 1024 * 1024;
        const THUMBNAIL_THRESHOLD_BYTES: u64 = 2 * 1024;
        const THUMBNAIL_MAX_EDGE: u32 = 256;
        const HTTP_CLIENT_TIMEOUT_SECS: u64 = 10;
        const CACHE_LOCAL_CAPACITY: usize = 10_000;
        const CACHE_LOCAL_TTL_SECS: u64 = 300;
        const CACHE_REMOTE_BASE_TTL_SECS: u64 = 300;
        const CACHE_REMOTE_JITTER_SECS: u64 = 300;
        const CACHE_KEY_PREFIX: &str = "gallery:listPictureViewByPage:";
        const SCRAPE_SEARCH_URL: &str = "https://cn.bing.com/images/async?q={query}&mmasync=1";
        const SCRAPE_MAX_COUNT: u32 = 30;
        const CLEANUP_MAX_WORKERS: usize = 2;
        const CLEANUP_MAX_RETRIES: u32 = 5;

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            environment,
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::Local,
        };

        let upload_temp_dir = env::var("UPLOAD_TEMP_DIR").unwrap_or_else(|_| {
            env::temp_dir()
                .join("gallery-uploads")
                .to_string_lossy()
                .into_owned()
        });

        let config = GalleryConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            max_picture_size_bytes: env::var("MAX_PICTURE_SIZE_BYTES")
                .unwrap_or_else(|_| MAX_PICTURE_SIZE_BYTES.to_string())
                .parse()
                .unwrap_or(MAX_PICTURE_SIZE_BYTES),
            allowed_extensions: env_list("ALLOWED_EXTENSIONS", "png,jpg,jpeg,webp"),
            allowed_content_types: env_list(
                "ALLOWED_CONTENT_TYPES",
                "image/jpeg,image/jpg,image/png,image/webp",
            ),
            upload_temp_dir,
            derivatives_enabled: env_bool("PICTURE_DERIVATIVES_ENABLED", true),
            thumbnail_threshold_bytes: env::var("THUMBNAIL_THRESHOLD_BYTES")
                .unwrap_or_else(|_| THUMBNAIL_THRESHOLD_BYTES.to_string())
                .parse()
                .unwrap_or(THUMBNAIL_THRESHOLD_BYTES),
            thumbnail_max_edge: env::var("THUMBNAIL_MAX_EDGE")
                .unwrap_or_else(|_| THUMBNAIL_MAX_EDGE.to_string())
                .parse()
                .unwrap_or(THUMBNAIL_MAX_EDGE),
            http_client_timeout_secs: env::var("HTTP_CLIENT_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_CLIENT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_CLIENT_TIMEOUT_SECS),
            url_upload_allow_private_ips: env_bool("URL_UPLOAD_ALLOW_PRIVATE_IPS", false),
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty()),
            cache_local_capacity: env::var("CACHE_LOCAL_CAPACITY")
                .unwrap_or_else(|_| CACHE_LOCAL_CAPACITY.to_string())
                .parse()
                .unwrap_or(CACHE_LOCAL_CAPACITY),
            cache_local_ttl_secs: env::var("CACHE_LOCAL_TTL_SECS")
                .unwrap_or_else(|_| CACHE_LOCAL_TTL_SECS.to_string())
                .parse()
                .unwrap_or(CACHE_LOCAL_TTL_SECS),
            cache_remote_base_ttl_secs: env::var("CACHE_REMOTE_BASE_TTL_SECS")
                .unwrap_or_else(|_| CACHE_REMOTE_BASE_TTL_SECS.to_string())
                .parse()
                .unwrap_or(CACHE_REMOTE_BASE_TTL_SECS),
            cache_remote_jitter_secs: env::var("CACHE_REMOTE_JITTER_SECS")
                .unwrap_or_else(|_| CACHE_REMOTE_JITTER_SECS.to_string())
                .parse()
                .unwrap_or(CACHE_REMOTE_JITTER_SECS),
            cache_key_prefix: env::var("CACHE_KEY_PREFIX")
                .unwrap_or_else(|_| CACHE_KEY_PREFIX.to_string()),
            scrape_search_url: env::var("SCRAPE_SEARCH_URL")
                .unwrap_or_else(|_| SCRAPE_SEARCH_URL.to_string()),
            scrape_max_count: env::var("SCRAPE_MAX_COUNT")
                .unwrap_or_else(|_| SCRAPE_MAX_COUNT.to_string())
                .parse()
                .unwrap_or(SCRAPE_MAX_COUNT),
            cleanup_max_workers: env::var("CLEANUP_MAX_WORKERS")
                .unwrap_or_else(|_| CLEANUP_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(CLEANUP_MAX_WORKERS),
            cleanup_max_retries: env::var("CLEANUP_MAX_RETRIES")
                .unwrap_or_else(|_| CLEANUP_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(CLEANUP_MAX_RETRIES),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        if self.max_picture_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_PICTURE_SIZE_BYTES must be positive"));
        }

        if !self.scrape_search_url.contains("{query}") {
            return Err(anyhow::anyhow!(
                "SCRAPE_SEARCH_URL must contain a {{query}} placeholder"
            ));
        }

        if self.scrape_max_count == 0 || self.scrape_max_count > crate::constants::MAX_BATCH_COUNT
        {
            return Err(anyhow::anyhow!(
                "SCRAPE_MAX_COUNT must be between 1 and {}",
                crate::constants::MAX_BATCH_COUNT
            ));
        }

        if self.cleanup_max_workers == 0 {
            return Err(anyhow::anyhow!("CLEANUP_MAX_WORKERS must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GalleryConfig {
        GalleryConfig {
            base: BaseConfig {
                server_port: 4000,
                db_max_connections: 20,
                db_timeout_seconds: 30,
                environment: "development".to_string(),
            },
            database_url: "postgres://localhost/gallery".to_string(),
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: Some("/tmp/gallery".to_string()),
            local_storage_base_url: Some("http://localhost:4000/media".to_string()),
            max_picture_size_bytes: 2 * 1024 * 1024,
            allowed_extensions: vec!["png".to_string()],
            allowed_content_types: vec!["image/png".to_string()],
            upload_temp_dir: "/tmp/gallery-uploads".to_string(),
            derivatives_enabled: true,
            thumbnail_threshold_bytes: 2048,
            thumbnail_max_edge: 256,
            http_client_timeout_secs: 10,
            url_upload_allow_private_ips: false,
            redis_url: None,
            cache_local_capacity: 10_000,
            cache_local_ttl_secs: 300,
            cache_remote_base_ttl_secs: 300,
            cache_remote_jitter_secs: 300,
            cache_key_prefix: "gallery:listPictureViewByPage:".to_string(),
            scrape_search_url: "https://example.com/search?q={query}".to_string(),
            scrape_max_count: 30,
            cleanup_max_workers: 2,
            cleanup_max_retries: 5,
        }
    }

    #[test]
    fn test_sample_config_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_postgres_url() {
        let mut config = sample();
        config.database_url = "mysql://localhost/gallery".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_s3_backend_requires_bucket_and_region() {
        let mut config = sample();
        config.storage_backend = StorageBackend::S3;
        assert!(config.validate().is_err());

        config.s3_bucket = Some("pictures".to_string());
        assert!(config.validate().is_err());

        config.aws_region = Some("eu-west-1".to_string());
        assert!(config.validate().is_ok());

        let config = Config(Box::new(config));
        assert_eq!(config.s3_region(), Some("eu-west-1"));
    }

    #[test]
    fn test_scrape_url_needs_placeholder() {
        let mut config = sample();
        config.scrape_search_url = "https://example.com/search".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_production() {
        let mut config = sample();
        config.base.environment = "PROD".to_string();
        assert!(Config(Box::new(config)).is_production());
    }
}
