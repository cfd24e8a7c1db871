//! Batch upload from an image search results page.
//!
//! The page is fetched once; each result anchor carries a JSON `m` attribute
//! whose `murl` is the full-size picture. Candidates go through the regular
//! upload pipeline one by one and failures are skipped.

use gallery_core::models::{BatchUploadRequest, UploadPictureRequest, User};
use gallery_core::validation::MAX_PICTURE_NAME_LENGTH;
use gallery_core::AppError;
use scraper::{Html, Selector};
use std::sync::Arc;
use validator::Validate;

use crate::config::ScrapeConfig;
use crate::source::PictureSource;
use crate::upload::UploadPipeline;

const DEFAULT_BATCH_COUNT: u32 = 10;
const RESULTS_CONTAINER: &str = ".dgControl";
const RESULT_ANCHOR: &str = "a.iusc";

pub struct BatchScraper {
    pipeline: Arc<UploadPipeline>,
    client: reqwest::Client,
    config: ScrapeConfig,
}

impl BatchScraper {
    pub fn new(pipeline: Arc<UploadPipeline>, config: ScrapeConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            pipeline,
            client,
            config,
        })
    }

    /// Upload up to `request.count` pictures found for `request.search_text`.
    /// Returns how many were uploaded.
    #[tracing::instrument(skip(self, request, user), fields(user.id = %user.id, search = %request.search_text))]
    pub async fn upload_batch(
        &self,
        request: BatchUploadRequest,
        user: &User,
    ) -> Result<u32, AppError> {
        if !user.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators may run batch uploads".to_string(),
            ));
        }
        request.validate()?;

        let count = request.count.unwrap_or(DEFAULT_BATCH_COUNT);
        if count == 0 || count > self.config.max_count {
            return Err(AppError::InvalidParams(format!(
                "count must be between 1 and {}",
                self.config.max_count
            )));
        }
        let name_prefix = request
            .name_prefix
            .filter(|prefix| !prefix.trim().is_empty())
            .unwrap_or_else(|| request.search_text.clone());

        let page = self.fetch_results(&request.search_text).await?;
        let candidates = extract_candidates(&page)?;
        tracing::debug!(candidates = candidates.len(), "Search results parsed");

        let mut uploaded = 0u32;
        for url in candidates {
            if uploaded >= count {
                break;
            }
            let meta = UploadPictureRequest {
                pic_name: Some(batch_item_name(&name_prefix, uploaded + 1)),
                ..Default::default()
            };
            match self
                .pipeline
                .upload(PictureSource::Scraped { url: url.clone() }, meta, user)
                .await
            {
                Ok(picture) => {
                    uploaded += 1;
                    tracing::info!(picture_id = %picture.id, url = %url, "Batch item uploaded");
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Batch item failed, skipping");
                }
            }
        }

        tracing::info!(requested = count, uploaded = uploaded, "Batch upload finished");
        Ok(uploaded)
    }

    async fn fetch_results(&self, search_text: &str) -> Result<String, AppError> {
        let url = self
            .config
            .search_url
            .replace("{query}", &urlencoding::encode(search_text));
        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "Failed to fetch search results");
            AppError::UpstreamFailure(format!("Failed to fetch search results: {}", e))
        })?;
        if !response.status().is_success() {
            return Err(AppError::UpstreamFailure(format!(
                "Search source returned status code: {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| AppError::UpstreamFailure(format!("Failed to read search results: {}", e)))
    }
}

/// `{prefix}{ordinal}`, with the prefix cut so the whole name fits a picture name.
fn batch_item_name(prefix: &str, ordinal: u32) -> String {
    let ordinal = ordinal.to_string();
    let room = MAX_PICTURE_NAME_LENGTH.saturating_sub(ordinal.len());
    let prefix: String = prefix.chars().take(room).collect();
    format!("{}{}", prefix, ordinal)
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::Internal(format!("Invalid selector {}: {}", css, e)))
}

/// Media URLs of the result anchors, in page order, without query strings.
pub(crate) fn extract_candidates(html: &str) -> Result<Vec<String>, AppError> {
    let document = Html::parse_document(html);
    let container_selector = selector(RESULTS_CONTAINER)?;
    let anchor_selector = selector(RESULT_ANCHOR)?;

    let container = document
        .select(&container_selector)
        .next()
        .ok_or_else(|| AppError::UpstreamFailure("Search results container not found".to_string()))?;

    Ok(container
        .select(&anchor_selector)
        .filter_map(|anchor| anchor.value().attr("m"))
        .filter_map(media_url)
        .collect())
}

fn media_url(metadata: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(metadata).ok()?;
    let url = value.get("murl")?.as_str()?;
    let url = url.split('?').next().unwrap_or(url).trim();
    (!url.is_empty()).then(|| url.to_string())
}
