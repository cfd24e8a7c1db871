//! Remote picture probing and download.

use futures::StreamExt;
use gallery_core::AppError;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{StatusCode, Url};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use super::checks::{validate_content_type, validate_size};
use super::{ssrf, SourceContext};

/// Redirect hops a download may follow.
pub const MAX_REDIRECTS: usize = 5;

/// Parse a caller-supplied URL. Only absolute http(s) URLs are accepted.
pub fn parse_remote_url(raw: &str) -> Result<Url, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::InvalidParams("File URL must not be empty".to_string()));
    }
    let url =
        Url::parse(raw).map_err(|_| AppError::InvalidParams(format!("Invalid URL: {}", raw)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AppError::InvalidParams(
            "Only HTTP and HTTPS URLs are allowed".to_string(),
        ));
    }
    Ok(url)
}

/// Check type and size with a HEAD request before downloading.
///
/// The probe is advisory: when it fails or the server answers anything but
/// 200, the checks are skipped and the download limits apply instead.
pub(crate) async fn probe(ctx: &SourceContext, url: &Url) -> Result<(), AppError> {
    let response = match ctx.client.head(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "HEAD probe failed, skipping pre-download checks");
            return Ok(());
        }
    };

    if response.status() != StatusCode::OK {
        tracing::debug!(url = %url, status = %response.status(), "HEAD probe not OK, skipping pre-download checks");
        return Ok(());
    }

    let headers = response.headers();
    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        let content_type = content_type
            .to_str()
            .map_err(|_| AppError::InvalidParams("Invalid Content-Type header".to_string()))?;
        validate_content_type(content_type, &ctx.config.allowed_content_types)?;
    }

    if let Some(length) = headers.get(CONTENT_LENGTH) {
        let length = length
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| AppError::InvalidParams("Invalid Content-Length header".to_string()))?;
        validate_size(length, ctx.config.max_picture_size_bytes)?;
    }

    Ok(())
}

/// Stream the body of `url` into `dest`, enforcing the size limit as bytes arrive.
pub(crate) async fn download(ctx: &SourceContext, url: &Url, dest: &Path) -> Result<u64, AppError> {
    let mut current = url.clone();
    let mut hops = 0;
    let response = loop {
        let response = ctx.client.get(current.clone()).send().await.map_err(|e| {
            tracing::warn!(url = %current, error = %e, "Failed to download remote picture");
            AppError::InvalidParams(format!("Failed to download from URL: {}", e))
        })?;
        if !response.status().is_redirection() {
            break response;
        }
        if hops == MAX_REDIRECTS {
            return Err(AppError::InvalidParams(format!(
                "URL redirected more than {} times",
                MAX_REDIRECTS
            )));
        }
        hops += 1;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::InvalidParams("Redirect without a Location".to_string()))?;
        current = redirect_target(ctx, &current, location).await?;
        tracing::debug!(url = %current, hop = hops, "Following redirect");
    };

    if !response.status().is_success() {
        return Err(AppError::InvalidParams(format!(
            "URL returned status code: {}",
            response.status()
        )));
    }

    let max_size = ctx.config.max_picture_size_bytes;
    let mut file = tokio::fs::File::create(dest).await?;
    let mut body = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk
            .map_err(|e| AppError::InvalidParams(format!("Failed to read response body: {}", e)))?;
        written += chunk.len() as u64;
        validate_size(written, max_size)?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if written == 0 {
        return Err(AppError::InvalidParams(
            "Remote picture is empty".to_string(),
        ));
    }

    Ok(written)
}

/// Resolve a `Location` against the URL that answered with it, applying the
/// same scheme and address checks as the first request.
async fn redirect_target(ctx: &SourceContext, from: &Url, location: &str) -> Result<Url, AppError> {
    let next = from
        .join(location)
        .map_err(|_| AppError::InvalidParams(format!("Invalid redirect target: {}", location)))?;
    let next = parse_remote_url(next.as_str())?;
    if !ctx.config.allow_private_ips {
        ssrf::ensure_public_host(&next).await?;
    }
    Ok(next)
}
