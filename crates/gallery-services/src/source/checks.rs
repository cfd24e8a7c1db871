//! Field checks shared by the source variants.

use gallery_core::AppError;
use std::path::Path;

/// Extension used when a remote URL does not carry a usable one.
pub const FALLBACK_EXTENSION: &str = "png";

pub fn validate_size(size: u64, max_size: u64) -> Result<(), AppError> {
    if size > max_size {
        return Err(AppError::InvalidParams(format!(
            "Picture size exceeds maximum allowed size of {} MB",
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Compare the MIME type without its parameters against the allowlist.
pub fn validate_content_type(content_type: &str, allowed: &[String]) -> Result<(), AppError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase();
    if !allowed.iter().any(|ct| ct.eq_ignore_ascii_case(&mime)) {
        return Err(AppError::InvalidParams(format!(
            "Unsupported content type {}. Allowed types: {}",
            mime,
            allowed.join(", ")
        )));
    }
    Ok(())
}

/// Lowercased extension of the last path component, if any.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_lowercase())
}

/// Extension of `file_name`, which must be on the allowlist.
pub fn validate_extension(file_name: &str, allowed: &[String]) -> Result<String, AppError> {
    match extension_of(file_name) {
        Some(ext) if allowed.contains(&ext) => Ok(ext),
        _ => Err(AppError::InvalidParams(format!(
            "Invalid file extension. Allowed extensions: {}",
            allowed.join(", ")
        ))),
    }
}

/// File name without directories or extension.
pub fn name_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("picture")
        .to_string()
}
