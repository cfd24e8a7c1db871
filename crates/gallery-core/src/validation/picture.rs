//! Picture field constraints.

use crate::models::{Picture, PictureEditRequest};
use crate::AppError;
use validator::Validate;

pub const MAX_URL_LENGTH: usize = 1024;
pub const MAX_INTRODUCTION_LENGTH: usize = 800;
pub const MAX_PICTURE_NAME_LENGTH: usize = 128;

/// Validate a picture record before it is persisted.
pub fn validate_picture(picture: &Picture) -> Result<(), AppError> {
    if picture.url.is_empty() {
        return Err(AppError::InvalidParams("url must not be empty".to_string()));
    }
    validate_url_length(&picture.url)?;
    for url in [&picture.thumbnail_url, &picture.original_url]
        .into_iter()
        .flatten()
    {
        validate_url_length(url)?;
    }
    validate_name(&picture.name)?;
    validate_introduction(picture.introduction.as_deref())
}

/// Validate a metadata edit. The target id is mandatory.
pub fn validate_picture_edit(request: &PictureEditRequest) -> Result<(), AppError> {
    if request.id.is_none() {
        return Err(AppError::InvalidParams("id must not be empty".to_string()));
    }
    if let Some(ref name) = request.name {
        validate_name(name)?;
    }
    request.validate()?;
    validate_introduction(request.introduction.as_deref())
}

fn validate_url_length(url: &str) -> Result<(), AppError> {
    if url.chars().count() > MAX_URL_LENGTH {
        return Err(AppError::InvalidParams(format!(
            "url exceeds {} characters",
            MAX_URL_LENGTH
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.chars().count() > MAX_PICTURE_NAME_LENGTH {
        return Err(AppError::InvalidParams(format!(
            "name exceeds {} characters",
            MAX_PICTURE_NAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_introduction(introduction: Option<&str>) -> Result<(), AppError> {
    if let Some(intro) = introduction {
        if intro.chars().count() > MAX_INTRODUCTION_LENGTH {
            return Err(AppError::InvalidParams(format!(
                "introduction exceeds {} characters",
                MAX_INTRODUCTION_LENGTH
            )));
        }
    }
    Ok(())
}
