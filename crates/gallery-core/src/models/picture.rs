use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{ReviewStatus, UserView};
use crate::AppError;

/// Persisted picture asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Picture {
    pub id: Uuid,
    pub url: String,
    pub thumbnail_url: Option<String>,
    /// Untouched upload, kept next to its derived copies.
    pub original_url: Option<String>,
    pub name: String,
    pub introduction: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub pic_size: i64,
    pub pic_width: i32,
    pub pic_height: i32,
    pub pic_scale: f64,
    pub pic_format: Option<String>,
    pub user_id: Uuid,
    pub space_id: Option<Uuid>,
    pub review_status: ReviewStatus,
    pub review_message: Option<String>,
    pub reviewer_id: Option<Uuid>,
    pub review_time: Option<DateTime<Utc>>,
    pub create_time: DateTime<Utc>,
    pub edit_time: DateTime<Utc>,
}

impl Picture {
    /// Aspect ratio as height / width, rounded to two decimals. Zero width yields 0.
    pub fn compute_scale(width: i32, height: i32) -> f64 {
        if width <= 0 {
            return 0.0;
        }
        let ratio = f64::from(height) / f64::from(width);
        (ratio * 100.0).round() / 100.0
    }

    /// Replace the dimensions and recompute `pic_scale` from them.
    pub fn set_dimensions(&mut self, width: i32, height: i32) {
        self.pic_width = width;
        self.pic_height = height;
        self.pic_scale = Self::compute_scale(width, height);
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Every blob URL this record points at, without duplicates.
    pub fn blob_urls(&self) -> Vec<String> {
        let mut urls = vec![self.url.clone()];
        for url in [&self.thumbnail_url, &self.original_url].into_iter().flatten() {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        urls
    }
}

/// Picture as shown to clients, joined with the owner's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PictureView {
    pub id: Uuid,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub name: String,
    pub introduction: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub pic_size: i64,
    pub pic_width: i32,
    pub pic_height: i32,
    pub pic_scale: f64,
    pub pic_format: Option<String>,
    pub user_id: Uuid,
    pub space_id: Option<Uuid>,
    pub create_time: DateTime<Utc>,
    pub edit_time: DateTime<Utc>,
    pub user: Option<UserView>,
}

impl PictureView {
    pub fn from_picture(picture: Picture, user: Option<UserView>) -> Self {
        Self {
            id: picture.id,
            url: picture.url,
            thumbnail_url: picture.thumbnail_url,
            name: picture.name,
            introduction: picture.introduction,
            category: picture.category,
            tags: picture.tags,
            pic_size: picture.pic_size,
            pic_width: picture.pic_width,
            pic_height: picture.pic_height,
            pic_scale: picture.pic_scale,
            pic_format: picture.pic_format,
            user_id: picture.user_id,
            space_id: picture.space_id,
            create_time: picture.create_time,
            edit_time: picture.edit_time,
            user,
        }
    }
}

/// Filtered, sorted, paginated picture query.
///
/// Serialized as-is to derive the listing cache key, so field order and names matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PictureQueryRequest {
    pub current: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub introduction: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub pic_size: Option<i64>,
    pub pic_width: Option<i32>,
    pub pic_height: Option<i32>,
    pub pic_scale: Option<f64>,
    pub pic_format: Option<String>,
    pub search_text: Option<String>,
    pub user_id: Option<Uuid>,
    pub space_id: Option<Uuid>,
    #[serde(default)]
    pub null_space_id: bool,
    pub review_status: Option<ReviewStatus>,
    pub review_message: Option<String>,
    pub reviewer_id: Option<Uuid>,
}

/// Columns a picture listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureSortField {
    Id,
    Name,
    Category,
    PicSize,
    PicWidth,
    PicHeight,
    PicScale,
    PicFormat,
    ReviewStatus,
    CreateTime,
    EditTime,
}

impl PictureSortField {
    /// Parse the client-facing (camelCase) field name.
    pub fn parse(field: &str) -> Result<Self, AppError> {
        let parsed = match field {
            "id" => Self::Id,
            "name" => Self::Name,
            "category" => Self::Category,
            "picSize" => Self::PicSize,
            "picWidth" => Self::PicWidth,
            "picHeight" => Self::PicHeight,
            "picScale" => Self::PicScale,
            "picFormat" => Self::PicFormat,
            "reviewStatus" => Self::ReviewStatus,
            "createTime" => Self::CreateTime,
            "editTime" => Self::EditTime,
            other => {
                return Err(AppError::InvalidParams(format!(
                    "Unsupported sort field: {}",
                    other
                )))
            }
        };
        Ok(parsed)
    }

    /// Backing column name.
    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Category => "category",
            Self::PicSize => "pic_size",
            Self::PicWidth => "pic_width",
            Self::PicHeight => "pic_height",
            Self::PicScale => "pic_scale",
            Self::PicFormat => "pic_format",
            Self::ReviewStatus => "review_status",
            Self::CreateTime => "create_time",
            Self::EditTime => "edit_time",
        }
    }
}

impl PictureQueryRequest {
    /// Requested ordering. Without a sort field, newest first.
    pub fn sort(&self) -> Result<(PictureSortField, bool), AppError> {
        match self.sort_field.as_deref().filter(|f| !f.is_empty()) {
            Some(field) => Ok((
                PictureSortField::parse(field)?,
                super::is_ascending(self.sort_order.as_deref()),
            )),
            None => Ok((PictureSortField::CreateTime, false)),
        }
    }

    pub fn page(&self) -> i64 {
        self.current.filter(|c| *c > 0).unwrap_or(super::DEFAULT_PAGE)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
            .filter(|s| *s > 0)
            .unwrap_or(super::DEFAULT_PAGE_SIZE)
    }

    /// Row offset of the requested page; InvalidParams when it does not fit in an i64.
    pub fn offset(&self) -> Result<i64, AppError> {
        (self.page() - 1)
            .checked_mul(self.page_size())
            .ok_or_else(|| AppError::InvalidParams("current is out of range".to_string()))
    }
}

/// Metadata accompanying a single-picture upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadPictureRequest {
    /// Present when re-uploading the content of an existing picture.
    pub id: Option<Uuid>,
    /// Source URL, used by URL uploads.
    #[validate(length(max = 1024))]
    pub file_url: Option<String>,
    #[validate(length(max = 128))]
    pub pic_name: Option<String>,
    pub space_id: Option<Uuid>,
}

/// Batch scrape request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchUploadRequest {
    #[validate(length(min = 1, max = 128))]
    pub search_text: String,
    pub count: Option<u32>,
    #[validate(length(max = 64))]
    pub name_prefix: Option<String>,
}

/// Metadata edit of an existing picture.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PictureEditRequest {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub introduction: Option<String>,
    #[validate(length(max = 64))]
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Suggested tags and categories.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TagCategory {
    pub tag_list: Vec<String>,
    pub category_list: Vec<String>,
}

impl TagCategory {
    pub fn catalogue() -> Self {
        Self {
            tag_list: crate::constants::PICTURE_TAGS
                .iter()
                .map(|t| t.to_string())
                .collect(),
            category_list: crate::constants::PICTURE_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}
