//! Picture endpoints.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use gallery_core::models::{
    BatchUploadRequest, Page, Picture, PictureEditRequest, PictureQueryRequest,
    PictureReviewRequest, PictureView, TagCategory, UploadPictureRequest,
};
use gallery_core::AppError;
use gallery_services::{PictureService, PictureSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{CurrentUser, MaybeUser};
use crate::error::{ErrorResponse, HttpAppError, JsonBody};
use crate::state::AppState;

/// Body of a URL upload.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlBody {
    pub file_url: String,
    pub id: Option<Uuid>,
    pub pic_name: Option<String>,
    pub space_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchUploadResponse {
    pub uploaded: u32,
}

fn multipart_error(err: MultipartError) -> HttpAppError {
    HttpAppError(AppError::InvalidParams(format!(
        "Invalid multipart body: {}",
        err.body_text()
    )))
}

fn parse_uuid_field(name: &str, value: &str) -> Result<Option<Uuid>, HttpAppError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| HttpAppError(AppError::InvalidParams(format!("{} must be a UUID", name))))
}

#[utoipa::path(
    post,
    path = "/api/v1/pictures/upload",
    tag = "pictures",
    request_body(content_type = "multipart/form-data", description = "`file` plus optional `id`, `picName`, `spaceId`"),
    responses(
        (status = 200, description = "Picture uploaded", body = PictureView),
        (status = 400, description = "Invalid file or parameters", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Picture or space not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, multipart), fields(user.id = %user.0.id, operation = "upload_picture"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<PictureView>, HttpAppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut request = UploadPictureRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, data));
            }
            "id" => {
                request.id = parse_uuid_field("id", &field.text().await.map_err(multipart_error)?)?;
            }
            "spaceId" => {
                request.space_id =
                    parse_uuid_field("spaceId", &field.text().await.map_err(multipart_error)?)?;
            }
            "picName" => {
                let pic_name = field.text().await.map_err(multipart_error)?;
                request.pic_name = Some(pic_name).filter(|n| !n.trim().is_empty());
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let (file_name, data) = file
        .ok_or_else(|| AppError::InvalidParams("Missing file field".to_string()))?;
    let picture = state
        .uploads
        .upload(PictureSource::File { file_name, data }, request, &user.0)
        .await?;

    Ok(Json(state.pictures.with_owner(picture).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/pictures/upload/url",
    tag = "pictures",
    request_body = UploadUrlBody,
    responses(
        (status = 200, description = "Picture uploaded", body = PictureView),
        (status = 400, description = "Invalid URL or remote content", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, body), fields(user.id = %user.0.id, url = %body.file_url, operation = "upload_picture_from_url"))]
pub async fn upload_url(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    JsonBody(body): JsonBody<UploadUrlBody>,
) -> Result<Json<PictureView>, HttpAppError> {
    let request = UploadPictureRequest {
        id: body.id,
        file_url: Some(body.file_url.clone()),
        pic_name: body.pic_name,
        space_id: body.space_id,
    };
    let picture = state
        .uploads
        .upload(PictureSource::Url { url: body.file_url }, request, &user.0)
        .await?;

    Ok(Json(state.pictures.with_owner(picture).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/pictures/upload/batch",
    tag = "pictures",
    request_body = BatchUploadRequest,
    responses(
        (status = 200, description = "Number of pictures uploaded", body = BatchUploadResponse),
        (status = 403, description = "Administrators only", body = ErrorResponse),
        (status = 502, description = "Search source unavailable", body = ErrorResponse)
    )
)]
pub async fn upload_batch(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    JsonBody(request): JsonBody<BatchUploadRequest>,
) -> Result<Json<BatchUploadResponse>, HttpAppError> {
    let uploaded = state.scraper.upload_batch(request, &user.0).await?;
    Ok(Json(BatchUploadResponse { uploaded }))
}

#[utoipa::path(
    post,
    path = "/api/v1/pictures/list",
    tag = "pictures",
    request_body = PictureQueryRequest,
    responses(
        (status = 200, description = "One page of pictures", body = Page<PictureView>),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    )
)]
pub async fn list_pictures(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    JsonBody(request): JsonBody<PictureQueryRequest>,
) -> Result<Json<Page<PictureView>>, HttpAppError> {
    let page = state.listing.get_page(request, viewer.as_ref()).await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/pictures/{id}",
    tag = "pictures",
    params(("id" = Uuid, Path, description = "Picture ID")),
    responses(
        (status = 200, description = "Picture", body = PictureView),
        (status = 404, description = "Picture not found", body = ErrorResponse)
    )
)]
pub async fn get_picture(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PictureView>, HttpAppError> {
    let view = state.pictures.get_view(id, viewer.as_ref()).await?;
    Ok(Json(view))
}

#[utoipa::path(
    put,
    path = "/api/v1/pictures/{id}",
    tag = "pictures",
    params(("id" = Uuid, Path, description = "Picture ID")),
    request_body = PictureEditRequest,
    responses(
        (status = 200, description = "Picture updated", body = Picture),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Picture not found", body = ErrorResponse)
    )
)]
pub async fn edit_picture(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    JsonBody(mut request): JsonBody<PictureEditRequest>,
) -> Result<Json<Picture>, HttpAppError> {
    request.id = Some(id);
    let picture = state.pictures.edit(request, &user.0).await?;
    Ok(Json(picture))
}

#[utoipa::path(
    delete,
    path = "/api/v1/pictures/{id}",
    tag = "pictures",
    params(("id" = Uuid, Path, description = "Picture ID")),
    responses(
        (status = 204, description = "Picture deleted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Picture not found", body = ErrorResponse)
    )
)]
pub async fn delete_picture(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    state.pictures.delete(id, &user.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/pictures/review",
    tag = "pictures",
    request_body = PictureReviewRequest,
    responses(
        (status = 204, description = "Review recorded"),
        (status = 400, description = "Invalid review status", body = ErrorResponse),
        (status = 403, description = "Administrators only", body = ErrorResponse),
        (status = 409, description = "Picture already has this status", body = ErrorResponse)
    )
)]
pub async fn review_picture(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    JsonBody(request): JsonBody<PictureReviewRequest>,
) -> Result<StatusCode, HttpAppError> {
    state.reviews.review(&request, &user.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/pictures/tag_category",
    tag = "pictures",
    responses((status = 200, description = "Suggested tags and categories", body = TagCategory))
)]
pub async fn tag_category() -> Json<TagCategory> {
    Json(PictureService::tag_category())
}
