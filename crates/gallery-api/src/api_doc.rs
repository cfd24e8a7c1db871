//! OpenAPI documentation served at [`crate::constants::OPENAPI_PATH`].

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use gallery_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gallery API",
        version = "0.1.0",
        description = "Picture gallery backend: uploads from files, URLs and image search, cached listing, review workflow and per-user spaces. All endpoints are versioned under /api/v1/."
    ),
    paths(
        handlers::pictures::upload_file,
        handlers::pictures::upload_url,
        handlers::pictures::upload_batch,
        handlers::pictures::list_pictures,
        handlers::pictures::get_picture,
        handlers::pictures::edit_picture,
        handlers::pictures::delete_picture,
        handlers::pictures::review_picture,
        handlers::pictures::tag_category,
        handlers::spaces::create_space,
        handlers::spaces::get_space,
        handlers::spaces::list_levels,
        handlers::health::liveness,
    ),
    components(schemas(
        models::Picture,
        models::PictureView,
        models::UserView,
        models::UserRole,
        models::ReviewStatus,
        models::PictureQueryRequest,
        models::PictureEditRequest,
        models::PictureReviewRequest,
        models::UploadPictureRequest,
        models::BatchUploadRequest,
        models::TagCategory,
        models::Space,
        models::SpaceLevel,
        models::SpaceLevelInfo,
        models::CreateSpaceRequest,
        handlers::pictures::UploadUrlBody,
        handlers::pictures::BatchUploadResponse,
        handlers::spaces::CreateSpaceResponse,
        handlers::health::HealthResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "pictures", description = "Picture upload, listing, editing and review"),
        (name = "spaces", description = "Private picture spaces"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
