//! Space endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use gallery_core::models::{CreateSpaceRequest, Space, SpaceLevelInfo};
use gallery_services::SpaceAllocator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, JsonBody};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSpaceResponse {
    pub id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/v1/spaces",
    tag = "spaces",
    request_body = CreateSpaceRequest,
    responses(
        (status = 201, description = "Space created", body = CreateSpaceResponse),
        (status = 403, description = "Level or quotas reserved for administrators", body = ErrorResponse),
        (status = 409, description = "The user already has a space", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, request), fields(user.id = %user.0.id))]
pub async fn create_space(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    JsonBody(request): JsonBody<CreateSpaceRequest>,
) -> Result<(StatusCode, Json<CreateSpaceResponse>), HttpAppError> {
    let id = state.spaces.create_space(request, &user.0).await?;
    Ok((StatusCode::CREATED, Json(CreateSpaceResponse { id })))
}

#[utoipa::path(
    get,
    path = "/api/v1/spaces/{id}",
    tag = "spaces",
    params(("id" = Uuid, Path, description = "Space ID")),
    responses(
        (status = 200, description = "Space", body = Space),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Space not found", body = ErrorResponse)
    )
)]
pub async fn get_space(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Space>, HttpAppError> {
    Ok(Json(state.spaces.get_space(id, &user.0).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/spaces/levels",
    tag = "spaces",
    responses((status = 200, description = "Space levels and their quotas", body = Vec<SpaceLevelInfo>))
)]
pub async fn list_levels() -> Json<Vec<SpaceLevelInfo>> {
    Json(SpaceAllocator::list_space_levels())
}
