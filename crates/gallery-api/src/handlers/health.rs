use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub cleanup_pending: u64,
}

/// Liveness probe: the process is up and serving.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses((status = 200, description = "Service is alive", body = HealthResponse))
)]
pub async fn liveness(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let stats = state.cleanup.stats();
    let settled = stats.completed + stats.failed;
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "alive".to_string(),
            cleanup_pending: stats.submitted.saturating_sub(settled),
        }),
    )
}
