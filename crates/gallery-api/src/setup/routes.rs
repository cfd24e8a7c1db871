//! Route configuration

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

use crate::api_doc::ApiDoc;
use crate::auth::identify_user;
use crate::constants::{API_PREFIX, HTTP_CONCURRENCY_LIMIT, OPENAPI_PATH};
use crate::handlers::{health, pictures, spaces};
use crate::state::AppState;

pub fn setup_routes(state: Arc<AppState>) -> Router {
    let body_limit = state.max_body_bytes();

    let api = Router::new()
        .route("/pictures/upload", post(pictures::upload_file))
        .route("/pictures/upload/url", post(pictures::upload_url))
        .route("/pictures/upload/batch", post(pictures::upload_batch))
        .route("/pictures/list", post(pictures::list_pictures))
        .route("/pictures/review", post(pictures::review_picture))
        .route("/pictures/tag_category", get(pictures::tag_category))
        .route(
            "/pictures/{id}",
            get(pictures::get_picture)
                .put(pictures::edit_picture)
                .delete(pictures::delete_picture),
        )
        .route("/spaces", post(spaces::create_space))
        .route("/spaces/levels", get(spaces::list_levels))
        .route("/spaces/{id}", get(spaces::get_space))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            identify_user,
        ))
        // Not behind identification.
        .route("/health", get(health::liveness));

    tracing::info!(
        http_concurrency_limit = HTTP_CONCURRENCY_LIMIT,
        body_limit,
        "HTTP limits configured"
    );

    Router::new()
        .nest(API_PREFIX, api)
        .route(OPENAPI_PATH, get(|| async { Json(ApiDoc::openapi()) }))
        .merge(RapiDoc::new(OPENAPI_PATH).path("/docs"))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
