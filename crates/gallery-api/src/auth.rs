//! Caller identification.
//!
//! Sessions are handled upstream; the gateway forwards the authenticated user
//! id in `X-User-Id`. Requests without the header are anonymous.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use gallery_core::models::User;
use gallery_core::AppError;
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::HttpAppError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller. Rejects anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The caller, if any.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// Resolve `X-User-Id` through the user store and attach the user to the request.
pub async fn identify_user(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, HttpAppError> {
    if let Some(value) = request.headers().get(USER_ID_HEADER) {
        let id = value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| AppError::Unauthorized("Malformed X-User-Id header".to_string()))?;
        let user = state
            .users
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))?;
        request.extensions_mut().insert(CurrentUser(user));
    }
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("Not signed in".to_string())))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<CurrentUser>()
                .map(|current| current.0.clone()),
        ))
    }
}
