//! Shared-secret authentication.
//!
//! When `server.require_api_key` is set, protected routes need an
//! `X-API-Key` header equal to the configured key.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware that validates the `X-API-Key` header. Returns 401 if
/// missing or wrong. An empty configured key accepts nothing.
pub async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !state.server.require_api_key {
        return next.run(req).await;
    }

    let expected = state.server.api_key.as_str();
    let authorized = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|key| !expected.is_empty() && key == expected)
        .unwrap_or(false);

    if authorized {
        next.run(req).await
    } else {
        warn!(path = %req.uri().path(), "Rejected request without a valid API key");
        ApiError::Unauthorized.into_response()
    }
}
