//! Optional bearer-token guard for the control API.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::ApiState;
use crate::errors::ApiError;

/// Reject requests without the configured bearer token. A missing
/// configuration leaves the API open.
pub(crate) async fn require_bearer_token(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_token.as_deref() else {
        return next.run(request).await;
    };

    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .trim();
    let Some(token) = header.strip_prefix("Bearer ") else {
        return ApiError::unauthorized("authorization header missing or malformed").into_response();
    };
    if token.trim() != expected {
        return ApiError::unauthorized("invalid token").into_response();
    }

    next.run(request).await
}
