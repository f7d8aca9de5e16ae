/// Bearer token gate for upload endpoints
///
/// With no token configured every request passes. Otherwise the request needs
/// `Authorization: Bearer <token>`: a missing or non-bearer header is 401, a
/// different token is 403.

use crate::{api::AppState, error::ApiError};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

pub async fn require_upload_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.upload_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::MissingToken)?;

    if token != expected {
        tracing::warn!("Rejected upload with invalid token");
        return Err(ApiError::InvalidToken);
    }

    Ok(next.run(request).await)
}
