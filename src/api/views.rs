/// Read endpoints for stored content
///
/// Responses carry an `ETag` computed over the `data` array, so clients polling an
/// unchanged store get `304 Not Modified` without a body.

use crate::{
    api::AppState,
    content::{projector, ContentError},
    error::ApiError,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Create read routes (no authentication)
pub fn create_view_routes() -> Router<AppState> {
    Router::new()
        .route("/api/job-roles", get(get_job_roles))
        .route("/api/process-flows", get(get_process_flows))
}

/// List all job roles
///
/// GET /api/job-roles
/// Returns: { "data": [{ "id": "...", "title": "...", "skills": [...], ... }], "generated_at": "..." }
async fn get_job_roles(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let listing = projector::list_job_roles(&state.storage).await?;
    let etag = etag_for(&listing.data)?;
    Ok(conditional_json(&headers, etag, &listing))
}

/// List all process flows with their steps
///
/// GET /api/process-flows
/// Returns: { "data": [{ "id": "...", "name": "...", "steps": [{ "id": "...", "depends_on": [...] }] }] }
async fn get_process_flows(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let listing = projector::list_process_flows(&state.storage).await?;
    let etag = etag_for(&listing.data)?;
    Ok(conditional_json(&headers, etag, &listing))
}

/// Quoted SHA-256 of the serialized value
fn etag_for<T: Serialize>(value: &T) -> Result<String, ApiError> {
    let bytes = serde_json::to_vec(value).map_err(ContentError::from)?;
    Ok(format!("\"{:x}\"", Sha256::digest(&bytes)))
}

fn conditional_json<T: Serialize>(headers: &HeaderMap, etag: String, body: &T) -> Response {
    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.split(',').map(str::trim).any(|tag| tag == etag || tag == "*"));

    if not_modified {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
    }

    ([(header::ETAG, etag)], Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_is_stable_and_content_sensitive() {
        let a = etag_for(&vec!["x", "y"]).unwrap();
        assert_eq!(a, etag_for(&vec!["x", "y"]).unwrap());
        assert_ne!(a, etag_for(&vec!["y", "x"]).unwrap());
        assert!(a.starts_with('"') && a.ends_with('"'));
        assert_eq!(a.len(), 64 + 2);
    }

    #[test]
    fn test_if_none_match_list_is_honoured() {
        let etag = etag_for(&vec![1, 2]).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_NONE_MATCH,
            format!("\"other\", {}", etag).parse().unwrap(),
        );

        let response = conditional_json(&headers, etag, &vec![1, 2]);
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }
}
