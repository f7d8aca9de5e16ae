/// Upload REST API endpoints
///
/// Both endpoints normalize the request into the canonical payload first, so a
/// rejected upload never touches storage, then merge it in a single transaction.

use crate::{
    api::{auth::require_upload_token, AppState},
    content::{ingest, upsert, UploadKind},
    error::ApiError,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection,
        rejection::BytesRejection,
        DefaultBodyLimit, Multipart, Query, State,
    },
    middleware,
    response::Json,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};

/// Query string of `POST /api/upload-csv`
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub kind: Option<String>,
}

/// Response for CSV uploads
#[derive(Debug, Serialize)]
pub struct CsvUploadResponse {
    pub status: &'static str,
    pub kind: UploadKind,
    /// Rows read from the file, not rows written
    pub rows: usize,
}

/// Response for JSON uploads
#[derive(Debug, Serialize)]
pub struct JsonUploadResponse {
    pub status: &'static str,
    pub job_roles: usize,
    pub process_flows: usize,
}

/// Create upload routes
///
/// The token gate is attached as a route layer so it only guards these routes.
/// Request bodies above `max_upload_bytes` are answered with 413.
pub fn create_upload_routes(state: AppState, max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/upload-csv", post(upload_csv))
        .route("/api/upload", post(upload_json))
        .route_layer(middleware::from_fn_with_state(state, require_upload_token))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// Upload a CSV file
///
/// POST /api/upload-csv?kind=job_roles|process_flows
/// Body: multipart/form-data with a `file` field
async fn upload_csv(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CsvUploadResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| ApiError::from_body_failure(rejection.status(), rejection.body_text()))?;

    let kind: UploadKind = query
        .kind
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("missing `kind` query parameter".to_string()))?
        .parse()?;

    let mut content: Option<Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from_body_failure(e.status(), format!("Failed to read multipart field: {}", e.body_text())))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::from_body_failure(e.status(), format!("Failed to read file bytes: {}", e.body_text())))?;
            content = Some(data);
        }
    }

    let content = content
        .ok_or_else(|| ApiError::BadRequest("No `file` field found in multipart data".to_string()))?;

    tracing::debug!("📄 Received {} bytes of {} CSV", content.len(), kind);
    let upload = ingest::normalize_csv(kind, &content)?;
    upsert::apply_payload(&state.storage, &upload.payload).await?;

    tracing::info!("📥 Applied {} CSV upload with {} rows", kind, upload.rows);

    Ok(Json(CsvUploadResponse {
        status: "ok",
        kind,
        rows: upload.rows,
    }))
}

/// Upload a canonical JSON payload
///
/// POST /api/upload
/// Body: { "job_roles": [...], "process_flows": [{ ..., "steps": [...] }] }
async fn upload_json(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<JsonUploadResponse>, ApiError> {
    let body = body.map_err(|rejection| ApiError::from_body_failure(rejection.status(), rejection.body_text()))?;

    // Parse manually so malformed JSON gets the same error body as other validation faults
    let payload = ingest::parse_json_payload(&body)?;
    upsert::apply_payload(&state.storage, &payload).await?;

    tracing::info!(
        "📥 Applied JSON upload with {} job roles and {} process flows",
        payload.job_roles().len(),
        payload.process_flows().len()
    );

    Ok(Json(JsonUploadResponse {
        status: "ok",
        job_roles: payload.job_roles().len(),
        process_flows: payload.process_flows().len(),
    }))
}
