//! Error types for ingestion and storage of content

use thiserror::Error;

/// Upload rejected before any storage mutation
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("unknown upload kind `{0}`, expected `job_roles` or `process_flows`")]
    UnknownKind(String),

    #[error("{location}: missing required value for `{field}`")]
    MissingField {
        location: String,
        field: &'static str,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage-side failure while writing or projecting content
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("failed to encode or decode stored list column: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ContentResult<T> = std::result::Result<T, ContentError>;
