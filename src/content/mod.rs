/// Content Management Layer
///
/// This module handles job roles and process flows end to end:
/// - Type definitions (JobRole, ProcessFlow, ProcessStep, UploadPayload)
/// - CSV/JSON ingestion into the canonical payload
/// - SQLite persistence with sqlx
/// - Transactional upserts keyed by natural ids
/// - Projection of stored rows back into nested views

// Error types for ingestion and storage
pub mod error;

// Core content type definitions
pub mod types;

// CSV/JSON normalization into the canonical payload
pub mod ingest;

// SQLite persistence layer
pub mod storage;

// Transactional merge of payloads into storage
pub mod upsert;

// Read-side assembly of nested views
pub mod projector;

// Re-export commonly used types
pub use error::{ContentError, IngestError};
pub use ingest::{NormalizedUpload, UploadKind};
pub use storage::ContentStorage;
pub use types::{JobRole, ProcessFlow, ProcessStep, UploadPayload};
pub use upsert::UpsertReport;
