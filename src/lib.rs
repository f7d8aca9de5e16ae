/// Content API: job roles and process flows backend
///
/// This library accepts CSV or JSON uploads, merges them idempotently into a
/// SQLite store keyed by natural ids, and serves the current state as nested JSON.

// Core configuration and setup
pub mod config;

// HTTP-facing error type
pub mod error;

// Content layer - types, ingestion, storage, upserts and projections
pub mod content;

// HTTP API layer - upload and read endpoints
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use content::{ContentStorage, JobRole, ProcessFlow, ProcessStep, UploadPayload};
pub use server::{create_app, start_server};
