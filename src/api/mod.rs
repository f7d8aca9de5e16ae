/// HTTP API Layer
///
/// This module provides the REST endpoints of the content backend. It handles:
/// - CSV and JSON uploads behind an optional bearer token
/// - Read endpoints projecting stored content as nested JSON

use crate::content::ContentStorage;
use std::sync::Arc;

// Bearer token gate for upload routes
pub mod auth;

// Upload endpoints (POST)
pub mod upload;

// Read endpoints (GET)
pub mod views;

// Re-export router builders
pub use views::create_view_routes;
pub use upload::create_upload_routes;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Content store; clones share one connection pool
    pub storage: ContentStorage,
    /// Expected upload token; `None` leaves uploads open
    pub upload_token: Option<Arc<str>>,
}
