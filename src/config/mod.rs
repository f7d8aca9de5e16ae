/// Configuration management for the content API
///
/// Handles server binding, the storage connection string, CORS origins and the
/// optional upload bearer token. Every value can be overridden from the environment.

use serde::{Deserialize, Serialize};

/// Upload body cap when `CONTENT_API_MAX_UPLOAD_BYTES` is unset (64 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Cross-origin configuration
    pub cors: CorsConfig,
    /// Upload authentication
    pub auth: AuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
    /// Largest accepted upload request body in bytes
    pub max_upload_bytes: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection string (e.g., "sqlite://app.db"). The file is created if missing.
    pub url: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; empty or containing "*" allows any origin
    pub allowed_origins: Vec<String>,
}

/// Bearer token gate for upload endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// When `None`, uploads are open to anyone
    pub upload_token: Option<String>,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("CONTENT_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("CONTENT_API_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .unwrap_or(8000),
                max_upload_bytes: std::env::var("CONTENT_API_MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://app.db".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(
                    &std::env::var("API_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
                ),
            },
            auth: AuthConfig {
                upload_token: std::env::var("API_UPLOAD_TOKEN")
                    .ok()
                    .filter(|token| !token.is_empty()),
            },
        }
    }
}

/// Split a comma-separated origin list, dropping blank entries
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
