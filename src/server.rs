/// Server setup and initialization
///
/// Wires together storage, routes and middleware, and runs the HTTP server.

use crate::{
    api::{create_view_routes, create_upload_routes, AppState},
    config::{Config, CorsConfig},
    content::ContentStorage,
};
use anyhow::Result;
use axum::{http::HeaderValue, routing::get, Router};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

/// Create the main Axum application with all routes and middleware
///
/// Opens the storage pool once; every request borrows from it.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("🗄️ Opening content database: {}", config.database.url);
    let storage = ContentStorage::connect(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open content database: {}", e))?;

    tracing::info!("📋 Initializing content schema");
    storage
        .init_schema()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize content schema: {}", e))?;

    if config.auth.upload_token.is_none() {
        tracing::warn!("⚠️ API_UPLOAD_TOKEN is not set, upload endpoints are open");
    }

    let state = AppState {
        storage,
        upload_token: config.auth.upload_token.as_deref().map(Arc::from),
    };

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))

        // Read-only content views
        .merge(create_view_routes())

        // Token-gated uploads
        .merge(create_upload_routes(state.clone(), config.server.max_upload_bytes))

        .layer(cors_layer(&config.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("content_api=info,tower_http=info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting content API server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");

    Ok(())
}

/// Build the CORS layer; an empty list or "*" allows any origin
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    if config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
