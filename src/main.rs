/// Content API server
///
/// Main entry point. Loads configuration from the environment (and `.env` if
/// present) and starts the HTTP server:
/// - Uploads at POST /api/upload-csv and POST /api/upload
/// - Reads at GET /api/job-roles and GET /api/process-flows
/// - Health check at /healthz

use content_api::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
