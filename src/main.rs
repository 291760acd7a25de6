/// FiscalFlow: natural-language questions over an invoice database
///
/// Main entry point for the FiscalFlow server. Loads `.env`, builds the
/// configuration and starts the HTTP server.

use fiscalflow::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Question answering at POST /api/query
/// - Dashboard metrics at GET /api/metrics
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the environment may already be populated
    dotenvy::dotenv().ok();

    // Load configuration (defaults to 0.0.0.0:3004 and data/invoices.db)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
