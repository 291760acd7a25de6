/// Server setup and initialization
///
/// Wires together all components: invoice database, tool registry, reasoning
/// client, orchestrator and HTTP routes. Provides the main application factory
/// function for creating the Axum app.

use crate::{
    api::{router, AppState},
    config::Config,
    database::{invoices, SqliteAdapter},
    reasoning::{OpenAiClient, ReasoningClient},
    runtime::Orchestrator,
    tools::ToolRegistry,
};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes
///
/// Opens the invoice database (creating the table if needed), optionally seeds
/// sample invoices, and builds the orchestrator against the configured
/// reasoning endpoint.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("🗄️ Initializing invoice database: {}", config.database.path);
    let adapter = SqliteAdapter::connect(&config.database.path).await?;
    invoices::init_schema(adapter.pool())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize invoices table: {}", e))?;

    if config.database.seed_sample_data {
        invoices::seed_sample_invoices(adapter.pool())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to seed sample invoices: {}", e))?;
    }

    let pool = adapter.pool().clone();

    tracing::info!("🔧 Initializing tool registry");
    let tools = Arc::new(
        ToolRegistry::new(Arc::new(adapter))
            .with_query_timeout(config.orchestration.query_timeout())
            .with_max_rows(config.orchestration.max_result_rows),
    );

    tracing::info!("🧠 Initializing reasoning client ({})", config.reasoning.model);
    if config.reasoning.api_key.is_none() {
        tracing::warn!("⚠️ OPENAI_API_KEY is not set; requests will be sent without credentials");
    }
    let reasoner: Arc<dyn ReasoningClient> = Arc::new(OpenAiClient::new(
        &config.reasoning,
        config.orchestration.reasoning_timeout(),
    )?);

    tracing::info!("🚀 Initializing orchestrator");
    let orchestrator = Orchestrator::new(reasoner, tools, &config.orchestration)
        .map_err(|e| anyhow::anyhow!("Invalid workflow graph: {}", e))?;

    match config.orchestration.max_generate_visits {
        Some(limit) => tracing::info!("🔁 Query loop capped at {} generation steps", limit),
        None => tracing::warn!("⚠️ Query loop is uncapped"),
    }

    let app = router(AppState {
        orchestrator: Arc::new(orchestrator),
        invoices: pool,
    });

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
///
/// Creates the application and starts the Axum server on the configured address and port.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting FiscalFlow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
