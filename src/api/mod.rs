/// HTTP API Layer
///
/// This module provides the REST API endpoints. It handles:
/// - Natural-language questions over the invoice database
/// - Dashboard metrics for a calendar year
/// - Health checks

// Question-answering endpoint
pub mod query;

// Dashboard metrics endpoint
pub mod metrics;

use crate::runtime::Orchestrator;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Shared run driver; holds no per-run state
    pub orchestrator: Arc<Orchestrator>,
    /// Invoice database pool for dashboard queries
    pub invoices: SqlitePool,
}

/// Create the application router with all endpoints
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/query", post(query::answer_question))
        .route("/api/metrics", get(metrics::dashboard_metrics))
        .with_state(state)
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
