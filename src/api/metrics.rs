/// Dashboard metrics endpoint

use crate::{api::AppState, database::invoices};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Datelike;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct MetricsParams {
    pub year: Option<i32>,
}

/// Spend summary for one calendar year
///
/// GET /api/metrics?year=2024 (defaults to the current year)
/// Returns: { "year": 2024, "ytd_spend": ..., "top_vendor": ..., "last_food": ..., "currency_mix": "..." }
pub async fn dashboard_metrics(
    State(state): State<AppState>,
    Query(params): Query<MetricsParams>,
) -> Result<Json<Value>, StatusCode> {
    let year = params.year.unwrap_or_else(|| chrono::Utc::now().year());

    match invoices::dashboard_metrics(&state.invoices, year).await {
        Ok(metrics) => Ok(Json(json!(metrics))),
        Err(e) => {
            tracing::error!("Failed to compute dashboard metrics for {}: {}", year, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
