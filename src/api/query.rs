/// Question-answering endpoint
///
/// POST /api/query runs one orchestration per request. The run is spawned on its
/// own task and tied to the request through a cancellation guard, so a client
/// that disconnects stops the run at its next step boundary.

use crate::{
    api::AppState,
    error::{FailureKind, OrchestrationError},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
}

/// Error body; never includes raw reasoning-service payloads
#[derive(Debug, Serialize)]
pub struct QueryErrorResponse {
    pub error: &'static str,
    pub detail: String,
    pub last_query: Option<String>,
}

/// Answer a natural-language question
///
/// POST /api/query
/// Body: { "question": "What was total spend in 2024?" }
/// Returns: { "answer": "..." } or { "error": "...", "detail": "...", "last_query": "..." }
pub async fn answer_question(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Response {
    let question = payload.question.trim().to_string();
    if question.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "empty_question",
            "question must not be empty".to_string(),
            None,
        );
    }

    tracing::info!("❓ Question received: {}", question);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let orchestrator = state.orchestrator.clone();
    let run = tokio::spawn(async move { orchestrator.run_with_cancellation(&question, &cancel).await });

    match run.await {
        Ok(Ok(answer)) => {
            tracing::info!("💬 Answered after {} generation steps", answer.generate_visits);
            Json(QueryResponse { answer: answer.text }).into_response()
        }
        Ok(Err(failure)) => failure_response(failure),
        Err(join_error) => {
            tracing::error!("❌ Query task failed: {}", join_error);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "query task failed".to_string(),
                None,
            )
        }
    }
}

fn failure_response(failure: OrchestrationError) -> Response {
    let status = match &failure.kind {
        FailureKind::IterationLimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::Reasoning(_) => StatusCode::BAD_GATEWAY,
        FailureKind::ToolUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::Cancelled | FailureKind::Log(_) | FailureKind::Graph(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    tracing::warn!(
        "⚠️ Run failed ({}): {} [last query: {}]",
        failure.kind.code(),
        failure,
        failure.last_query.as_deref().unwrap_or("-")
    );

    error_response(status, failure.kind.code(), failure.to_string(), failure.last_query)
}

fn error_response(
    status: StatusCode,
    error: &'static str,
    detail: String,
    last_query: Option<String>,
) -> Response {
    (status, Json(QueryErrorResponse { error, detail, last_query })).into_response()
}
