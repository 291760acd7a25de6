/// Tool registry
///
/// Dispatches validated invocations to the database adapter. Every `run_query`
/// passes the read-only guard first; adapter failures are classified into
/// `ToolExecutionError` kinds so the orchestrator can decide whether the
/// conversation absorbs them or the run aborts.

use crate::{
    database::{AdapterError, DatabaseAdapter},
    error::ToolExecutionError,
    tools::{guard::ensure_read_only, ToolInvocation, ToolOutput},
};
use std::{sync::Arc, time::Duration};

/// Default cap on a single query's execution time
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on rows returned into the conversation
const DEFAULT_MAX_ROWS: usize = 200;

#[derive(Clone)]
pub struct ToolRegistry {
    adapter: Arc<dyn DatabaseAdapter>,
    query_timeout: Duration,
    max_rows: usize,
}

impl ToolRegistry {
    pub fn new(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        Self {
            adapter,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn dialect(&self) -> &str {
        self.adapter.dialect()
    }

    /// Run one invocation against the database
    pub async fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolExecutionError> {
        match invocation {
            ToolInvocation::ListTables => {
                let tables = self.adapter.list_tables().await.map_err(classify)?;
                tracing::debug!("📋 Found {} tables", tables.len());
                Ok(ToolOutput::Tables(tables))
            }
            ToolInvocation::GetSchema { tables } => {
                let tables: Vec<String> = tables.iter().cloned().collect();
                let schema = self.adapter.get_schema(&tables).await.map_err(classify)?;
                Ok(ToolOutput::Schema(schema))
            }
            ToolInvocation::RunQuery { query } => {
                if let Err(rejection) = ensure_read_only(query) {
                    tracing::warn!("🚫 Rejected query: {}", rejection);
                    return Err(rejection);
                }

                let mut rows = tokio::time::timeout(
                    self.query_timeout,
                    self.adapter.execute_read_query(query, self.max_rows),
                )
                .await
                .map_err(|_| {
                    ToolExecutionError::execution_failed(format!(
                        "query exceeded the {:?} time limit",
                        self.query_timeout
                    ))
                })?
                .map_err(classify)?;

                rows.truncate(self.max_rows);
                tracing::debug!("📊 Query returned {} rows", rows.rows.len());
                Ok(ToolOutput::Rows(rows))
            }
        }
    }
}

fn classify(error: AdapterError) -> ToolExecutionError {
    match error {
        AdapterError::Connection(detail) => ToolExecutionError::unavailable(detail),
        other @ (AdapterError::Query(_) | AdapterError::UnknownTable(_)) => {
            ToolExecutionError::execution_failed(other.to_string())
        }
    }
}
