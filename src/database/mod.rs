/// Database layer
///
/// The orchestration core only sees the `DatabaseAdapter` contract. This module
/// provides the SQLite implementation over sqlx plus the invoice store used to
/// create, seed and summarise the invoices table.

// SQLite adapter: metadata queries and read-query execution
pub mod sqlite;

// Invoice table definition, sample data and dashboard metrics
pub mod invoices;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use sqlite::SqliteAdapter;

/// Failure reported by a database adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The connection is broken or the pool is exhausted
    #[error("connection failure: {0}")]
    Connection(String),

    /// The statement was rejected or failed while running
    #[error("{0}")]
    Query(String),

    #[error("table '{0}' not found in database")]
    UnknownTable(String),
}

/// Tabular result of a read query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Set when rows beyond the configured cap were dropped
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl QueryRows {
    /// Keep at most `max_rows` rows
    pub fn truncate(&mut self, max_rows: usize) {
        if self.rows.len() > max_rows {
            self.rows.truncate(max_rows);
            self.truncated = true;
        }
    }

    /// Compact JSON rendering placed in the message log
    pub fn render(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"error\":\"unrenderable result: {}\"}}", e))
    }
}

/// Contract the orchestration core consumes from the database
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// SQL dialect name, used to parameterise prompts (e.g. "sqlite")
    fn dialect(&self) -> &str;

    async fn list_tables(&self) -> Result<Vec<String>, AdapterError>;

    /// Schema text (DDL plus sample rows) for the requested tables
    async fn get_schema(&self, tables: &[String]) -> Result<String, AdapterError>;

    /// Run a read statement, keeping at most `max_rows` rows
    ///
    /// Implementations stop reading once the cap is passed and mark the result
    /// truncated. An empty result still carries its column names.
    async fn execute_read_query(&self, sql: &str, max_rows: usize) -> Result<QueryRows, AdapterError>;
}
