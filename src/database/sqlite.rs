/// SQLite database adapter
///
/// Implements the metadata and read-query contract over a sqlx connection pool.
/// Rows are decoded dynamically into JSON values using each value's runtime
/// storage class, so aggregates like SUM over NUMERIC columns come back as numbers.

use crate::database::{AdapterError, DatabaseAdapter, QueryRows};
use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{json, Value};
use sqlx::{
    sqlite::{SqliteColumn, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Column, Executor, Row, Statement, TypeInfo, ValueRef,
};
use std::{path::Path, str::FromStr};

/// Sample rows appended to each table's schema description
const SCHEMA_SAMPLE_ROWS: usize = 3;

/// SQLite implementation of `DatabaseAdapter`
#[derive(Debug, Clone)]
pub struct SqliteAdapter {
    pool: SqlitePool,
}

impl SqliteAdapter {
    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) a database file
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("Failed to create database directory '{}': {}", parent.display(), e)
            })?;
        }

        tracing::info!("🗄️ Opening invoice database: {}", path);

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database; the connection is never recycled so
    /// the data lives as long as the pool
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn describe_table(&self, table: &str) -> Result<String, AdapterError> {
        if !is_identifier(table) {
            return Err(AdapterError::UnknownTable(table.to_string()));
        }

        let ddl: Option<String> = sqlx::query_scalar::<_, Option<String>>(
            "SELECT sql FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .flatten();

        let ddl = ddl.ok_or_else(|| AdapterError::UnknownTable(table.to_string()))?;

        let sample_sql = format!("SELECT * FROM \"{}\" LIMIT {}", table, SCHEMA_SAMPLE_ROWS);
        let sample = sqlx::query(&sample_sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut lines = Vec::with_capacity(sample.len() + 1);
        if let Some(first) = sample.first() {
            lines.push(
                first.columns().iter().map(|c| c.name()).collect::<Vec<_>>().join("\t"),
            );
        }
        for row in &sample {
            let cells: Vec<String> = (0..row.columns().len())
                .map(|i| match column_to_json(row, i) {
                    Value::String(s) => s,
                    Value::Null => "NULL".to_string(),
                    other => other.to_string(),
                })
                .collect();
            lines.push(cells.join("\t"));
        }

        Ok(format!(
            "{}\n\n/*\n{} rows from {} table:\n{}\n*/",
            ddl.trim(),
            sample.len(),
            table,
            lines.join("\n")
        ))
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    fn dialect(&self) -> &str {
        "sqlite"
    }

    async fn list_tables(&self) -> Result<Vec<String>, AdapterError> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn get_schema(&self, tables: &[String]) -> Result<String, AdapterError> {
        let mut blocks = Vec::with_capacity(tables.len());
        for table in tables {
            blocks.push(self.describe_table(table).await?);
        }
        Ok(blocks.join("\n\n"))
    }

    async fn execute_read_query(&self, sql: &str, max_rows: usize) -> Result<QueryRows, AdapterError> {
        tracing::debug!("📝 SQL Query: {}", sql);

        let mut result = QueryRows::default();
        let mut stream = sqlx::query(sql).fetch(&self.pool);
        while let Some(row) = stream.try_next().await.map_err(map_sqlx_error)? {
            if result.columns.is_empty() {
                result.columns = column_names(row.columns());
            }
            if result.rows.len() == max_rows {
                result.truncated = true;
                break;
            }
            result
                .rows
                .push((0..row.columns().len()).map(|i| column_to_json(&row, i)).collect());
        }
        drop(stream);

        if result.columns.is_empty() {
            let statement = (&self.pool).prepare(sql).await.map_err(map_sqlx_error)?;
            result.columns = column_names(statement.columns());
        }

        Ok(result)
    }
}

fn column_names(columns: &[SqliteColumn]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// Decode one column of a row by the value's storage class
fn column_to_json(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(index).map(Value::from).ok(),
        "REAL" | "NUMERIC" => row.try_get::<f64, _>(index).map(|f| json!(f)).ok(),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| Value::String(format!("<{} bytes>", bytes.len())))
            .ok(),
        _ => None,
    };

    decoded
        .or_else(|| row.try_get::<String, _>(index).map(Value::String).ok())
        .unwrap_or(Value::Null)
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn map_sqlx_error(error: sqlx::Error) -> AdapterError {
    match &error {
        sqlx::Error::Database(db) => AdapterError::Query(db.message().to_string()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => AdapterError::Connection(error.to_string()),
        _ => AdapterError::Query(error.to_string()),
    }
}
