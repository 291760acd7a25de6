/// Configuration management for FiscalFlow
///
/// Handles server, database, reasoning service and orchestration parameters.
/// Every value can be overridden through the environment.

use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Reasoning service configuration
    pub reasoning: ReasoningConfig,
    /// Query loop limits and timeouts
    pub orchestration: OrchestrationConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Invoice database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the invoices table (default: "data/invoices.db")
    pub path: String,
    /// Replace the table contents with sample invoices on startup
    pub seed_sample_data: bool,
}

/// OpenAI-compatible reasoning endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Base URL up to and including the API version (e.g. "https://api.openai.com/v1")
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
}

/// Limits applied to every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Ceiling on generate-query visits per run; `None` leaves the loop uncapped
    pub max_generate_visits: Option<u32>,
    /// Default row limit suggested to the query writer
    pub top_k: u32,
    pub reasoning_timeout_secs: u64,
    pub query_timeout_secs: u64,
    /// Rows kept from a single query result
    pub max_result_rows: usize,
}

impl OrchestrationConfig {
    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoning_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_generate_visits: Some(10),
            top_k: 5,
            reasoning_timeout_secs: 60,
            query_timeout_secs: 30,
            max_result_rows: 200,
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        let orchestration_defaults = OrchestrationConfig::default();

        Self {
            server: ServerConfig {
                host: std::env::var("FISCALFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("FISCALFLOW_PORT", 3004),
            },
            database: DatabaseConfig {
                path: std::env::var("FISCALFLOW_DATABASE_PATH")
                    .unwrap_or_else(|_| "data/invoices.db".to_string()),
                seed_sample_data: env_or("FISCALFLOW_SEED_SAMPLE_DATA", false),
            },
            reasoning: ReasoningConfig {
                base_url: std::env::var("FISCALFLOW_REASONING_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                model: std::env::var("FISCALFLOW_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
                api_key: std::env::var("OPENAI_API_KEY").ok().filter(|key| !key.is_empty()),
                temperature: 0.0,
            },
            orchestration: OrchestrationConfig {
                max_generate_visits: match std::env::var("FISCALFLOW_MAX_GENERATE_VISITS") {
                    Ok(raw) => parse_visit_limit(&raw).unwrap_or(orchestration_defaults.max_generate_visits),
                    Err(_) => orchestration_defaults.max_generate_visits,
                },
                top_k: env_or("FISCALFLOW_TOP_K", orchestration_defaults.top_k),
                reasoning_timeout_secs: env_or(
                    "FISCALFLOW_REASONING_TIMEOUT_SECS",
                    orchestration_defaults.reasoning_timeout_secs,
                ),
                query_timeout_secs: env_or(
                    "FISCALFLOW_QUERY_TIMEOUT_SECS",
                    orchestration_defaults.query_timeout_secs,
                ),
                max_result_rows: env_or("FISCALFLOW_MAX_RESULT_ROWS", orchestration_defaults.max_result_rows),
            },
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// `0` or `unbounded` disables the cap; anything unparseable yields `None`
/// so the caller keeps its default
fn parse_visit_limit(raw: &str) -> Option<Option<u32>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("unbounded") {
        return Some(None);
    }
    match raw.parse::<u32>() {
        Ok(0) => Some(None),
        Ok(limit) => Some(Some(limit)),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visit_limit_parsing() {
        assert_eq!(parse_visit_limit("12"), Some(Some(12)));
        assert_eq!(parse_visit_limit(" 0 "), Some(None));
        assert_eq!(parse_visit_limit("Unbounded"), Some(None));
        assert_eq!(parse_visit_limit("lots"), None);
    }

    #[test]
    fn orchestration_defaults() {
        let defaults = OrchestrationConfig::default();
        assert_eq!(defaults.max_generate_visits, Some(10));
        assert_eq!(defaults.top_k, 5);
        assert_eq!(defaults.query_timeout(), Duration::from_secs(30));
    }
}
