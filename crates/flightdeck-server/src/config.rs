// ABOUTME: Configuration loading and validation for the flightdeck server and CLI.
// ABOUTME: Reads FLIGHTDECK_* environment variables, falling back to defaults for anything unset.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use flightdeck_agent::{OrchestratorConfig, PlanningPolicy};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("FLIGHTDECK_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("{var} must be a non-negative number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("invalid timeouts: {0}")]
    InvalidTimeout(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct FlightdeckConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub default_provider: String,
    pub default_model: Option<String>,
    pub tool_timeout: Duration,
    pub sql_timeout: Duration,
    pub max_rows: usize,
    pub max_history_turns: usize,
    pub enable_analysis: bool,
    pub adaptive_planning: bool,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn flag(name: &str) -> bool {
    var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn number<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var: name, value }),
    }
}

impl FlightdeckConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - FLIGHTDECK_BIND: socket address to bind (default: 127.0.0.1:5001)
    /// - FLIGHTDECK_DB_PATH: SQLite database file (default: nycflights13.db)
    /// - FLIGHTDECK_DEFAULT_PROVIDER: LLM provider (default: anthropic)
    /// - FLIGHTDECK_DEFAULT_MODEL: LLM model name (optional)
    /// - FLIGHTDECK_TOOL_TIMEOUT_SECS: per-tool timeout (default: 30)
    /// - FLIGHTDECK_SQL_TIMEOUT_SECS: per-query timeout (default: 10)
    /// - FLIGHTDECK_MAX_ROWS: row cap for query results (default: 100)
    /// - FLIGHTDECK_MAX_HISTORY_TURNS: turns retained per session (default: 10)
    /// - FLIGHTDECK_ENABLE_ANALYSIS: add the analyze_data step (default: false)
    /// - FLIGHTDECK_ADAPTIVE_PLANNING: skip charts for single-value questions (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_str = var("FLIGHTDECK_BIND").unwrap_or_else(|| "127.0.0.1:5001".to_string());
        let bind: SocketAddr = bind_str
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let db_path = var("FLIGHTDECK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("nycflights13.db"));

        let default_provider =
            var("FLIGHTDECK_DEFAULT_PROVIDER").unwrap_or_else(|| "anthropic".to_string());
        let default_model = var("FLIGHTDECK_DEFAULT_MODEL");

        let config = Self {
            bind,
            db_path,
            default_provider,
            default_model,
            tool_timeout: Duration::from_secs(number("FLIGHTDECK_TOOL_TIMEOUT_SECS", 30)?),
            sql_timeout: Duration::from_secs(number("FLIGHTDECK_SQL_TIMEOUT_SECS", 10)?),
            max_rows: number("FLIGHTDECK_MAX_ROWS", 100)?,
            max_history_turns: number("FLIGHTDECK_MAX_HISTORY_TURNS", 10)?,
            enable_analysis: flag("FLIGHTDECK_ENABLE_ANALYSIS"),
            adaptive_planning: flag("FLIGHTDECK_ADAPTIVE_PLANNING"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Both timeouts must be nonzero, and a query must be interrupted before
    /// the tool call running it times out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tool_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "FLIGHTDECK_TOOL_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if self.sql_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "FLIGHTDECK_SQL_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if self.sql_timeout >= self.tool_timeout {
            return Err(ConfigError::InvalidTimeout(format!(
                "FLIGHTDECK_SQL_TIMEOUT_SECS ({}s) must be less than \
                 FLIGHTDECK_TOOL_TIMEOUT_SECS ({}s)",
                self.sql_timeout.as_secs(),
                self.tool_timeout.as_secs()
            )));
        }
        Ok(())
    }

    /// Orchestrator settings derived from this configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            tool_timeout: self.tool_timeout,
            policy: PlanningPolicy {
                include_analysis: self.enable_analysis,
                adaptive: self.adaptive_planning,
            },
        }
    }
}
