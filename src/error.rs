//! Error types.
//!
//! Two layers live here:
//!
//! - [`GuardError`] is the typed engine error returned by parsing,
//!   validation, rewriting and the pipeline. [`ViolationStrategyError`] is
//!   its caller-visible "blocked" payload.
//! - [`AppError`] / [`AppResult`] from `masterror` wrap everything at the
//!   application boundary (CLI, config files). [`GuardError`] converts into
//!   [`AppError`].

pub use masterror::{AppError, AppResult};
use thiserror::Error;

use crate::rules::RiskLevel;

/// Maximum number of characters of SQL echoed back in messages
pub const SQL_SNIPPET_LEN: usize = 100;

/// Engine error
#[derive(Debug, Error)]
pub enum GuardError {
    /// SQL text could not be parsed into an AST
    #[error("Failed to parse SQL: {sql} - Reason: {reason}")]
    Parse { sql: String, reason: String },

    /// A checker failed on otherwise valid input
    #[error("Checker {rule_id} failed: {message}")]
    CheckerFailure {
        rule_id: &'static str,
        message: String
    },

    /// Execution blocked by the configured violation strategy
    #[error(transparent)]
    Blocked(#[from] ViolationStrategyError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed call context
    #[error("Invalid call context: {0}")]
    Context(String)
}

impl GuardError {
    pub fn parse(sql: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            sql:    sql_snippet(sql, SQL_SNIPPET_LEN),
            reason: reason.into()
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Raised when a failing verdict is turned into a blocking decision.
///
/// Carries everything a caller needs to log or surface the refusal.
#[derive(Debug, Clone, Error)]
#[error(
    "SQL safety violations detected [{risk}] in '{sql_snippet}': {}",
    .messages.join("; ")
)]
pub struct ViolationStrategyError {
    pub risk:        RiskLevel,
    pub messages:    Vec<String>,
    pub sql_snippet: String
}

impl From<GuardError> for AppError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Parse {
                reason, ..
            } => query_parse_error(reason),
            GuardError::Config(message) => config_error(message),
            GuardError::Context(message) => AppError::bad_request(message),
            GuardError::Blocked(blocked) => AppError::bad_request(blocked.to_string()),
            other @ GuardError::CheckerFailure {
                ..
            } => AppError::internal(other.to_string())
        }
    }
}

/// Truncate SQL for log and error messages, appending `...` when cut
pub fn sql_snippet(sql: &str, max_chars: usize) -> String {
    let trimmed = sql.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string()
    }
}

/// Create file read error
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create query parse error with optional position info
pub fn query_parse_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format_sql_error("Query parse error", &msg))
}

/// Create config error
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Format SQL error with position highlighting
fn format_sql_error(prefix: &str, message: &str) -> String {
    // sqlparser format: "... at Line: X, Column Y"
    if let Some(pos) = extract_position(message) {
        format!(
            "{} at line {}, column {}:\n  {}",
            prefix, pos.line, pos.column, message
        )
    } else {
        format!("{}:\n  {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

fn extract_position(message: &str) -> Option<SqlPosition> {
    let line_marker = "Line: ";
    let col_marker = ", Column ";

    let line_start = message.find(line_marker)?;
    let line_num_start = line_start + line_marker.len();
    let col_start = message[line_num_start..].find(col_marker)?;
    let line_str = &message[line_num_start..line_num_start + col_start];
    let col_num_start = line_num_start + col_start + col_marker.len();

    let col_end = message[col_num_start..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(message.len() - col_num_start);
    let col_str = &message[col_num_start..col_num_start + col_end];

    match (line_str.parse(), col_str.parse()) {
        (Ok(line), Ok(column)) => Some(SqlPosition { line, column }),
        _ => None
    }
}
