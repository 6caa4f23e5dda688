//! What happens to a failing verdict.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{SQL_SNIPPET_LEN, ViolationStrategyError, sql_snippet},
    rules::ValidationResult
};

/// Reaction to a verdict with violations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationStrategy {
    /// Refuse execution
    #[default]
    Block,
    /// Log at warn level and proceed
    Warn,
    /// Log at info level and proceed
    Log
}

impl ViolationStrategy {
    /// Apply the strategy to a verdict.
    ///
    /// Passing verdicts always return `Ok`. Only [`ViolationStrategy::Block`]
    /// turns a failing verdict into an error.
    pub fn apply(&self, result: &ValidationResult, sql: &str) -> Result<(), ViolationStrategyError> {
        if result.passed() {
            return Ok(());
        }
        let risk = result.risk();
        let messages = result.messages();
        let snippet = sql_snippet(sql, SQL_SNIPPET_LEN);
        match self {
            Self::Block => {
                warn!(risk = %risk, sql = %snippet, violations = messages.len(), "SQL blocked");
                Err(ViolationStrategyError {
                    risk,
                    messages,
                    sql_snippet: snippet
                })
            }
            Self::Warn => {
                warn!(
                    risk = %risk,
                    sql = %snippet,
                    violations = %messages.join("; "),
                    "SQL safety violations detected"
                );
                Ok(())
            }
            Self::Log => {
                info!(
                    risk = %risk,
                    sql = %snippet,
                    violations = %messages.join("; "),
                    "SQL safety violations detected"
                );
                Ok(())
            }
        }
    }
}

impl fmt::Display for ViolationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Warn => write!(f, "warn"),
            Self::Log => write!(f, "log")
        }
    }
}

impl FromStr for ViolationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "warn" | "warning" => Ok(Self::Warn),
            "log" => Ok(Self::Log),
            other => Err(format!("unknown violation strategy '{}'", other))
        }
    }
}
