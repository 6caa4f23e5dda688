//! Application types for CLI commands.
//!
//! Command parameters are plain structs so the command logic can be driven
//! from tests without going through argument parsing.

use std::path::PathBuf;

use crate::cli::{Dialect, Format, Strategy};

/// Where the SQL of a command comes from
#[derive(Debug, Clone)]
pub enum SqlInput {
    /// Inline SQL text
    Text(String),
    /// File path, `-` for stdin
    File(PathBuf)
}

/// Parameters for the check command.
///
/// # Example
///
/// ```
/// use sql_guard::{
///     app::{CheckParams, SqlInput},
///     cli::Format
/// };
///
/// let params = CheckParams {
///     input:         SqlInput::Text("SELECT * FROM log".to_string()),
///     dialect:       None,
///     caller:        None,
///     datasource:    None,
///     strategy:      None,
///     output_format: Format::Text,
///     verbose:       false,
///     no_color:      true
/// };
/// assert!(params.caller.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CheckParams {
    /// SQL source; files may hold several `;`-separated statements.
    pub input:         SqlInput,
    /// Parser dialect, `None` keeps the configured one.
    pub dialect:       Option<Dialect>,
    /// Caller identifier used for whitelist matching.
    pub caller:        Option<String>,
    /// Datasource recorded in every call context.
    pub datasource:    Option<String>,
    /// Strategy override, `None` keeps the configured one.
    pub strategy:      Option<Strategy>,
    pub output_format: Format,
    /// Show violation details.
    pub verbose:       bool,
    pub no_color:      bool
}

/// Parameters for the rewrite command
#[derive(Debug, Clone)]
pub struct RewriteParams {
    pub input:         SqlInput,
    /// Target database name, parsed into a `DatabaseKind`.
    pub dialect:       String,
    /// Row cap, `None` keeps `rewrite.default_max_rows`.
    pub max_rows:      Option<u64>,
    /// Lower existing literal limits above the cap.
    pub enforce:       bool,
    pub output_format: Format,
    pub verbose:       bool,
    pub no_color:      bool
}

/// Rendered command output and the exit code it maps to
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Process exit code (0 = clean, 1 = below HIGH, 2 = HIGH or worse).
    pub exit_code: i32,
    pub output:    String
}
