//! Helper functions for CLI operations.

use std::{
    fs::read_to_string,
    io::{self, Read}
};

use super::{convert::convert_format, types::SqlInput};
use crate::{
    cli::Format,
    error::{AppResult, file_read_error},
    output::{OutputOptions, StatementReport, batch_risk},
    rules::RiskLevel,
    strategy::ViolationStrategy
};

/// Calculates the process exit code of a checked batch.
///
/// Only the blocking strategy fails the run:
/// - `0` - No violations, or a non-blocking strategy
/// - `1` - Violations below HIGH
/// - `2` - At least one HIGH or CRITICAL violation
///
/// # Example
///
/// ```
/// use sql_guard::{app::calculate_exit_code, strategy::ViolationStrategy};
///
/// assert_eq!(calculate_exit_code(&[], ViolationStrategy::Block), 0);
/// ```
pub fn calculate_exit_code(reports: &[StatementReport], strategy: ViolationStrategy) -> i32 {
    if strategy != ViolationStrategy::Block {
        return 0;
    }
    match batch_risk(reports) {
        RiskLevel::Safe => 0,
        RiskLevel::High | RiskLevel::Critical => 2,
        _ => 1
    }
}

/// Reads SQL from inline text, a file, or stdin when the path is "-".
///
/// # Errors
///
/// Returns an error if the file cannot be read or stdin fails.
pub fn read_sql_input(input: &SqlInput) -> AppResult<String> {
    match input {
        SqlInput::Text(sql) => Ok(sql.clone()),
        SqlInput::File(path) if path.to_str() == Some("-") => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| file_read_error("stdin", e))?;
            Ok(buffer)
        }
        SqlInput::File(path) => {
            read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))
        }
    }
}

pub fn create_output_options(format: Format, no_color: bool, verbose: bool) -> OutputOptions {
    OutputOptions {
        format:  convert_format(format),
        colored: !no_color,
        verbose
    }
}
