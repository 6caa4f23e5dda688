//! Application logic for the `sql-guard` CLI.
//!
//! Kept apart from the binary entry point so the commands can be tested
//! directly.

mod check;
mod convert;
mod helpers;
mod types;

pub use check::{run_check, run_rewrite};
pub use convert::{convert_dialect, convert_format, convert_strategy};
pub use helpers::{calculate_exit_code, create_output_options, read_sql_input};
pub use types::{CheckParams, CommandResult, RewriteParams, SqlInput};
