//! Conversions from CLI-facing enums to engine types.

use crate::{
    cli::{Dialect, Format, Strategy},
    output::OutputFormat,
    query::SqlDialect,
    strategy::ViolationStrategy
};

/// Converts a CLI dialect enum to the parser dialect.
///
/// # Example
///
/// ```
/// use sql_guard::{app::convert_dialect, cli::Dialect, query::SqlDialect};
///
/// let dialect = convert_dialect(Dialect::Mysql);
/// assert!(matches!(dialect, SqlDialect::MySQL));
/// ```
pub fn convert_dialect(dialect: Dialect) -> SqlDialect {
    match dialect {
        Dialect::Generic => SqlDialect::Generic,
        Dialect::Mysql => SqlDialect::MySQL,
        Dialect::Postgresql => SqlDialect::PostgreSQL,
        Dialect::Mssql => SqlDialect::MsSql
    }
}

pub fn convert_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml
    }
}

pub fn convert_strategy(strategy: Strategy) -> ViolationStrategy {
    match strategy {
        Strategy::Block => ViolationStrategy::Block,
        Strategy::Warn => ViolationStrategy::Warn,
        Strategy::Log => ViolationStrategy::Log
    }
}
