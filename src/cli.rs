use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// SQL Guard - Check SQL for unsafe patterns and enforce row limits
#[derive(Parser, Debug)]
#[command(name = "sql-guard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (replaces `.sql-guard.toml` discovery)
    #[arg(short, long, global = true, env = "SQL_GUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check SQL statements against the safety checkers
    Check {
        /// SQL text to check
        sql: Option<String>,

        /// Read statements from a file (use - for stdin)
        #[arg(short, long, conflicts_with = "sql")]
        file: Option<PathBuf>,

        /// SQL dialect for parsing, overrides the configured one
        #[arg(long, value_enum)]
        dialect: Option<Dialect>,

        /// Caller identifier (e.g. a mapper id) for whitelist matching
        #[arg(long)]
        caller: Option<String>,

        /// Datasource name recorded in the call context
        #[arg(long)]
        datasource: Option<String>,

        /// Violation strategy, overrides the configured one
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,

        /// Output format
        #[arg(short = 'o', long = "format", value_enum, default_value = "text")]
        output_format: Format,

        /// Show violation details
        #[arg(short, long)]
        verbose: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    },

    /// Add or cap the row limit of a SELECT
    Rewrite {
        /// SQL text to rewrite
        sql: Option<String>,

        /// Read the statement from a file (use - for stdin)
        #[arg(short, long, conflicts_with = "sql")]
        file: Option<PathBuf>,

        /// Target database (e.g. mysql, oracle, "SQL Server", informix)
        #[arg(short, long, default_value = "mysql")]
        dialect: String,

        /// Row cap, overrides `rewrite.default_max_rows`
        #[arg(long)]
        max_rows: Option<u64>,

        /// Lower existing literal limits above the cap
        #[arg(long)]
        enforce: bool,

        /// Output format
        #[arg(short = 'o', long = "format", value_enum, default_value = "text")]
        output_format: Format,

        /// Show what the rewriter did
        #[arg(short, long)]
        verbose: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    },

    /// List supported database dialects
    Dialects {
        #[arg(short = 'o', long = "format", value_enum, default_value = "text")]
        output_format: Format
    },

    /// List the safety checkers
    Rules {
        #[arg(short = 'o', long = "format", value_enum, default_value = "text")]
        output_format: Format,

        /// Disable colored output
        #[arg(long)]
        no_color: bool
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Dialect {
    Generic,
    Mysql,
    Postgresql,
    Mssql
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Strategy {
    Block,
    Warn,
    Log
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace"
        }
    }
}
