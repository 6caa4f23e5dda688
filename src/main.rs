//! # SQL Guard
//!
//! Runtime SQL safety validation and row-limit rewriting.
//!
//! `sql-guard` runs SQL statements through a chain of safety checkers before
//! they reach a database. Each statement gets a verdict: a risk level from
//! SAFE to CRITICAL and the violations behind it. A fallback rewriter adds a
//! row cap to SELECTs that have none, in the syntax of the target database.
//!
//! # Quick Start
//!
//! ```bash
//! # Check one statement
//! sql-guard check "DELETE FROM user WHERE deleted = 0"
//!
//! # Check a file of statements, JSON output
//! sql-guard check -f queries.sql -o json
//!
//! # Stream statements from stdin
//! echo "SELECT * FROM log" | sql-guard check -f -
//!
//! # Add a row cap for Oracle
//! sql-guard rewrite -d oracle "SELECT * FROM orders"
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from (in order of precedence):
//!
//! 1. Command-line arguments
//! 2. Environment variables (`SQL_GUARD_STRATEGY`, `SQL_GUARD_MAX_ROWS`, etc.)
//! 3. `--config <file>`, otherwise `.sql-guard.toml` in current directory
//! 4. `~/.config/sql-guard/config.toml`
//!
//! ## Example Configuration
//!
//! ```toml
//! violation_strategy = "block"
//! parse_failure = "fail_open"
//!
//! [rules]
//! disabled = ["GUARD017"]
//!
//! [rules.severity]
//! GUARD006 = "low"
//!
//! [rules.denied_table]
//! denied_tables = ["sys_*", "mysql.user"]
//!
//! [rewrite]
//! default_max_rows = 500
//! ```
//!
//! # Exit Codes
//!
//! With the blocking strategy the exit code reflects the highest risk found:
//!
//! - `0` - No violations
//! - `1` - Violations below HIGH
//! - `2` - HIGH or CRITICAL violations
//!
//! Warn and log strategies always exit with `0`. Errors (unreadable input,
//! invalid configuration) exit with `1` after printing to stderr.
//!
//! # Output Formats
//!
//! - `text` - Human-readable colored output (default)
//! - `json` - Structured JSON for programmatic processing
//! - `yaml` - YAML format

use std::process;

use clap::Parser;
use sql_guard::{
    app::{CheckParams, RewriteParams, SqlInput, create_output_options, run_check, run_rewrite},
    cli::{Cli, Commands},
    config::GuardConfig,
    error::AppResult,
    output::{format_dialects, format_rules},
    rules::RuleRunner
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logs go to stderr so report output on stdout stays parseable
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));

    let subscriber = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn input(sql: Option<String>, file: Option<std::path::PathBuf>) -> SqlInput {
    match (sql, file) {
        (_, Some(path)) => SqlInput::File(path),
        (Some(sql), None) => SqlInput::Text(sql),
        (None, None) => SqlInput::File("-".into())
    }
}

fn run(cli: Cli) -> AppResult<i32> {
    let config = GuardConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Check {
            sql,
            file,
            dialect,
            caller,
            datasource,
            strategy,
            output_format,
            verbose,
            no_color
        } => {
            let params = CheckParams {
                input: input(sql, file),
                dialect,
                caller,
                datasource,
                strategy,
                output_format,
                verbose,
                no_color
            };
            let result = run_check(params, config)?;
            println!("{}", result.output);
            Ok(result.exit_code)
        }
        Commands::Rewrite {
            sql,
            file,
            dialect,
            max_rows,
            enforce,
            output_format,
            verbose,
            no_color
        } => {
            let params = RewriteParams {
                input: input(sql, file),
                dialect,
                max_rows,
                enforce,
                output_format,
                verbose,
                no_color
            };
            let result = run_rewrite(params, &config)?;
            println!("{}", result.output);
            Ok(result.exit_code)
        }
        Commands::Dialects {
            output_format
        } => {
            let opts = create_output_options(output_format, true, false);
            print!("{}", format_dialects(&opts));
            Ok(0)
        }
        Commands::Rules {
            output_format,
            no_color
        } => {
            let opts = create_output_options(output_format, no_color, false);
            let runner = RuleRunner::with_config(&config);
            let rules: Vec<_> = runner.rules().collect();
            print!("{}", format_rules(&rules, &opts));
            Ok(0)
        }
    }
}
