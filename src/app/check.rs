//! Command execution.
//!
//! `check` splits its input into statements and validates them in parallel
//! with [`rayon`]; `rewrite` runs a single statement through the
//! [`LimitRewriter`].

use rayon::prelude::*;
use tracing::{debug, info};

use super::{
    convert::{convert_dialect, convert_strategy},
    helpers::{calculate_exit_code, create_output_options, read_sql_input},
    types::{CheckParams, CommandResult, RewriteParams}
};
use crate::{
    config::GuardConfig,
    context::SqlContext,
    dialect::DatabaseKind,
    error::{AppResult, config_error},
    output::{StatementReport, format_check_report, format_rewrite},
    query::scan::split_statements,
    rewriter::LimitRewriter,
    validator::Validator
};

/// Validates every statement of the input.
///
/// Deduplication is switched off so that repeated statements in one batch
/// each get a full verdict.
///
/// # Errors
///
/// Returns an error if the input cannot be read, holds no statements, or
/// the resulting configuration is invalid.
pub fn run_check(params: CheckParams, mut config: GuardConfig) -> AppResult<CommandResult> {
    let sql = read_sql_input(&params.input)?;
    if let Some(dialect) = params.dialect {
        config.dialect = convert_dialect(dialect);
    }
    if let Some(strategy) = params.strategy {
        config.violation_strategy = convert_strategy(strategy);
    }
    config.dedup.enabled = false;
    let strategy = config.violation_strategy;
    let validator = Validator::new(config)?;

    let statements = split_statements(&sql);
    if statements.is_empty() {
        return Err(config_error("No SQL statements found in input"));
    }
    debug!(statements = statements.len(), "checking batch");

    let reports: Vec<StatementReport> = statements
        .par_iter()
        .enumerate()
        .map(|(index, statement)| -> AppResult<StatementReport> {
            let mut builder = SqlContext::builder(*statement);
            if let Some(caller) = &params.caller {
                builder = builder.caller_id(caller.clone());
            }
            if let Some(datasource) = &params.datasource {
                builder = builder.datasource(datasource.clone());
            }
            let ctx = builder.build()?;
            let verdict = validator.validate(&ctx);
            // Block is reported through the exit code, the batch goes on
            match strategy.apply(&verdict, statement) {
                Ok(()) => {}
                Err(blocked) => debug!(index, error = %blocked, "statement blocked")
            }
            Ok(StatementReport {
                index,
                sql: statement.to_string(),
                verdict
            })
        })
        .collect::<AppResult<_>>()?;

    let opts = create_output_options(params.output_format, params.no_color, params.verbose);
    Ok(CommandResult {
        exit_code: calculate_exit_code(&reports, strategy),
        output:    format_check_report(&reports, &opts)
    })
}

/// Adds or caps the row limit of one SELECT
///
/// # Errors
///
/// Returns an error for an unknown dialect, a zero row cap, or SQL the
/// dialect cannot parse.
pub fn run_rewrite(params: RewriteParams, config: &GuardConfig) -> AppResult<CommandResult> {
    let sql = read_sql_input(&params.input)?;
    let dialect: DatabaseKind = params.dialect.parse().map_err(config_error)?;
    let max_rows = params.max_rows.unwrap_or(config.rewrite.default_max_rows);
    let enforce = params.enforce || config.rewrite.enforce_max_limit;
    let rewriter = LimitRewriter::new(max_rows, enforce)?;

    let outcome = rewriter.rewrite_sql(sql.trim().trim_end_matches(';'), dialect)?;
    info!(dialect = dialect.name(), outcome = %outcome.outcome, "rewrite command finished");

    let opts = create_output_options(params.output_format, params.no_color, params.verbose);
    Ok(CommandResult {
        exit_code: 0,
        output:    format_rewrite(&outcome, &opts)
    })
}
