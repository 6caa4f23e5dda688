//! Risk-checking entry point.
//!
//! ```text
//! SqlContext ──▶ enabled? ──▶ dedup ──▶ parse (cached) ──▶ RuleRunner ──▶ ValidationResult
//! ```
//!
//! The checker chain is rebuilt lazily whenever the [`ConfigHandle`]
//! publishes a new snapshot, so a hot reload takes effect on the next call.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::{
    cache::StatementScope,
    config::{ConfigHandle, GuardConfig, ParseFailureMode},
    context::SqlContext,
    dedup::DedupFilter,
    error::{GuardError, SQL_SNIPPET_LEN, sql_snippet},
    rules::{CheckContext, RiskLevel, RuleInfo, RuleRunner, ValidationResult, Violation}
};

/// Pseudo-rule reported when fail-closed parsing rejects the SQL
pub const PARSE_RULE: RuleInfo = RuleInfo {
    id:   "PARSE",
    name: "Unparsable SQL",
    risk: RiskLevel::Critical
};

type RunnerSlot = Option<(Arc<GuardConfig>, Arc<RuleRunner>)>;

pub struct Validator {
    handle: Arc<ConfigHandle>,
    runner: RwLock<RunnerSlot>
}

impl Validator {
    /// Validator over a fixed configuration
    pub fn new(config: GuardConfig) -> Result<Self, GuardError> {
        Ok(Self::with_handle(Arc::new(ConfigHandle::new(config)?)))
    }

    /// Validator following a shared, swappable configuration
    pub fn with_handle(handle: Arc<ConfigHandle>) -> Self {
        Self {
            handle,
            runner: RwLock::new(None)
        }
    }

    pub fn handle(&self) -> &Arc<ConfigHandle> {
        &self.handle
    }

    pub fn config(&self) -> Arc<GuardConfig> {
        self.handle.snapshot()
    }

    /// Checker chain for this snapshot, rebuilt when the snapshot changed
    fn runner(&self, config: &Arc<GuardConfig>) -> Arc<RuleRunner> {
        {
            let slot = self.runner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some((built_for, runner)) = slot.as_ref()
                && Arc::ptr_eq(built_for, config)
            {
                return Arc::clone(runner);
            }
        }
        let runner = Arc::new(RuleRunner::with_config(config));
        debug!(rules = runner.len(), "checker chain rebuilt");
        let mut slot = self.runner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some((Arc::clone(config), Arc::clone(&runner)));
        runner
    }

    /// Validate one call.
    ///
    /// Never fails: parse errors and checker failures are folded into the
    /// verdict according to the configuration.
    pub fn validate(&self, ctx: &SqlContext) -> ValidationResult {
        self.validate_with(&self.config(), ctx)
    }

    fn validate_with(&self, config: &Arc<GuardConfig>, ctx: &SqlContext) -> ValidationResult {
        if !config.enabled {
            return ValidationResult::pass();
        }

        if !DedupFilter::new(&config.dedup).should_check(ctx.sql()) {
            let mut result = ValidationResult::pass();
            result.insert_detail("deduplicated", true);
            return result;
        }

        let _scope = StatementScope::enter();
        let mut result = ValidationResult::pass();

        let statement = match ctx.statement_or_parse(config.dialect) {
            Ok(statement) => Some(statement),
            Err(e) => {
                warn!(
                    sql = %sql_snippet(ctx.sql(), SQL_SNIPPET_LEN),
                    error = %e,
                    mode = ?config.parse_failure,
                    "SQL could not be parsed"
                );
                result.insert_detail("parse_error", &e);
                if config.parse_failure == ParseFailureMode::FailClosed {
                    result.add_violation(
                        Violation::new(&PARSE_RULE, e.to_string())
                            .with_suggestion("Fix the SQL syntax or switch parse_failure to fail_open")
                    );
                }
                None
            }
        };

        let check_ctx =
            CheckContext::new(ctx, statement.as_deref()).with_dialect(config.dialect);
        result.extend(self.runner(config).run(&check_ctx));

        debug!(
            sql = %sql_snippet(ctx.sql(), SQL_SNIPPET_LEN),
            risk = %result.risk(),
            violations = result.violations().len(),
            "validation finished"
        );
        result
    }

    /// Validate and apply the configured violation strategy
    pub fn check(&self, ctx: &SqlContext) -> Result<ValidationResult, GuardError> {
        let config = self.config();
        let result = self.validate_with(&config, ctx);
        config.violation_strategy.apply(&result, ctx.sql())?;
        Ok(result)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::with_handle(Arc::new(ConfigHandle::default()))
    }
}
