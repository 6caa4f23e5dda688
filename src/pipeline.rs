//! Interceptor pipeline.
//!
//! A [`Pipeline`] runs an ordered list of [`Stage`]s around one SQL call:
//!
//! ```text
//! execute(ctx)
//!   ├─ StatementScope::enter()        parse once, publish to the call cache
//!   ├─ will_do_query / will_do_update  every stage, ascending priority; false = veto
//!   ├─ before_query / before_update    every stage, ascending priority
//!   └─ scope dropped                  call cache cleared (also on error/unwind)
//! ```
//!
//! SELECT calls take the query path; everything else takes the update path.
//! Stages with equal priority keep their insertion order.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    cache::{self, StatementScope},
    context::SqlContext,
    dedup::RequestScope,
    dialect::{DatabaseKind, DialectFactory, FALLBACK_DIALECT, ProductNameProbe},
    error::GuardError,
    query::{CommandKind, SqlDialect, Statement},
    rewriter::LimitRewriter,
    rules::ValidationResult,
    validator::Validator
};

/// Safety checks run first
pub const CHECK_PRIORITY: i32 = 10;
/// Priority of stages that do not choose one
pub const DEFAULT_PRIORITY: i32 = 50;
/// Fallback row-limit injection
pub const LIMIT_PRIORITY: i32 = 150;
/// Other SQL rewrites run last
pub const REWRITE_PRIORITY: i32 = 200;

/// State of one call as it moves through the stages
#[derive(Debug)]
pub struct PipelineCall {
    context:   SqlContext,
    statement: Option<Arc<Statement>>,
    verdict:   Option<ValidationResult>,
    rewritten: bool
}

impl PipelineCall {
    pub fn context(&self) -> &SqlContext {
        &self.context
    }

    pub fn sql(&self) -> &str {
        self.context.sql()
    }

    /// Parsed statement, `None` when the SQL could not be parsed
    pub fn statement(&self) -> Option<&Arc<Statement>> {
        self.statement.as_ref()
    }

    pub fn verdict(&self) -> Option<&ValidationResult> {
        self.verdict.as_ref()
    }

    pub fn set_verdict(&mut self, verdict: ValidationResult) {
        self.verdict = Some(verdict);
    }

    /// Whether a stage replaced the SQL
    pub fn is_rewritten(&self) -> bool {
        self.rewritten
    }

    /// Swap in new SQL for the rest of the call.
    ///
    /// A supplied statement is published to the call cache so later stages
    /// do not parse the new text again.
    pub fn replace_sql(&mut self, sql: impl Into<String>, statement: Option<Statement>) {
        let sql = sql.into();
        let statement = statement.map(Arc::new);
        if let Some(statement) = &statement {
            cache::cache_statement(&sql, Arc::clone(statement));
        }
        self.context = self.context.with_sql(sql, statement.clone());
        self.statement = statement;
        self.rewritten = true;
    }

    pub fn into_context(self) -> SqlContext {
        self.context
    }
}

/// One interceptor in the pipeline.
///
/// Every hook has a permissive default, so a stage only implements the
/// hooks it cares about.
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Return `false` to veto the query
    fn will_do_query(&self, _call: &mut PipelineCall) -> Result<bool, GuardError> {
        Ok(true)
    }

    fn before_query(&self, _call: &mut PipelineCall) -> Result<(), GuardError> {
        Ok(())
    }

    /// Return `false` to veto the update
    fn will_do_update(&self, _call: &mut PipelineCall) -> Result<bool, GuardError> {
        Ok(true)
    }

    fn before_update(&self, _call: &mut PipelineCall) -> Result<(), GuardError> {
        Ok(())
    }
}

/// How a pipeline call ended
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Execute the (possibly rewritten) SQL
    Proceed(PipelineCall),
    /// A stage refused the call
    Vetoed { stage: String }
}

impl PipelineOutcome {
    pub fn is_vetoed(&self) -> bool {
        matches!(self, Self::Vetoed { .. })
    }

    /// SQL to execute, `None` when vetoed
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Proceed(call) => Some(call.sql()),
            Self::Vetoed {
                ..
            } => None
        }
    }
}

pub struct Pipeline {
    stages:              Vec<Box<dyn Stage>>,
    dialect:             SqlDialect,
    clear_dedup_on_exit: bool
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stages:              Vec::new(),
            dialect:             SqlDialect::default(),
            clear_dedup_on_exit: false
        }
    }

    /// Check stage and fallback limit stage wired to one validator
    pub fn standard(
        validator: Arc<Validator>,
        factory: Arc<DialectFactory>,
        probe: Arc<dyn ProductNameProbe + Send + Sync>
    ) -> Result<Self, GuardError> {
        let config = validator.config();
        let default_dialect = match &config.rewrite.dialect {
            Some(name) => name.parse().map_err(GuardError::Config)?,
            None => FALLBACK_DIALECT
        };
        let mut pipeline = Self::new()
            .with_dialect(config.dialect)
            .with_stage(CheckStage::new(Arc::clone(&validator)));
        pipeline.clear_dedup_on_exit = config.dedup.clear_on_exit;
        if config.rewrite.enabled {
            let rewriter = LimitRewriter::from_config(&config.rewrite)?;
            pipeline = pipeline.with_stage(LimitStage::new(rewriter, factory, probe, default_dialect));
        }
        Ok(pipeline)
    }

    /// Parser dialect for the initial parse
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Clear the thread's dedup cache whenever a call returns
    pub fn clear_dedup_on_exit(mut self, clear: bool) -> Self {
        self.clear_dedup_on_exit = clear;
        self
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        // Stable: equal priorities keep insertion order
        self.stages.sort_by_key(|stage| stage.priority());
        self
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn execute(&self, ctx: SqlContext) -> Result<PipelineOutcome, GuardError> {
        let _dedup_scope = self.clear_dedup_on_exit.then(RequestScope::enter);
        let _scope = StatementScope::enter();

        let statement = match ctx.statement_or_parse(self.dialect) {
            Ok(statement) => Some(statement),
            Err(e) => {
                debug!(error = %e, "pipeline continues without AST");
                None
            }
        };
        let is_query = ctx.kind() == CommandKind::Select;
        let mut call = PipelineCall {
            context: ctx,
            statement,
            verdict: None,
            rewritten: false
        };

        for stage in &self.stages {
            let allowed = if is_query {
                stage.will_do_query(&mut call)?
            } else {
                stage.will_do_update(&mut call)?
            };
            if !allowed {
                info!(stage = stage.name(), "call vetoed");
                return Ok(PipelineOutcome::Vetoed {
                    stage: stage.name().to_string()
                });
            }
        }

        for stage in &self.stages {
            if is_query {
                stage.before_query(&mut call)?;
            } else {
                stage.before_update(&mut call)?;
            }
        }

        Ok(PipelineOutcome::Proceed(call))
    }
}

/// Validates the call and applies the violation strategy
pub struct CheckStage {
    validator: Arc<Validator>
}

impl CheckStage {
    pub fn new(validator: Arc<Validator>) -> Self {
        Self {
            validator
        }
    }

    /// A blocking strategy surfaces as [`GuardError::Blocked`]
    fn check(&self, call: &mut PipelineCall) -> Result<bool, GuardError> {
        let verdict = self.validator.check(call.context())?;
        call.set_verdict(verdict);
        Ok(true)
    }
}

impl Stage for CheckStage {
    fn name(&self) -> &str {
        "check"
    }

    fn priority(&self) -> i32 {
        CHECK_PRIORITY
    }

    fn will_do_query(&self, call: &mut PipelineCall) -> Result<bool, GuardError> {
        self.check(call)
    }

    fn will_do_update(&self, call: &mut PipelineCall) -> Result<bool, GuardError> {
        self.check(call)
    }
}

/// Adds a row limit to SELECTs that have none
pub struct LimitStage {
    rewriter:        LimitRewriter,
    factory:         Arc<DialectFactory>,
    probe:           Arc<dyn ProductNameProbe + Send + Sync>,
    default_dialect: DatabaseKind
}

impl LimitStage {
    pub fn new(
        rewriter: LimitRewriter,
        factory: Arc<DialectFactory>,
        probe: Arc<dyn ProductNameProbe + Send + Sync>,
        default_dialect: DatabaseKind
    ) -> Self {
        Self {
            rewriter,
            factory,
            probe,
            default_dialect
        }
    }

    fn dialect_for(&self, call: &PipelineCall) -> DatabaseKind {
        match call.context().datasource() {
            Some(datasource) => self.factory.resolve(datasource, self.probe.as_ref()),
            None => self.default_dialect
        }
    }
}

impl Stage for LimitStage {
    fn name(&self) -> &str {
        "limit"
    }

    fn priority(&self) -> i32 {
        LIMIT_PRIORITY
    }

    fn before_query(&self, call: &mut PipelineCall) -> Result<(), GuardError> {
        let Some(statement) = call.statement().cloned() else {
            return Ok(());
        };
        let dialect = self.dialect_for(call);
        let outcome = self.rewriter.rewrite(&statement, dialect)?;
        if outcome.is_modified() {
            info!(
                dialect = dialect.name(),
                outcome = %outcome.outcome,
                datasource = call.context().datasource().unwrap_or("-"),
                "row limit applied"
            );
            call.replace_sql(outcome.sql, Some(outcome.statement));
        }
        Ok(())
    }
}
