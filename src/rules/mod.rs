//! SQL safety rule engine.
//!
//! Each checker implements the [`Rule`] trait and inspects one call. The
//! [`RuleRunner`] holds the enabled checkers in a flat, ordered list and runs
//! every one of them against a [`CheckContext`]; violations are concatenated
//! in registration order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ SqlContext  │────▶│  RuleRunner  │────▶│ ValidationResult │
//! └─────────────┘     └──────────────┘     └──────────────────┘
//!                            │
//!                     ┌──────┴──────┐
//!                     │  Checkers   │
//!                     │ (in order)  │
//!                     └─────────────┘
//! ```
//!
//! # Rule Categories
//!
//! - **WHERE clause** (`GUARD001`-`GUARD004`) - Missing, dummy or weak filters
//! - **Pagination** (`GUARD005`-`GUARD006`) - Paging abuse and unbounded reads
//! - **Injection** (`GUARD007`-`GUARD011`) - Stacked queries, comments, file
//!   writes and dangerous functions
//! - **Command** (`GUARD012`-`GUARD013`, `GUARD016`-`GUARD017`) - DDL,
//!   procedure calls, metadata and session statements
//! - **Access** (`GUARD014`-`GUARD015`) - Denied and read-only tables
//!
//! Checkers marked as text-level ([`Rule::needs_statement`] returning
//! `false`) also run when the SQL cannot be parsed.
//!
//! # Configuration
//!
//! ```toml
//! [rules]
//! disabled = ["GUARD017"]
//!
//! [rules.severity]
//! GUARD003 = "critical"
//!
//! [rules.sql_comment]
//! allow_hint_comments = true
//! ```

mod access;
mod command;
mod injection;
mod pagination;
mod types;
mod where_clause;

use std::{
    cell::OnceCell,
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind}
};

use compact_str::CompactString;
use indexmap::IndexSet;
pub use pagination::{PaginationInfo, PaginationType, detect_pagination};
use regex::Regex;
use sqlparser::ast::Expr;
use tracing::{debug, error};
pub use types::{RiskLevel, RuleInfo, ValidationResult, Violation};
pub use where_clause::{DummyDetector, FieldBlacklist};

use crate::{
    config::{GuardConfig, Toggle},
    context::SqlContext,
    error::GuardError,
    query::{
        self, CommandKind, SqlDialect, Statement, StatementFacts,
        scan::{self, QuoteStyle, ScanResult}
    }
};

/// Trait for implementing SQL safety checkers.
///
/// Checkers are stateless with respect to calls: everything they know about
/// the current SQL comes from the [`CheckContext`]. They must be
/// `Send + Sync` so one runner can serve every thread.
pub trait Rule: Send + Sync {
    /// Returns metadata about this checker.
    fn info(&self) -> RuleInfo;

    /// Inspects one call and returns any violations found.
    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation>;

    /// Whether the checker needs a parsed statement.
    ///
    /// Checkers working on raw text return `false` and keep running when
    /// the SQL cannot be parsed.
    fn needs_statement(&self) -> bool {
        true
    }
}

/// Everything a checker may look at for one call.
///
/// Derived views (facts, lexical scan) are computed on first use and shared
/// by every checker in the chain.
pub struct CheckContext<'a> {
    sql_ctx:   &'a SqlContext,
    statement: Option<&'a Statement>,
    dialect:   SqlDialect,
    facts:     OnceCell<StatementFacts>,
    scans:     OnceCell<Vec<ScanResult<'a>>>
}

impl<'a> CheckContext<'a> {
    pub fn new(sql_ctx: &'a SqlContext, statement: Option<&'a Statement>) -> Self {
        Self {
            sql_ctx,
            statement,
            dialect: SqlDialect::default(),
            facts:   OnceCell::new(),
            scans:   OnceCell::new()
        }
    }

    /// Dialect whose quoting rules the lexical scan follows
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn sql_ctx(&self) -> &'a SqlContext {
        self.sql_ctx
    }

    pub fn sql(&self) -> &'a str {
        self.sql_ctx.sql()
    }

    /// Parsed statement, `None` when parsing failed
    pub fn statement(&self) -> Option<&'a Statement> {
        self.statement
    }

    /// Command kind, from the AST when there is one
    pub fn kind(&self) -> CommandKind {
        match self.statement {
            Some(statement) => match query::statement_kind(statement) {
                CommandKind::Unknown => self.sql_ctx.kind(),
                kind => kind
            },
            None => self.sql_ctx.kind()
        }
    }

    pub fn facts(&self) -> Option<&StatementFacts> {
        let statement = self.statement?;
        Some(self.facts.get_or_init(|| query::collect_facts(statement)))
    }

    pub fn where_predicate(&self) -> Option<&'a Expr> {
        self.statement.and_then(query::where_predicate)
    }

    pub fn where_fields(&self) -> IndexSet<CompactString> {
        self.where_predicate()
            .map(query::where_fields)
            .unwrap_or_default()
    }

    /// Quote-aware scan of the raw SQL under the dialect's primary quoting
    /// rules
    pub fn scan(&self) -> &ScanResult<'a> {
        &self.scans()[0]
    }

    /// One scan per quoting rule the dialect may apply.
    ///
    /// Checkers looking for stacked statements or comments consult every
    /// entry; a single entry is the common case.
    pub fn scans(&self) -> &[ScanResult<'a>] {
        self.scans.get_or_init(|| {
            let sql = self.sql_ctx.sql();
            QuoteStyle::for_dialect(self.dialect)
                .iter()
                .map(|style| scan::scan_with(sql, *style))
                .collect()
        })
    }

    /// Uppercase first keyword of the SQL code
    pub fn leading_keyword(&self) -> String {
        scan::leading_keyword(self.sql())
    }
}

/// Ordered checker chain.
///
/// Built once from a configuration snapshot; disabled checkers are left out
/// and risk overrides are resolved up front.
pub struct RuleRunner {
    rules:          Vec<Box<dyn Rule>>,
    risk_overrides: HashMap<&'static str, RiskLevel>,
    fail_closed:    bool
}

impl Default for RuleRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRunner {
    /// Create a new runner with all default checkers
    pub fn new() -> Self {
        Self::with_config(&GuardConfig::default())
    }

    /// Create a new runner with configuration
    pub fn with_config(config: &GuardConfig) -> Self {
        let rules_config = &config.rules;

        let mut rules: Vec<Box<dyn Rule>> = Vec::new();
        let mut risk_overrides = HashMap::new();
        for (rule, toggle) in registry(config) {
            let rule_id = rule.info().id;
            if !toggle.enabled || rules_config.is_disabled(rule_id) {
                debug!(rule_id, "checker disabled");
                continue;
            }
            if let Some(risk) = toggle
                .risk
                .or_else(|| rules_config.severity_override(rule_id))
            {
                risk_overrides.insert(rule_id, risk);
            }
            rules.push(rule);
        }

        Self {
            rules,
            risk_overrides,
            fail_closed: config.fail_closed_on_checker_error
        }
    }

    /// Metadata of every checker known to the engine, in registration order
    pub fn catalog() -> Vec<RuleInfo> {
        registry(&GuardConfig::default())
            .into_iter()
            .map(|(rule, _)| rule.info())
            .collect()
    }

    /// Metadata of the enabled checkers, risk overrides applied
    pub fn rules(&self) -> impl Iterator<Item = RuleInfo> + '_ {
        self.rules.iter().map(|rule| {
            let mut info = rule.info();
            if let Some(&risk) = self.risk_overrides.get(info.id) {
                info.risk = risk;
            }
            info
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every checker and collect their violations in order
    pub fn run(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            if ctx.statement().is_none() && rule.needs_statement() {
                continue;
            }
            let info = rule.info();
            match catch_unwind(AssertUnwindSafe(|| rule.check(ctx))) {
                Ok(found) => {
                    for mut violation in found {
                        if let Some(&risk) = self.risk_overrides.get(info.id) {
                            violation.risk = risk;
                        }
                        debug!(rule_id = info.id, risk = %violation.risk, "violation");
                        violations.push(violation);
                    }
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    let failure = GuardError::CheckerFailure {
                        rule_id: info.id,
                        message
                    };
                    error!(rule_id = info.id, error = %failure, "checker failed");
                    if self.fail_closed {
                        violations.push(
                            Violation::new(&info, failure.to_string())
                                .with_risk(RiskLevel::Critical)
                        );
                    }
                }
            }
        }
        violations
    }
}

/// Every checker in registration order, paired with its toggle
fn registry(config: &GuardConfig) -> Vec<(Box<dyn Rule>, Toggle)> {
    let rules = &config.rules;
    vec![
        // WHERE clause checkers
        entry(where_clause::NoWhereClause, rules.no_where_clause),
        entry(
            where_clause::DummyCondition::new(&rules.dummy_condition),
            rules.dummy_condition.toggle
        ),
        entry(
            where_clause::BlacklistFields::new(&rules.blacklist_fields),
            rules.blacklist_fields.toggle
        ),
        entry(
            where_clause::WhitelistFields::new(&rules.whitelist_fields),
            rules.whitelist_fields.toggle
        ),
        // Pagination checkers
        entry(pagination::PaginationAbuse::new(config), rules.pagination_abuse),
        entry(pagination::NoPagination::new(config), rules.no_pagination.toggle),
        // Injection checkers
        entry(injection::MultiStatement, rules.multi_statement),
        entry(
            injection::SetOperation::new(&rules.set_operation),
            rules.set_operation.toggle
        ),
        entry(
            injection::SqlComment::new(&rules.sql_comment),
            rules.sql_comment.toggle
        ),
        entry(injection::IntoOutfile, rules.into_outfile),
        entry(
            injection::DangerousFunction::new(&rules.dangerous_function),
            rules.dangerous_function.toggle
        ),
        // Command and access checkers
        entry(
            command::DdlOperation::new(&rules.ddl_operation),
            rules.ddl_operation.toggle
        ),
        entry(command::CallStatement, rules.call_statement),
        entry(
            access::DeniedTable::new(&rules.denied_table),
            rules.denied_table.toggle
        ),
        entry(
            access::ReadOnlyTable::new(&rules.read_only_table),
            rules.read_only_table.toggle
        ),
        entry(
            command::MetadataStatement::new(&rules.metadata_statement),
            rules.metadata_statement.toggle
        ),
        entry(command::SetStatement, rules.set_statement)
    ]
}

fn entry(rule: impl Rule + 'static, toggle: Toggle) -> (Box<dyn Rule>, Toggle) {
    (Box::new(rule), toggle)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("checker panicked")
    }
}

/// Compile a name glob into an anchored, case-insensitive regex.
///
/// `star` is the regex fragment a `*` expands to.
pub(crate) fn glob_regex(pattern: &str, star: &str) -> Option<Regex> {
    let body = pattern
        .trim()
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(star);
    match Regex::new(&format!("(?i)^{}$", body)) {
        Ok(regex) => Some(regex),
        Err(e) => {
            error!(pattern, error = %e, "invalid name pattern ignored");
            None
        }
    }
}

/// Upper-case, underscore-joined form used to compare keyword lists
pub(crate) fn normalize_keyword(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_ascii_uppercase()
}
