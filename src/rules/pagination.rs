//! Pagination checkers.
//!
//! A SELECT is paged either physically (the SQL itself carries a row cap) or
//! logically (the caller passes offset/limit and rows are skipped in memory
//! after the full result set has been fetched).

use regex::Regex;
use serde::Serialize;
use sqlparser::ast::{BinaryOperator, Expr, Value};

use super::{
    CheckContext, RiskLevel, Rule, RuleInfo, Violation, glob_regex,
    where_clause::{DummyDetector, FieldBlacklist}
};
use crate::{
    config::{GuardConfig, PaginationConfig},
    context::SqlContext,
    query::{self, CommandKind, LimitValue, Statement, bare_table_name}
};

/// How a SELECT is paged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaginationType {
    #[default]
    None,
    /// Caller paging with no SQL row cap: rows are skipped in memory
    Logical,
    /// Row cap in the SQL (LIMIT, TOP, FETCH, ROWNUM)
    Physical
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaginationInfo {
    pub kind:          PaginationType,
    pub limit:         Option<u64>,
    pub offset:        Option<u64>,
    /// Limit is a bind parameter rather than a literal
    pub dynamic_limit: bool
}

/// Classify the pagination of a call.
///
/// A row cap in the SQL wins; otherwise a caller hint is physical when a
/// pagination plugin will turn it into SQL, logical when it will not.
pub fn detect_pagination(
    statement: Option<&Statement>,
    ctx: &SqlContext,
    physical_plugin: bool
) -> PaginationInfo {
    if let Some(info) = statement.and_then(query::limit_clause)
        && let Some(limit) = &info.limit
    {
        return PaginationInfo {
            kind:          PaginationType::Physical,
            limit:         resolve(limit, ctx),
            offset:        info.offset.as_ref().and_then(|offset| resolve(offset, ctx)),
            dynamic_limit: limit.is_dynamic()
        };
    }
    match ctx.pagination() {
        Some(hint) => PaginationInfo {
            kind:          if physical_plugin {
                PaginationType::Physical
            } else {
                PaginationType::Logical
            },
            limit:         Some(hint.limit),
            offset:        Some(hint.offset),
            dynamic_limit: false
        },
        None => PaginationInfo::default()
    }
}

/// Literal value, or the bound parameter a placeholder refers to
fn resolve(value: &LimitValue, ctx: &SqlContext) -> Option<u64> {
    match value {
        LimitValue::Literal(n) => Some(*n),
        LimitValue::Placeholder(name) => {
            let bound = ctx.param(name)?;
            bound
                .as_u64()
                .or_else(|| bound.as_str().and_then(|s| s.trim().parse().ok()))
        }
        LimitValue::Expression(_) => None
    }
}

/// Paging that loads or scans far more than it returns
pub struct PaginationAbuse {
    pagination: PaginationConfig,
    detector:   DummyDetector
}

impl PaginationAbuse {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            pagination: config.pagination.clone(),
            detector:   DummyDetector::new(&config.rules.dummy_condition)
        }
    }

    fn physical(&self, ctx: &CheckContext<'_>, info: &PaginationInfo) -> Vec<Violation> {
        let rule = self.info();

        if ctx.facts().is_some_and(|facts| facts.tables.is_empty()) {
            return vec![];
        }
        let unfiltered = match ctx.where_predicate() {
            None => true,
            Some(predicate) => self.detector.is_tautology(predicate)
        };
        if unfiltered {
            return vec![
                Violation::new(
                    &rule,
                    "Physical pagination without an effective WHERE clause still scans the whole table"
                )
                .with_suggestion("Add a selective WHERE condition to the paged query")
            ];
        }

        let mut violations = Vec::new();
        if let Some(offset) = info.offset
            && offset > self.pagination.max_offset
        {
            violations.push(
                Violation::new(
                    &rule,
                    format!(
                        "Deep pagination offset {} exceeds maximum {}",
                        offset, self.pagination.max_offset
                    )
                )
                .with_risk(RiskLevel::Medium)
                .with_suggestion(
                    "Use cursor pagination (WHERE id > last_id ORDER BY id LIMIT n) instead of a large OFFSET"
                )
                .with_detail("offset", offset)
            );
        }
        if let Some(limit) = info.limit
            && limit > self.pagination.max_page_size
        {
            violations.push(
                Violation::new(
                    &rule,
                    format!(
                        "Page size {} exceeds maximum {}",
                        limit, self.pagination.max_page_size
                    )
                )
                .with_risk(RiskLevel::Medium)
                .with_suggestion(format!(
                    "Request at most {} rows per page",
                    self.pagination.max_page_size
                ))
                .with_detail("limit", limit)
            );
        }
        if let Some(statement) = ctx.statement()
            && !query::has_order_by(statement)
        {
            violations.push(
                Violation::new(&rule, "Pagination without ORDER BY returns unstable pages")
                    .with_risk(RiskLevel::Low)
                    .with_suggestion("Add an ORDER BY on a unique column")
            );
        }
        violations
    }
}

impl Rule for PaginationAbuse {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD005",
            name: "Pagination abuse",
            risk: RiskLevel::Critical
        }
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        if ctx.kind() != CommandKind::Select {
            return vec![];
        }
        let info = detect_pagination(
            ctx.statement(),
            ctx.sql_ctx(),
            self.pagination.physical_pagination_plugin
        );
        match info.kind {
            PaginationType::None => vec![],
            PaginationType::Logical => {
                let mut violation = Violation::new(
                    &self.info(),
                    "Logical pagination loads the full table into memory before paging"
                )
                .with_suggestion("Enable a physical pagination plugin or add LIMIT to the SQL");
                if let Some(offset) = info.offset {
                    violation = violation.with_detail("offset", offset);
                }
                if let Some(limit) = info.limit {
                    violation = violation.with_detail("limit", limit);
                }
                vec![violation]
            }
            PaginationType::Physical => self.physical(ctx, &info)
        }
    }
}

/// SELECT with no pagination at all
pub struct NoPagination {
    physical_plugin: bool,
    caller_globs:    Vec<Regex>,
    table_globs:     Vec<Regex>,
    unique_keys:     Vec<String>,
    enforce_for_all: bool,
    detector:        DummyDetector,
    blacklist:       FieldBlacklist
}

impl NoPagination {
    pub fn new(config: &GuardConfig) -> Self {
        let no_pagination = &config.rules.no_pagination;
        let mut unique_keys = vec![String::from("id")];
        unique_keys.extend(
            no_pagination
                .unique_key_fields
                .iter()
                .map(|f| f.trim().to_lowercase())
        );
        Self {
            physical_plugin: config.pagination.physical_pagination_plugin,
            caller_globs:    no_pagination
                .whitelist_mapper_ids
                .iter()
                .filter_map(|p| glob_regex(p, ".*"))
                .collect(),
            table_globs:     no_pagination
                .whitelist_tables
                .iter()
                .filter_map(|p| glob_regex(p, ".*"))
                .collect(),
            unique_keys,
            enforce_for_all: no_pagination.enforce_for_all_queries,
            detector:        DummyDetector::new(&config.rules.dummy_condition),
            blacklist:       FieldBlacklist::new(&config.rules.blacklist_fields.fields)
        }
    }

    fn exempt(&self, ctx: &CheckContext<'_>) -> bool {
        if let Some(caller) = ctx.sql_ctx().caller_id()
            && self.caller_globs.iter().any(|glob| glob.is_match(caller))
        {
            return true;
        }
        if let Some(table) = ctx.statement().and_then(query::primary_table) {
            let table = bare_table_name(&table);
            if self.table_globs.iter().any(|glob| glob.is_match(&table)) {
                return true;
            }
        }
        ctx.where_predicate()
            .is_some_and(|predicate| self.has_unique_key_equality(predicate))
    }

    /// `key = <constant or parameter>` somewhere in the top-level AND chain
    fn has_unique_key_equality(&self, predicate: &Expr) -> bool {
        match predicate {
            Expr::Nested(inner) => self.has_unique_key_equality(inner),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right
            } => self.has_unique_key_equality(left) || self.has_unique_key_equality(right),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right
            } => {
                (self.is_unique_key(left) && is_bound_value(right))
                    || (self.is_unique_key(right) && is_bound_value(left))
            }
            _ => false
        }
    }

    fn is_unique_key(&self, expr: &Expr) -> bool {
        let column = match expr {
            Expr::Identifier(ident) => &ident.value,
            Expr::CompoundIdentifier(idents) => match idents.last() {
                Some(ident) => &ident.value,
                None => return false
            },
            _ => return false
        };
        let column = column.to_lowercase();
        self.unique_keys.iter().any(|key| *key == column)
    }
}

fn is_bound_value(expr: &Expr) -> bool {
    match expr {
        Expr::Nested(inner) => is_bound_value(inner),
        Expr::Value(value) => matches!(
            value.value,
            Value::Number(..)
                | Value::SingleQuotedString(_)
                | Value::DoubleQuotedString(_)
                | Value::Placeholder(_)
        ),
        _ => false
    }
}

impl Rule for NoPagination {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD006",
            name: "Missing pagination",
            risk: RiskLevel::Critical
        }
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        if ctx.kind() != CommandKind::Select {
            return vec![];
        }
        let info = detect_pagination(ctx.statement(), ctx.sql_ctx(), self.physical_plugin);
        if info.kind != PaginationType::None {
            return vec![];
        }
        if ctx.facts().is_none_or(|facts| facts.tables.is_empty()) {
            return vec![];
        }
        if self.exempt(ctx) {
            return vec![];
        }

        let rule = self.info();
        let predicate = ctx.where_predicate();
        if predicate.is_none_or(|p| self.detector.is_tautology(p)) {
            return vec![
                Violation::new(
                    &rule,
                    "SELECT without pagination or effective WHERE clause returns the entire table"
                )
                .with_suggestion("Add a LIMIT or a selective WHERE condition")
            ];
        }

        let fields = ctx.where_fields();
        if self.blacklist.covers_all(&fields) {
            let listed = fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ");
            return vec![
                Violation::new(
                    &rule,
                    format!(
                        "SELECT without pagination filters only on low-selectivity fields: {}",
                        listed
                    )
                )
                .with_risk(RiskLevel::High)
                .with_suggestion("Add a LIMIT or filter on a selective column")
                .with_detail("fields", listed)
            ];
        }

        if self.enforce_for_all {
            return vec![
                Violation::new(&rule, "SELECT without pagination")
                    .with_risk(RiskLevel::Medium)
                    .with_suggestion("Add a LIMIT to bound the result set")
            ];
        }
        vec![]
    }
}
