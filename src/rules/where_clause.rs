//! WHERE clause checkers and the predicate helpers the pagination checkers
//! share with them.

use compact_str::CompactString;
use indexmap::{IndexMap, IndexSet};
use sqlparser::ast::{BinaryOperator, Expr, UnaryOperator, Value};

use super::{CheckContext, RiskLevel, Rule, RuleInfo, Violation};
use crate::{
    config::{BlacklistFieldsConfig, DummyConditionConfig, WhitelistFieldsConfig},
    query::{CommandKind, bare_table_name}
};

/// SELECT/UPDATE/DELETE without WHERE reads or writes every row
pub struct NoWhereClause;

impl Rule for NoWhereClause {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD001",
            name: "Missing WHERE clause",
            risk: RiskLevel::Critical
        }
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let kind = ctx.kind();
        if !matches!(
            kind,
            CommandKind::Select | CommandKind::Update | CommandKind::Delete
        ) || ctx.where_predicate().is_some()
        {
            return vec![];
        }
        let Some(facts) = ctx.facts() else {
            return vec![];
        };
        // SELECT 1, SELECT NOW() and friends touch no table
        if facts.tables.is_empty() {
            return vec![];
        }
        let tables = facts
            .tables
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        vec![
            Violation::new(
                &self.info(),
                format!("{} without WHERE clause on table(s) '{}' affects every row", kind, tables)
            )
            .with_suggestion("Add a WHERE clause restricting the affected rows")
            .with_detail("tables", tables)
        ]
    }
}

/// Recognises conditions that are always true.
///
/// A condition is dummy when its normalized text matches a configured
/// pattern, when it compares two constants that fold to true, or when it is
/// a bare `TRUE`.
#[derive(Debug, Clone)]
pub struct DummyDetector {
    patterns: IndexSet<String>
}

impl Default for DummyDetector {
    fn default() -> Self {
        Self::new(&DummyConditionConfig::default())
    }
}

impl DummyDetector {
    pub fn new(config: &DummyConditionConfig) -> Self {
        Self {
            patterns: config
                .patterns
                .iter()
                .chain(&config.custom_patterns)
                .map(|p| normalize_condition(p))
                .filter(|p| !p.is_empty())
                .collect()
        }
    }

    /// Any leaf of the AND/OR tree is dummy
    pub fn has_dummy_leaf(&self, predicate: &Expr) -> Option<String> {
        let mut leaves = Vec::new();
        boolean_leaves(predicate, &mut leaves);
        leaves
            .into_iter()
            .find(|leaf| self.is_dummy(leaf))
            .map(|leaf| leaf.to_string())
    }

    /// The whole predicate is always true (`1=1`, `1=1 OR x=?`, `TRUE AND 2>1`)
    pub fn is_tautology(&self, predicate: &Expr) -> bool {
        match predicate {
            Expr::Nested(inner) => self.is_tautology(inner),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right
            } => self.is_tautology(left) && self.is_tautology(right),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Or,
                right
            } => self.is_tautology(left) || self.is_tautology(right),
            leaf => self.is_dummy(leaf)
        }
    }

    fn is_dummy(&self, leaf: &Expr) -> bool {
        if self.patterns.contains(&normalize_condition(&leaf.to_string())) {
            return true;
        }
        match leaf {
            Expr::Value(value) => matches!(value.value, Value::Boolean(true)),
            Expr::BinaryOp {
                left,
                op,
                right
            } => matches!(compare_constants(left, op, right), Some(true)),
            _ => false
        }
    }
}

/// Lowercase and drop all whitespace so `1 = 1` and `1=1` compare equal
fn normalize_condition(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn boolean_leaves<'e>(expr: &'e Expr, leaves: &mut Vec<&'e Expr>) {
    match expr {
        Expr::Nested(inner) => boolean_leaves(inner, leaves),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And | BinaryOperator::Or,
            right
        } => {
            boolean_leaves(left, leaves);
            boolean_leaves(right, leaves);
        }
        leaf => leaves.push(leaf)
    }
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum Constant {
    Number(f64),
    Text(String),
    Bool(bool)
}

fn fold_constant(expr: &Expr) -> Option<Constant> {
    match expr {
        Expr::Nested(inner) => fold_constant(inner),
        Expr::Value(value) => match &value.value {
            Value::Number(n, _) => n.parse().ok().map(Constant::Number),
            Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => {
                Some(Constant::Text(s.clone()))
            }
            Value::Boolean(b) => Some(Constant::Bool(*b)),
            _ => None
        },
        Expr::UnaryOp {
            op,
            expr
        } => match (op, fold_constant(expr)?) {
            (UnaryOperator::Minus, Constant::Number(n)) => Some(Constant::Number(-n)),
            (UnaryOperator::Plus, Constant::Number(n)) => Some(Constant::Number(n)),
            (UnaryOperator::Not, Constant::Bool(b)) => Some(Constant::Bool(!b)),
            _ => None
        },
        Expr::BinaryOp {
            left,
            op,
            right
        } => match (fold_constant(left)?, op, fold_constant(right)?) {
            (Constant::Number(a), BinaryOperator::Plus, Constant::Number(b)) => {
                Some(Constant::Number(a + b))
            }
            (Constant::Number(a), BinaryOperator::Minus, Constant::Number(b)) => {
                Some(Constant::Number(a - b))
            }
            (Constant::Number(a), BinaryOperator::Multiply, Constant::Number(b)) => {
                Some(Constant::Number(a * b))
            }
            _ => compare_constants(left, op, right).map(Constant::Bool)
        },
        _ => None
    }
}

/// Result of comparing two constant operands, `None` when either side is not
/// constant or the types differ
fn compare_constants(left: &Expr, op: &BinaryOperator, right: &Expr) -> Option<bool> {
    let left = fold_constant(left)?;
    let right = fold_constant(right)?;
    if std::mem::discriminant(&left) != std::mem::discriminant(&right) {
        return None;
    }
    match op {
        BinaryOperator::Eq => Some(left == right),
        BinaryOperator::NotEq => Some(left != right),
        BinaryOperator::Lt => Some(left < right),
        BinaryOperator::LtEq => Some(left <= right),
        BinaryOperator::Gt => Some(left > right),
        BinaryOperator::GtEq => Some(left >= right),
        _ => None
    }
}

/// Always-true WHERE conditions defeat the purpose of the filter
pub struct DummyCondition {
    detector: DummyDetector
}

impl DummyCondition {
    pub fn new(config: &DummyConditionConfig) -> Self {
        Self {
            detector: DummyDetector::new(config)
        }
    }
}

impl Rule for DummyCondition {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD002",
            name: "Dummy WHERE condition",
            risk: RiskLevel::High
        }
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let Some(predicate) = ctx.where_predicate() else {
            return vec![];
        };
        match self.detector.has_dummy_leaf(predicate) {
            Some(condition) => vec![
                Violation::new(
                    &self.info(),
                    format!("WHERE clause contains always-true condition '{}'", condition)
                )
                .with_suggestion("Remove the dummy condition and filter on real business fields")
                .with_detail("condition", condition)
            ],
            None => vec![]
        }
    }
}

/// Matches field names against a blacklist with `prefix*` wildcards
#[derive(Debug, Clone, Default)]
pub struct FieldBlacklist {
    exact:    IndexSet<String>,
    prefixes: Vec<String>
}

impl FieldBlacklist {
    pub fn new<S: AsRef<str>>(fields: &[S]) -> Self {
        let mut blacklist = Self::default();
        for field in fields {
            let field = field.as_ref().trim().to_lowercase();
            match field.strip_suffix('*') {
                Some(prefix) => blacklist.prefixes.push(prefix.to_string()),
                None => {
                    blacklist.exact.insert(field);
                }
            }
        }
        blacklist
    }

    pub fn contains(&self, field: &str) -> bool {
        let field = field.to_lowercase();
        self.exact.contains(&field) || self.prefixes.iter().any(|p| field.starts_with(p.as_str()))
    }

    /// Non-empty and every field is blacklisted
    pub fn covers_all(&self, fields: &IndexSet<CompactString>) -> bool {
        !fields.is_empty() && fields.iter().all(|f| self.contains(f))
    }
}

/// WHERE clauses that only filter on low-selectivity flags still scan most
/// of the table
pub struct BlacklistFields {
    blacklist: FieldBlacklist
}

impl BlacklistFields {
    pub fn new(config: &BlacklistFieldsConfig) -> Self {
        Self {
            blacklist: FieldBlacklist::new(&config.fields)
        }
    }
}

impl Rule for BlacklistFields {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD003",
            name: "Blacklisted WHERE fields only",
            risk: RiskLevel::High
        }
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let fields = ctx.where_fields();
        if !self.blacklist.covers_all(&fields) {
            return vec![];
        }
        let listed = fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ");
        vec![
            Violation::new(
                &self.info(),
                format!("WHERE clause only uses low-selectivity fields: {}", listed)
            )
            .with_suggestion("Add a selective condition such as a primary key or indexed column")
            .with_detail("fields", listed)
        ]
    }
}

/// Tables that must always be filtered by one of their designated fields
pub struct WhitelistFields {
    by_table:            IndexMap<String, Vec<String>>,
    fields:              Vec<String>,
    enforce_for_unknown: bool
}

impl WhitelistFields {
    pub fn new(config: &WhitelistFieldsConfig) -> Self {
        Self {
            by_table:            config
                .by_table
                .iter()
                .map(|(table, fields)| (bare_table_name(table), lowercase_all(fields)))
                .collect(),
            fields:              lowercase_all(&config.fields),
            enforce_for_unknown: config.enforce_for_unknown_tables
        }
    }

    fn required_for(&self, table: &str) -> Option<&[String]> {
        match self.by_table.get(&bare_table_name(table)) {
            Some(fields) => Some(fields),
            None if self.enforce_for_unknown && !self.fields.is_empty() => Some(&self.fields),
            None => None
        }
    }
}

fn lowercase_all(fields: &[String]) -> Vec<String> {
    fields.iter().map(|f| f.trim().to_lowercase()).collect()
}

impl Rule for WhitelistFields {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD004",
            name: "Required WHERE fields missing",
            risk: RiskLevel::Medium
        }
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        if ctx.where_predicate().is_none() {
            return vec![];
        }
        let Some(table) = ctx.statement().and_then(crate::query::primary_table) else {
            return vec![];
        };
        let Some(required) = self.required_for(&table) else {
            return vec![];
        };
        if required.is_empty() {
            return vec![];
        }
        let fields = ctx.where_fields();
        if required.iter().any(|r| fields.contains(r.as_str())) {
            return vec![];
        }
        let listed = required.join(", ");
        vec![
            Violation::new(
                &self.info(),
                format!(
                    "WHERE clause on table '{}' must include at least one of: {}",
                    table, listed
                )
            )
            .with_suggestion(format!("Filter on one of: {}", listed))
            .with_detail("table", &table)
            .with_detail("required", listed)
        ]
    }
}
