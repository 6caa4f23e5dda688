//! SQL parsing facade.
//!
//! Parses SQL text into a sqlparser [`Statement`] and exposes the typed views
//! the checker chain and the rewriter need: statement kind, primary table,
//! WHERE predicate, LIMIT/TOP/FETCH/ROWNUM row caps and ORDER BY presence.
//!
//! ```text
//! sql ──▶ parse() ──▶ Statement ──┬──▶ statement_kind()
//!                                 ├──▶ primary_table() / collect_facts()
//!                                 ├──▶ where_predicate() ──▶ where_fields()
//!                                 ├──▶ limit_clause()
//!                                 └──▶ has_order_by()
//! ```
//!
//! Every call parses into a fresh AST; nothing returned earlier is touched by
//! a later call.

mod extract;
pub mod scan;
mod types;

use compact_str::CompactString;
use extract::{ExtractionContext, extract_columns_from_expr, extract_from_statement};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
pub use sqlparser::ast::Statement;
use sqlparser::{
    ast::{Expr, Query, Select, SetExpr},
    dialect::{Dialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect},
    parser::Parser
};
use tracing::warn;
pub use types::{CommandKind, LimitInfo, LimitSyntax, LimitValue};

use crate::error::{GuardError, SQL_SNIPPET_LEN, sql_snippet};

/// SQL dialect used for parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum SqlDialect {
    #[default]
    Generic,
    MySQL,
    PostgreSQL,
    MsSql
}

impl SqlDialect {
    /// Convert to sqlparser dialect for parsing
    pub fn into_parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::MySQL => Box::new(MySqlDialect {}),
            Self::PostgreSQL => Box::new(PostgreSqlDialect {}),
            Self::MsSql => Box::new(MsSqlDialect {})
        }
    }
}

/// Tables, functions and set operators referenced anywhere in a statement,
/// subqueries included
#[derive(Debug, Clone, Default)]
pub struct StatementFacts {
    pub tables:         IndexSet<CompactString>,
    pub functions:      IndexSet<CompactString>,
    pub set_operations: Vec<CompactString>
}

/// Parse SQL text into a single statement.
///
/// When the text holds several statements the first one is returned; stacked
/// statements are a checker concern, not a parse failure.
///
/// # Errors
///
/// Returns [`GuardError::Parse`] for empty text or SQL the dialect rejects.
///
/// # Example
///
/// ```
/// use sql_guard::query::{SqlDialect, parse};
///
/// assert!(parse("SELECT * FROM t; DROP TABLE t", SqlDialect::Generic).is_ok());
/// assert!(parse("SELEC * FORM t", SqlDialect::Generic).is_err());
/// ```
pub fn parse(sql: &str, dialect: SqlDialect) -> Result<Statement, GuardError> {
    if sql.trim().is_empty() {
        return Err(GuardError::parse(sql, "SQL text is empty"));
    }
    let parser_dialect = dialect.into_parser_dialect();
    let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)
        .map_err(|e| GuardError::parse(sql, e.to_string()))?;
    statements
        .into_iter()
        .next()
        .ok_or_else(|| GuardError::parse(sql, "no statement found"))
}

/// Parse, logging and discarding the error
pub fn parse_lenient(sql: &str, dialect: SqlDialect) -> Option<Statement> {
    match parse(sql, dialect) {
        Ok(statement) => Some(statement),
        Err(e) => {
            warn!(sql = %sql_snippet(sql, SQL_SNIPPET_LEN), error = %e, "lenient parse failed");
            None
        }
    }
}

/// Map a parsed statement to the command kind the checkers dispatch on.
///
/// # Arguments
///
/// * `statement` - Parsed statement
///
/// # Returns
///
/// `CommandKind::Unknown` for anything that is not SELECT, INSERT, UPDATE or
/// DELETE
///
/// # Example
///
/// ```
/// use sql_guard::query::{CommandKind, SqlDialect, parse, statement_kind};
///
/// let statement = parse("UPDATE t SET a = 1 WHERE id = 2", SqlDialect::Generic).unwrap();
/// assert_eq!(statement_kind(&statement), CommandKind::Update);
/// ```
pub fn statement_kind(statement: &Statement) -> CommandKind {
    match statement {
        Statement::Query(_) => CommandKind::Select,
        Statement::Insert(_) => CommandKind::Insert,
        Statement::Update(_) => CommandKind::Update,
        Statement::Delete(_) => CommandKind::Delete,
        _ => CommandKind::Unknown
    }
}

/// First table the statement reads or writes, delimiters removed
pub fn primary_table(statement: &Statement) -> Option<String> {
    match statement {
        Statement::Query(query) => leftmost_select(query)
            .and_then(|select| select.from.first())
            .and_then(|table| relation_name(&table.relation)),
        Statement::Insert(insert) => Some(normalize_table_name(&insert.table.to_string())),
        Statement::Update(update) => relation_name(&update.table.relation),
        Statement::Delete(delete) => match &delete.from {
            sqlparser::ast::FromTable::WithFromKeyword(tables)
            | sqlparser::ast::FromTable::WithoutKeyword(tables) => tables
                .first()
                .and_then(|table| relation_name(&table.relation))
        },
        _ => None
    }
}

/// Tables, functions and set operators referenced anywhere in a statement.
///
/// Descends into every expression, join condition, CTE and subquery, so a
/// call wrapped in `SUBSTRING(...)` or a table read inside a scalar subquery
/// is reported like a top-level one. Statements other than SELECT, INSERT,
/// UPDATE and DELETE yield empty facts.
///
/// # Example
///
/// ```
/// use sql_guard::query::{SqlDialect, collect_facts, parse};
///
/// let sql = "SELECT TRIM(LOAD_FILE('/etc/hosts')) FROM a JOIN b ON a.id = b.id";
/// let facts = collect_facts(&parse(sql, SqlDialect::MySQL).unwrap());
///
/// assert!(facts.functions.contains("load_file"));
/// assert!(facts.tables.contains("b"));
/// ```
pub fn collect_facts(statement: &Statement) -> StatementFacts {
    let mut facts = StatementFacts::default();
    let mut ctx = ExtractionContext {
        tables:         &mut facts.tables,
        functions:      &mut facts.functions,
        set_operations: &mut facts.set_operations
    };
    extract_from_statement(statement, &mut ctx);
    facts
}

/// WHERE predicate of SELECT/UPDATE/DELETE.
///
/// For set operations this is the predicate of the leftmost SELECT.
pub fn where_predicate(statement: &Statement) -> Option<&Expr> {
    match statement {
        Statement::Query(query) => leftmost_select(query).and_then(|s| s.selection.as_ref()),
        Statement::Update(update) => update.selection.as_ref(),
        Statement::Delete(delete) => delete.selection.as_ref(),
        _ => None
    }
}

/// Lowercase column names referenced by a predicate.
///
/// Every operand is followed: function arguments, `EXTRACT`, `SUBSTRING`,
/// tuples, `CASE` and the rest. Columns that only appear inside a subquery
/// belong to that subquery and are left out.
///
/// # Example
///
/// ```
/// use sql_guard::query::{SqlDialect, parse, where_fields, where_predicate};
///
/// let sql = "DELETE FROM orders WHERE deleted = 0 AND EXTRACT(YEAR FROM created_at) = 2020";
/// let statement = parse(sql, SqlDialect::Generic).unwrap();
/// let fields = where_fields(where_predicate(&statement).unwrap());
///
/// assert!(fields.contains("deleted"));
/// assert!(fields.contains("created_at"));
/// ```
pub fn where_fields(predicate: &Expr) -> IndexSet<CompactString> {
    let mut fields = IndexSet::new();
    extract_columns_from_expr(predicate, &mut fields);
    fields
}

/// Row cap of a SELECT, whichever syntax expresses it
pub fn limit_clause(statement: &Statement) -> Option<LimitInfo> {
    match statement {
        Statement::Query(query) => query_limit(query),
        _ => None
    }
}

/// Row cap of a query.
///
/// Checked in order: `LIMIT`, `FETCH FIRST`, `TOP` on the outer SELECT, then
/// a `ROWNUM` bound in its WHERE clause. The offset is taken from the
/// `LIMIT`/`OFFSET` clause whichever syntax carries the limit.
///
/// # Returns
///
/// `None` when the query has no row cap at all
pub fn query_limit(query: &Query) -> Option<LimitInfo> {
    use sqlparser::ast::LimitClause;

    let offset = match &query.limit_clause {
        Some(LimitClause::LimitOffset {
            offset: Some(offset),
            ..
        }) => Some(limit_value(&offset.value)),
        Some(LimitClause::OffsetCommaLimit {
            offset, ..
        }) => Some(limit_value(offset)),
        _ => None
    };

    if let Some(clause) = &query.limit_clause {
        let limit = match clause {
            LimitClause::LimitOffset {
                limit, ..
            } => limit.as_ref().map(limit_value),
            LimitClause::OffsetCommaLimit {
                limit, ..
            } => Some(limit_value(limit))
        };
        if limit.is_some() {
            return Some(LimitInfo {
                syntax: LimitSyntax::Limit,
                limit,
                offset
            });
        }
    }

    if let Some(fetch) = &query.fetch {
        return Some(LimitInfo {
            syntax: LimitSyntax::Fetch,
            limit: fetch.quantity.as_ref().map(limit_value),
            offset
        });
    }

    let select = outer_select(query)?;
    if let Some(top) = &select.top {
        let limit = match &top.quantity {
            Some(sqlparser::ast::TopQuantity::Constant(n)) => Some(LimitValue::Literal(*n)),
            Some(sqlparser::ast::TopQuantity::Expr(expr)) => Some(limit_value(expr)),
            None => None
        };
        return Some(LimitInfo {
            syntax: LimitSyntax::Top,
            limit,
            offset
        });
    }
    let rownum = select.selection.as_ref().and_then(rownum_limit)?;
    Some(LimitInfo {
        syntax: LimitSyntax::RowNum,
        limit: Some(rownum),
        offset
    })
}

/// ORDER BY on the query, or on the single derived table it wraps
pub fn has_order_by(statement: &Statement) -> bool {
    match statement {
        Statement::Query(query) => query_has_order_by(query),
        _ => false
    }
}

fn query_has_order_by(query: &Query) -> bool {
    if query.order_by.is_some() {
        return true;
    }
    match query.body.as_ref() {
        SetExpr::Query(inner) => query_has_order_by(inner),
        SetExpr::Select(select) if select.from.len() == 1 => match &select.from[0].relation {
            sqlparser::ast::TableFactor::Derived {
                subquery, ..
            } => query_has_order_by(subquery),
            _ => false
        },
        _ => false
    }
}

/// The plain SELECT a query body consists of, if it is one
pub fn outer_select(query: &Query) -> Option<&Select> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Some(&**select),
        _ => None
    }
}

/// Mutable counterpart of [`outer_select`], used when injecting a row cap
pub fn outer_select_mut(query: &mut Query) -> Option<&mut Select> {
    match query.body.as_mut() {
        SetExpr::Select(select) => Some(&mut **select),
        _ => None
    }
}

fn leftmost_select(query: &Query) -> Option<&Select> {
    leftmost_select_of(&query.body)
}

fn leftmost_select_of(set_expr: &SetExpr) -> Option<&Select> {
    match set_expr {
        SetExpr::Select(select) => Some(&**select),
        SetExpr::SetOperation {
            left, ..
        } => leftmost_select_of(left),
        SetExpr::Query(query) => leftmost_select(query),
        _ => None
    }
}

fn relation_name(factor: &sqlparser::ast::TableFactor) -> Option<String> {
    match factor {
        sqlparser::ast::TableFactor::Table {
            name, ..
        } => Some(normalize_table_name(&name.to_string())),
        _ => None
    }
}

/// Find `ROWNUM <= n` (or `<`, `=`) in the top-level AND chain
pub fn rownum_limit(predicate: &Expr) -> Option<LimitValue> {
    use sqlparser::ast::BinaryOperator;

    match predicate {
        Expr::Nested(inner) => rownum_limit(inner),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right
        } => rownum_limit(left).or_else(|| rownum_limit(right)),
        Expr::BinaryOp {
            left,
            op,
            right
        } if is_rownum(left) => {
            let value = limit_value(right);
            match (op, value) {
                (BinaryOperator::Lt, LimitValue::Literal(n)) => {
                    Some(LimitValue::Literal(n.saturating_sub(1)))
                }
                (BinaryOperator::Lt | BinaryOperator::LtEq | BinaryOperator::Eq, value) => {
                    Some(value)
                }
                _ => None
            }
        }
        _ => None
    }
}

/// Bare `ROWNUM` pseudo-column, any case
pub fn is_rownum(expr: &Expr) -> bool {
    matches!(expr, Expr::Identifier(ident) if ident.value.eq_ignore_ascii_case("rownum"))
}

/// Classify a row-count expression.
///
/// # Returns
///
/// * `Literal` for an integer that fits `u64`
/// * `Placeholder` for `?`, `$1`, `:name` and similar bind markers
/// * `Expression` with the SQL text for anything else
///
/// # Example
///
/// ```
/// use sql_guard::query::{LimitValue, limit_value};
/// use sqlparser::ast::{Expr, Value};
///
/// let expr = Expr::value(Value::Number("50".into(), false));
/// assert_eq!(limit_value(&expr), LimitValue::Literal(50));
/// ```
pub fn limit_value(expr: &Expr) -> LimitValue {
    match expr {
        Expr::Value(val) => match &val.value {
            sqlparser::ast::Value::Number(n, _) => n
                .parse()
                .map(LimitValue::Literal)
                .unwrap_or_else(|_| LimitValue::Expression(n.clone())),
            sqlparser::ast::Value::Placeholder(p) => LimitValue::Placeholder(p.clone()),
            other => LimitValue::Expression(other.to_string())
        },
        Expr::Nested(inner) => limit_value(inner),
        other => LimitValue::Expression(other.to_string())
    }
}

/// Strip identifier delimiters from every part of a (possibly qualified) name
pub fn normalize_table_name(raw: &str) -> String {
    raw.split('.')
        .map(|part| part.trim().trim_matches(|c| matches!(c, '`' | '"' | '[' | ']')))
        .collect::<Vec<_>>()
        .join(".")
}

/// Lowercase table name without schema prefix or delimiters
pub fn bare_table_name(raw: &str) -> String {
    let normalized = normalize_table_name(raw);
    normalized
        .rsplit('.')
        .next()
        .unwrap_or(normalized.as_str())
        .to_lowercase()
}
