//! Database dialects and their row-limit syntax.
//!
//! | Dialect | Row cap |
//! |---------|---------|
//! | MySQL, PostgreSQL, DM, KingbaseES, Oscar, GaussDB, openGauss | `LIMIT n` |
//! | Oracle | `SELECT * FROM (<q>) WHERE ROWNUM <= n` |
//! | SQL Server | `SELECT TOP n` |
//! | DB2 | `FETCH FIRST n ROWS ONLY` |
//! | Informix | `SELECT FIRST n` |
//!
//! New clauses are produced by parsing small template statements, so the
//! nodes spliced into a query are exactly what sqlparser itself builds.

mod factory;

use std::{borrow::Cow, fmt, str::FromStr, sync::LazyLock};

pub use factory::{
    DialectFactory, FALLBACK_DIALECT, FixedProductName, ProductNameProbe, global_factory
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::{
    ast::{BinaryOperator, Expr, Fetch, LimitClause, Query, SetExpr, Top, TopQuantity},
    dialect::GenericDialect,
    parser::Parser
};
use tracing::{debug, warn};

use crate::{
    error::GuardError,
    query::{self, LimitInfo, LimitSyntax, SqlDialect, Statement}
};

static INFORMIX_FIRST_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSELECT(\s+)FIRST(\s+)").expect("valid regex"));

/// Supported database products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseKind {
    MySql,
    PostgreSql,
    Oracle,
    SqlServer,
    Db2,
    Informix,
    Dm,
    KingbaseEs,
    Oscar,
    GaussDb,
    OpenGauss
}

/// What [`DatabaseKind::apply_limit`] did to a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LimitOutcome {
    /// No row cap existed; one was added
    Added,
    /// An existing literal cap above the maximum was lowered
    Capped { from: u64 },
    /// The query already carries a row cap
    Unchanged,
    /// The query shape is not rewritten
    Skipped { reason: String }
}

impl LimitOutcome {
    /// The SQL text changed
    pub fn is_modified(&self) -> bool {
        matches!(self, Self::Added | Self::Capped { .. })
    }
}

impl fmt::Display for LimitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "row limit added"),
            Self::Capped {
                from
            } => write!(f, "row limit capped (was {})", from),
            Self::Unchanged => write!(f, "row limit already present"),
            Self::Skipped {
                reason
            } => write!(f, "skipped: {}", reason)
        }
    }
}

impl DatabaseKind {
    pub const ALL: [Self; 11] = [
        Self::MySql,
        Self::PostgreSql,
        Self::Oracle,
        Self::SqlServer,
        Self::Db2,
        Self::Informix,
        Self::Dm,
        Self::KingbaseEs,
        Self::Oscar,
        Self::GaussDb,
        Self::OpenGauss
    ];

    /// Every supported product, in listing order
    pub fn all() -> &'static [Self] {
        &Self::ALL
    }

    /// Canonical product name
    pub fn name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::PostgreSql => "PostgreSQL",
            Self::Oracle => "Oracle",
            Self::SqlServer => "SQL Server",
            Self::Db2 => "DB2",
            Self::Informix => "Informix",
            Self::Dm => "DM",
            Self::KingbaseEs => "KingbaseES",
            Self::Oscar => "Oscar",
            Self::GaussDb => "GaussDB",
            Self::OpenGauss => "openGauss"
        }
    }

    /// Match a JDBC-style product name (`"MySQL"`, `"Microsoft SQL Server"`,
    /// `"DM DBMS"`...) by substring, first match wins
    pub fn from_product_name(product: &str) -> Option<Self> {
        let name = product.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        let has = |needle: &str| name.contains(needle);
        let kind = if has("mysql") || has("mariadb") {
            Self::MySql
        } else if has("postgresql") {
            Self::PostgreSql
        } else if has("oracle") {
            Self::Oracle
        } else if has("sql server") || has("microsoft") {
            Self::SqlServer
        } else if has("db2") {
            Self::Db2
        } else if has("informix") {
            Self::Informix
        } else if has("dm") || has("dameng") || has("达梦") {
            Self::Dm
        } else if has("kingbase") || has("金仓") {
            Self::KingbaseEs
        } else if has("oscar") || has("神通") {
            Self::Oscar
        } else if has("opengauss") {
            Self::OpenGauss
        } else if has("gaussdb") || has("gauss") {
            Self::GaussDb
        } else {
            return None;
        };
        Some(kind)
    }

    /// sqlparser dialect closest to this product
    pub fn parser_dialect(&self) -> SqlDialect {
        match self {
            Self::MySql => SqlDialect::MySQL,
            Self::PostgreSql | Self::KingbaseEs | Self::GaussDb | Self::OpenGauss => {
                SqlDialect::PostgreSQL
            }
            Self::SqlServer => SqlDialect::MsSql,
            Self::Oracle | Self::Db2 | Self::Informix | Self::Dm | Self::Oscar => {
                SqlDialect::Generic
            }
        }
    }

    /// Construct used to cap rows
    pub fn limit_syntax(&self) -> LimitSyntax {
        match self {
            Self::Oracle => LimitSyntax::RowNum,
            Self::SqlServer | Self::Informix => LimitSyntax::Top,
            Self::Db2 => LimitSyntax::Fetch,
            _ => LimitSyntax::Limit
        }
    }

    /// Rewrite vendor syntax sqlparser does not know into an equivalent it
    /// does (Informix `SELECT FIRST n` becomes `SELECT TOP n`)
    pub fn prepare_sql<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match self {
            Self::Informix => INFORMIX_FIRST_REGEX.replace_all(sql, "SELECT${1}TOP${2}"),
            _ => Cow::Borrowed(sql)
        }
    }

    /// Parse SQL written for this dialect.
    ///
    /// Vendor syntax is normalized first, see [`DatabaseKind::prepare_sql`].
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Parse`] when the SQL is empty or invalid.
    pub fn parse(&self, sql: &str) -> Result<Statement, GuardError> {
        query::parse(&self.prepare_sql(sql), self.parser_dialect())
    }

    /// Print a statement in this dialect's syntax
    pub fn render(&self, statement: &Statement) -> String {
        let rendered = statement.to_string();
        if *self != Self::Informix {
            return rendered;
        }
        let Statement::Query(query) = statement else {
            return rendered;
        };
        let Some(select) = query::outer_select(query).filter(|s| s.top.is_some()) else {
            return rendered;
        };
        let select_sql = select.to_string();
        // The outer SELECT is the last one printed before ORDER BY/LIMIT
        match rendered.rfind(&select_sql) {
            Some(pos) => {
                let mut out = rendered.clone();
                out.replace_range(
                    pos..pos + select_sql.len(),
                    &select_sql.replacen("SELECT TOP ", "SELECT FIRST ", 1)
                );
                out
            }
            None => rendered
        }
    }

    /// Ensure the query returns at most `max_rows` rows.
    ///
    /// Only a plain SELECT body reading from at least one table is touched.
    /// With `enforce`, an existing literal cap above `max_rows` is lowered.
    ///
    /// # Arguments
    ///
    /// * `query` - Query rewritten in place
    /// * `max_rows` - Row cap to add
    /// * `enforce` - Lower an existing literal cap above `max_rows`
    ///
    /// # Returns
    ///
    /// What was done; a query that already has a cap comes back
    /// [`LimitOutcome::Unchanged`] unless `enforce` lowers it
    ///
    /// # Errors
    ///
    /// Returns an error if a clause template fails to parse.
    ///
    /// # Example
    ///
    /// ```
    /// use sql_guard::{dialect::DatabaseKind, query::Statement};
    ///
    /// let dialect = DatabaseKind::SqlServer;
    /// let Statement::Query(mut query) = dialect.parse("SELECT * FROM orders").unwrap() else {
    ///     unreachable!()
    /// };
    /// let outcome = dialect.apply_limit(&mut query, 100, false).unwrap();
    ///
    /// assert!(outcome.is_modified());
    /// assert!(query.to_string().contains("TOP 100"));
    /// ```
    pub fn apply_limit(
        &self,
        query: &mut Query,
        max_rows: u64,
        enforce: bool
    ) -> Result<LimitOutcome, GuardError> {
        let Some(select) = query::outer_select(query) else {
            return Ok(skipped("query body is not a plain SELECT"));
        };
        if select.into.is_some() {
            return Ok(skipped("SELECT INTO creates a table"));
        }
        if select.from.is_empty() {
            return Ok(skipped("SELECT reads no table"));
        }

        if let Some(existing) = query::query_limit(query)
            && existing.limit.is_some()
        {
            return self.cap_existing(query, &existing, max_rows, enforce);
        }

        match self {
            Self::Oracle => {
                if !query.locks.is_empty() {
                    return Ok(skipped("FOR UPDATE query cannot be wrapped"));
                }
                let wrapped = format!("SELECT * FROM ({}) WHERE ROWNUM <= {}", query, max_rows);
                *query = template_query(&wrapped)?;
            }
            Self::SqlServer | Self::Informix => {
                if has_offset(query) {
                    // OFFSET ... ROWS cannot be combined with TOP
                    query.fetch = Some(fetch_clause(max_rows)?);
                } else if let Some(select) = query::outer_select_mut(query) {
                    select.top = Some(top_clause(max_rows)?);
                    select.top_before_distinct = *self == Self::Informix;
                }
            }
            Self::Db2 => query.fetch = Some(fetch_clause(max_rows)?),
            _ => match &mut query.limit_clause {
                Some(LimitClause::LimitOffset {
                    limit, ..
                }) => *limit = Some(literal(max_rows)?),
                _ => query.limit_clause = Some(limit_clause(max_rows)?)
            }
        }
        debug!(dialect = self.name(), max_rows, "row limit added");
        Ok(LimitOutcome::Added)
    }

    fn cap_existing(
        &self,
        query: &mut Query,
        existing: &LimitInfo,
        max_rows: u64,
        enforce: bool
    ) -> Result<LimitOutcome, GuardError> {
        let Some(current) = existing.limit_literal() else {
            return Ok(LimitOutcome::Unchanged);
        };
        if !enforce || current <= max_rows {
            return Ok(LimitOutcome::Unchanged);
        }

        let capped = match existing.syntax {
            LimitSyntax::Limit => match &mut query.limit_clause {
                Some(LimitClause::LimitOffset {
                    limit: Some(limit),
                    ..
                })
                | Some(LimitClause::OffsetCommaLimit {
                    limit, ..
                }) => {
                    *limit = literal(max_rows)?;
                    true
                }
                _ => false
            },
            LimitSyntax::Fetch => match &mut query.fetch {
                Some(fetch) => {
                    fetch.quantity = Some(literal(max_rows)?);
                    true
                }
                None => false
            },
            LimitSyntax::Top => match query::outer_select_mut(query) {
                Some(select) => match &mut select.top {
                    Some(top) => {
                        top.quantity = Some(TopQuantity::Constant(max_rows));
                        true
                    }
                    None => false
                },
                None => false
            },
            LimitSyntax::RowNum => match query::outer_select_mut(query)
                .and_then(|select| select.selection.as_mut())
            {
                Some(predicate) => cap_rownum(predicate, max_rows)?,
                None => false
            }
        };

        if !capped {
            return Ok(LimitOutcome::Unchanged);
        }
        warn!(
            dialect = self.name(),
            from = current,
            to = max_rows,
            "row limit above maximum capped"
        );
        Ok(LimitOutcome::Capped {
            from: current
        })
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    /// Canonical name (any case, spaces optional) or a product name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().replace(' ', "").eq_ignore_ascii_case(&compact))
            .or_else(|| match compact.to_ascii_lowercase().as_str() {
                "mssql" | "sqlserver" => Some(Self::SqlServer),
                "postgres" | "pg" => Some(Self::PostgreSql),
                "kingbase" => Some(Self::KingbaseEs),
                "dameng" => Some(Self::Dm),
                _ => Self::from_product_name(s)
            })
            .ok_or_else(|| format!("unknown dialect '{}'", s))
    }
}

fn skipped(reason: &str) -> LimitOutcome {
    debug!(reason, "row limit rewrite skipped");
    LimitOutcome::Skipped {
        reason: reason.to_string()
    }
}

fn has_offset(query: &Query) -> bool {
    matches!(
        query.limit_clause,
        Some(LimitClause::LimitOffset {
            offset: Some(_),
            ..
        })
    )
}

/// Lower the `ROWNUM <= n` bound in the top-level AND chain
fn cap_rownum(predicate: &mut Expr, max_rows: u64) -> Result<bool, GuardError> {
    match predicate {
        Expr::Nested(inner) => cap_rownum(inner, max_rows),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right
        } => Ok(cap_rownum(left, max_rows)? || cap_rownum(right, max_rows)?),
        Expr::BinaryOp {
            left,
            op,
            right
        } if query::is_rownum(left)
            && matches!(op, BinaryOperator::Lt | BinaryOperator::LtEq) =>
        {
            *op = BinaryOperator::LtEq;
            **right = literal(max_rows)?;
            Ok(true)
        }
        _ => Ok(false)
    }
}

fn template_query(sql: &str) -> Result<Query, GuardError> {
    match query::parse(sql, SqlDialect::Generic)? {
        Statement::Query(query) => Ok(*query),
        _ => Err(GuardError::parse(sql, "template is not a query"))
    }
}

fn literal(n: u64) -> Result<Expr, GuardError> {
    let text = n.to_string();
    Parser::new(&GenericDialect {})
        .try_with_sql(&text)
        .and_then(|mut parser| parser.parse_expr())
        .map_err(|e| GuardError::parse(&text, e.to_string()))
}

fn limit_clause(n: u64) -> Result<LimitClause, GuardError> {
    let sql = format!("SELECT 1 LIMIT {}", n);
    template_query(&sql)?
        .limit_clause
        .ok_or_else(|| GuardError::parse(&sql, "template has no LIMIT"))
}

fn top_clause(n: u64) -> Result<Top, GuardError> {
    let sql = format!("SELECT TOP {} 1", n);
    let template = template_query(&sql)?;
    match template.body.as_ref() {
        SetExpr::Select(select) => select.top.clone(),
        _ => None
    }
    .ok_or_else(|| GuardError::parse(&sql, "template has no TOP"))
}

fn fetch_clause(n: u64) -> Result<Fetch, GuardError> {
    let sql = format!("SELECT 1 FETCH FIRST {} ROWS ONLY", n);
    template_query(&sql)?
        .fetch
        .ok_or_else(|| GuardError::parse(&sql, "template has no FETCH"))
}
