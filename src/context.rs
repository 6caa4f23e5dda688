//! Inbound call context.
//!
//! A [`SqlContext`] is created per validation attempt and dropped when the
//! pipeline returns. It owns the SQL text and, once parsed, the statement
//! AST; the AST slot is filled at most once.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::{
    cache,
    error::GuardError,
    query::{CommandKind, SqlDialect, Statement, statement_kind}
};

/// Offset/limit supplied by the caller's own paging mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationHint {
    pub offset: u64,
    pub limit:  u64
}

impl PaginationHint {
    /// "No paging" marker some frameworks pass instead of nothing
    pub const UNBOUNDED: Self = Self {
        offset: 0,
        limit:  u64::MAX
    };

    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Self::UNBOUNDED
    }
}

#[derive(Debug, Clone)]
pub struct SqlContext {
    sql:             String,
    kind:            CommandKind,
    caller_id:       Option<String>,
    params:          IndexMap<String, Value>,
    pagination:      Option<PaginationHint>,
    datasource:      Option<String>,
    execution_layer: Option<String>,
    statement:       OnceLock<Arc<Statement>>
}

impl SqlContext {
    pub fn builder(sql: impl Into<String>) -> SqlContextBuilder {
        SqlContextBuilder::new(sql)
    }

    /// Context with only SQL text, kind inferred from its prefix
    pub fn new(sql: impl Into<String>) -> Result<Self, GuardError> {
        Self::builder(sql).build()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn caller_id(&self) -> Option<&str> {
        self.caller_id.as_deref()
    }

    pub fn params(&self) -> &IndexMap<String, Value> {
        &self.params
    }

    /// Look up a bound parameter by placeholder, tolerating `:name`, `$1`,
    /// `@name` and `#{name}` spellings
    pub fn param(&self, placeholder: &str) -> Option<&Value> {
        if let Some(value) = self.params.get(placeholder) {
            return Some(value);
        }
        let name = placeholder
            .trim_start_matches(['#', ':', '$', '@', '?'])
            .trim_start_matches('{')
            .trim_end_matches('}');
        self.params.get(name)
    }

    /// Caller pagination, ignoring the unbounded marker
    pub fn pagination(&self) -> Option<PaginationHint> {
        self.pagination.filter(|hint| !hint.is_unbounded())
    }

    pub fn datasource(&self) -> Option<&str> {
        self.datasource.as_deref()
    }

    pub fn execution_layer(&self) -> Option<&str> {
        self.execution_layer.as_deref()
    }

    /// Parsed statement, if one has been attached
    pub fn statement(&self) -> Option<&Arc<Statement>> {
        self.statement.get()
    }

    /// Parsed statement, parsing through the thread-local statement cache on
    /// first access
    pub fn statement_or_parse(&self, dialect: SqlDialect) -> Result<Arc<Statement>, GuardError> {
        if let Some(statement) = self.statement.get() {
            return Ok(Arc::clone(statement));
        }
        let parsed = cache::get_or_parse(&self.sql, dialect)?;
        Ok(Arc::clone(self.statement.get_or_init(|| parsed)))
    }

    /// Copy of this context carrying different SQL (e.g. after a rewrite)
    pub fn with_sql(&self, sql: impl Into<String>, statement: Option<Arc<Statement>>) -> Self {
        let slot = OnceLock::new();
        if let Some(statement) = statement {
            let _ = slot.set(statement);
        }
        Self {
            sql: sql.into(),
            statement: slot,
            ..self.clone()
        }
    }
}

pub struct SqlContextBuilder {
    sql:             String,
    kind:            Option<CommandKind>,
    caller_id:       Option<String>,
    params:          IndexMap<String, Value>,
    pagination:      Option<PaginationHint>,
    datasource:      Option<String>,
    execution_layer: Option<String>,
    statement:       Option<Arc<Statement>>
}

impl SqlContextBuilder {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql:             sql.into(),
            kind:            None,
            caller_id:       None,
            params:          IndexMap::new(),
            pagination:      None,
            datasource:      None,
            execution_layer: None,
            statement:       None
        }
    }

    pub fn kind(mut self, kind: CommandKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Caller identifier, usually `namespace.method`
    pub fn caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: IndexMap<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn pagination(mut self, offset: u64, limit: u64) -> Self {
        self.pagination = Some(PaginationHint::new(offset, limit));
        self
    }

    pub fn datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }

    pub fn execution_layer(mut self, layer: impl Into<String>) -> Self {
        self.execution_layer = Some(layer.into());
        self
    }

    /// Attach an already parsed statement
    pub fn statement(mut self, statement: impl Into<Arc<Statement>>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    pub fn build(self) -> Result<SqlContext, GuardError> {
        if self.sql.trim().is_empty() {
            return Err(GuardError::Context("SQL text must not be empty".into()));
        }
        let kind = self.kind.unwrap_or_else(|| match &self.statement {
            Some(statement) => statement_kind(statement),
            None => CommandKind::infer(&self.sql)
        });
        let slot = OnceLock::new();
        if let Some(statement) = self.statement {
            let _ = slot.set(statement);
        }
        Ok(SqlContext {
            sql: self.sql,
            kind,
            caller_id: self.caller_id,
            params: self.params,
            pagination: self.pagination,
            datasource: self.datasource,
            execution_layer: self.execution_layer,
            statement: slot
        })
    }
}
