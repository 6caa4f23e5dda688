//! Row-limit rewriting.
//!
//! [`LimitRewriter`] is the single entry point for adding or capping the row
//! limit of a SELECT. The statement handed in is never modified; the
//! rewritten statement is a fresh copy.

use serde::Serialize;
use tracing::debug;

use crate::{
    config::RewriteConfig,
    dialect::{DatabaseKind, LimitOutcome},
    error::GuardError,
    query::Statement
};

/// Result of a rewrite
#[derive(Debug, Clone, Serialize)]
pub struct RewriteOutcome {
    #[serde(skip)]
    pub statement: Statement,
    /// SQL to execute; the input text itself when nothing changed
    pub sql:       String,
    pub dialect:   DatabaseKind,
    pub outcome:   LimitOutcome
}

impl RewriteOutcome {
    pub fn is_modified(&self) -> bool {
        self.outcome.is_modified()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LimitRewriter {
    max_rows: u64,
    enforce:  bool
}

impl LimitRewriter {
    pub fn new(max_rows: u64, enforce: bool) -> Result<Self, GuardError> {
        if max_rows == 0 {
            return Err(GuardError::config("max_rows must be > 0"));
        }
        Ok(Self {
            max_rows,
            enforce
        })
    }

    pub fn from_config(config: &RewriteConfig) -> Result<Self, GuardError> {
        Self::new(config.default_max_rows, config.enforce_max_limit)
    }

    pub fn max_rows(&self) -> u64 {
        self.max_rows
    }

    /// Rewrite a parsed statement for `dialect`
    pub fn rewrite(
        &self,
        statement: &Statement,
        dialect: DatabaseKind
    ) -> Result<RewriteOutcome, GuardError> {
        let mut rewritten = statement.clone();
        let outcome = match &mut rewritten {
            Statement::Query(query) => dialect.apply_limit(query, self.max_rows, self.enforce)?,
            _ => LimitOutcome::Skipped {
                reason: String::from("statement is not a SELECT")
            }
        };
        let sql = dialect.render(&rewritten);
        debug!(dialect = dialect.name(), outcome = %outcome, "rewrite finished");
        Ok(RewriteOutcome {
            statement: rewritten,
            sql,
            dialect,
            outcome
        })
    }

    /// Parse, rewrite and render SQL text.
    ///
    /// When nothing changes the original text is returned byte for byte.
    pub fn rewrite_sql(&self, sql: &str, dialect: DatabaseKind) -> Result<RewriteOutcome, GuardError> {
        let statement = dialect.parse(sql)?;
        let mut outcome = self.rewrite(&statement, dialect)?;
        if !outcome.is_modified() {
            outcome.sql = sql.to_string();
        }
        Ok(outcome)
    }
}
