//! Checkers keyed on the statement's leading command.
//!
//! All of them read the comment-free code text, so they classify statements
//! sqlparser cannot parse (vendor `SHOW` variants, `EXEC`, `WAITFOR`) too.

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::{CheckContext, RiskLevel, Rule, RuleInfo, Violation, normalize_keyword};
use crate::config::{DdlOperationConfig, MetadataStatementConfig};

const DDL_COMMANDS: &[&str] = &["CREATE", "ALTER", "DROP", "TRUNCATE"];
const CALL_COMMANDS: &[&str] = &["CALL", "EXEC", "EXECUTE"];
const SET_SCOPES: &[&str] = &["SESSION", "GLOBAL", "LOCAL", "PERSIST"];

/// Leading words of the code, `(` and `{` wrappers skipped
fn leading_words(code: &str, count: usize) -> SmallVec<[&str; 4]> {
    code.trim_start_matches(|c: char| c.is_whitespace() || c == '(' || c == '{')
        .split_whitespace()
        .take(count)
        .collect()
}

/// Identifier at the start of a token, up to `(`, `=`, `;` or `}`
fn token_name(token: &str) -> &str {
    token
        .split(['(', '=', ';', '}'])
        .next()
        .unwrap_or(token)
}

/// Schema changes from the application connection
pub struct DdlOperation {
    allowed: IndexSet<String>
}

impl DdlOperation {
    pub fn new(config: &DdlOperationConfig) -> Self {
        Self {
            allowed: config
                .allowed_operations
                .iter()
                .map(|op| normalize_keyword(op))
                .collect()
        }
    }
}

impl Rule for DdlOperation {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD012",
            name: "DDL operation",
            risk: RiskLevel::Critical
        }
    }

    fn needs_statement(&self) -> bool {
        false
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let command = ctx.leading_keyword();
        if !DDL_COMMANDS.contains(&command.as_str()) || self.allowed.contains(&command) {
            return vec![];
        }
        let words = leading_words(&ctx.scan().code, 2);
        let object = words
            .get(1)
            .map(|w| w.to_ascii_uppercase())
            .unwrap_or_default();
        vec![
            Violation::new(
                &self.info(),
                format!("DDL operation {} {} is not allowed at runtime", command, object)
                    .trim_end()
                    .to_string()
            )
            .with_suggestion("Run schema changes through migrations, not application SQL")
            .with_detail("operation", command)
        ]
    }
}

/// Stored procedure invocation hides what actually runs
pub struct CallStatement;

impl Rule for CallStatement {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD013",
            name: "Procedure call",
            risk: RiskLevel::High
        }
    }

    fn needs_statement(&self) -> bool {
        false
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let command = ctx.leading_keyword();
        if !CALL_COMMANDS.contains(&command.as_str()) {
            return vec![];
        }
        let words = leading_words(&ctx.scan().code, 2);
        let procedure = words.get(1).map(|w| token_name(w)).unwrap_or_default();
        vec![
            Violation::new(
                &self.info(),
                format!("Stored procedure call '{}' is not allowed", procedure)
            )
            .with_suggestion("Issue the underlying statements directly so they can be checked")
            .with_detail("procedure", procedure)
        ]
    }
}

/// Schema discovery statements, typical of reconnaissance
pub struct MetadataStatement {
    allowed: IndexSet<String>
}

impl MetadataStatement {
    pub fn new(config: &MetadataStatementConfig) -> Self {
        Self {
            allowed: config
                .allowed_statements
                .iter()
                .map(|s| normalize_keyword(s))
                .collect()
        }
    }
}

impl Rule for MetadataStatement {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD016",
            name: "Metadata statement",
            risk: RiskLevel::High
        }
    }

    fn needs_statement(&self) -> bool {
        false
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let statement = match ctx.leading_keyword().as_str() {
            "SHOW" => "SHOW",
            "DESCRIBE" | "DESC" => "DESCRIBE",
            "USE" => "USE",
            _ => return vec![]
        };
        if self.allowed.contains(statement) {
            return vec![];
        }
        vec![
            Violation::new(
                &self.info(),
                format!("Metadata statement {} is not allowed", statement)
            )
            .with_suggestion("Query metadata through an administrative connection")
            .with_detail("statement", statement)
        ]
    }
}

/// Session variable changes (`SET autocommit = 0`, `SET @x = ...`)
pub struct SetStatement;

impl Rule for SetStatement {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD017",
            name: "Session SET statement",
            risk: RiskLevel::Medium
        }
    }

    fn needs_statement(&self) -> bool {
        false
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        if ctx.leading_keyword() != "SET" {
            return vec![];
        }
        let words = leading_words(&ctx.scan().code, 3);
        let variable = words
            .iter()
            .skip(1)
            .find(|w| !SET_SCOPES.contains(&w.to_ascii_uppercase().as_str()))
            .map(|w| token_name(w))
            .unwrap_or_default();
        vec![
            Violation::new(
                &self.info(),
                format!("Session variable modification 'SET {}' is not allowed", variable)
            )
            .with_suggestion("Configure session settings on the connection pool instead")
            .with_detail("variable", variable)
        ]
    }
}
