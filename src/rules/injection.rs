//! Injection-oriented checkers.
//!
//! Most of these work on the quote-aware lexical scan rather than the AST:
//! sqlparser drops comments and rejects some of the constructs attackers
//! use, so the raw text is the only reliable place to look.

use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;
use tracing::error;

use super::{CheckContext, RiskLevel, Rule, RuleInfo, Violation, normalize_keyword};
use crate::{
    config::{DangerousFunctionConfig, SetOperationConfig, SqlCommentConfig},
    query::scan::CommentKind
};

static SET_OPERATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(UNION|INTERSECT|EXCEPT|MINUS)(\s+ALL)?\b").expect("valid regex")
});

static INTO_FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bINTO\s+(OUTFILE|DUMPFILE)\b").expect("valid regex"));

static INTO_FILE_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bINTO\s+(?:OUTFILE|DUMPFILE)\s+'((?:[^'\\]|\\.|'')*)'").expect("valid regex")
});

static WAITFOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bWAITFOR\s+(DELAY|TIME)\b").expect("valid regex"));

/// More than one statement in a single call
pub struct MultiStatement;

impl Rule for MultiStatement {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD007",
            name: "Multiple statements",
            risk: RiskLevel::Critical
        }
    }

    fn needs_statement(&self) -> bool {
        false
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let Some(scan) = ctx.scans().iter().find(|scan| scan.is_stacked()) else {
            return vec![];
        };
        vec![
            Violation::new(
                &self.info(),
                format!(
                    "Multiple SQL statements detected ({}); stacked queries are a common injection vector",
                    scan.statements.len()
                )
            )
            .with_suggestion("Execute one statement per call and bind user input as parameters")
            .with_detail("statements", scan.statements.len())
        ]
    }
}

/// UNION and friends, the classic way to exfiltrate other tables
pub struct SetOperation {
    allowed: IndexSet<String>
}

impl SetOperation {
    pub fn new(config: &SetOperationConfig) -> Self {
        Self {
            allowed: config
                .allowed_operations
                .iter()
                .map(|op| normalize_keyword(op))
                .collect()
        }
    }
}

impl Rule for SetOperation {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD008",
            name: "Set operation",
            risk: RiskLevel::Critical
        }
    }

    fn needs_statement(&self) -> bool {
        false
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let found: IndexSet<String> = match ctx.facts() {
            Some(facts) => facts
                .set_operations
                .iter()
                .map(|op| normalize_keyword(op))
                .collect(),
            None => SET_OPERATION_REGEX
                .find_iter(&ctx.scan().code)
                .map(|m| normalize_keyword(m.as_str()))
                .collect()
        };
        found
            .into_iter()
            .filter(|op| !self.allowed.contains(op))
            .map(|op| {
                Violation::new(&self.info(), format!("Set operation {} is not allowed", op))
                    .with_suggestion("Split the query or allow the operation explicitly")
                    .with_detail("operation", op)
            })
            .collect()
    }
}

/// Comments can hide injected SQL or truncate the rest of a statement
pub struct SqlComment {
    allow_hints: bool
}

impl SqlComment {
    pub fn new(config: &SqlCommentConfig) -> Self {
        Self {
            allow_hints: config.allow_hint_comments
        }
    }
}

impl Rule for SqlComment {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD009",
            name: "SQL comment",
            risk: RiskLevel::Critical
        }
    }

    fn needs_statement(&self) -> bool {
        false
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let Some(comment) = ctx
            .scans()
            .iter()
            .flat_map(|scan| &scan.comments)
            .find(|c| !(self.allow_hints && c.kind == CommentKind::Hint))
        else {
            return vec![];
        };
        vec![
            Violation::new(
                &self.info(),
                format!("SQL contains a {} at position {}", comment.kind, comment.offset)
            )
            .with_suggestion("Remove comments from SQL sent to the database")
            .with_detail("kind", comment.kind)
        ]
    }
}

/// MySQL `SELECT ... INTO OUTFILE/DUMPFILE` writes files on the database host
pub struct IntoOutfile;

impl Rule for IntoOutfile {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD010",
            name: "File write",
            risk: RiskLevel::Critical
        }
    }

    fn needs_statement(&self) -> bool {
        false
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let Some(found) = INTO_FILE_REGEX.find(&ctx.scan().code) else {
            return vec![];
        };
        let target = found
            .as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        let mut violation = Violation::new(
            &self.info(),
            format!("{} writes query results to the database server file system", target)
        )
        .with_suggestion("Export data through the application instead");
        if let Some(path) = INTO_FILE_PATH_REGEX
            .captures(ctx.sql())
            .and_then(|caps| caps.get(1))
        {
            violation = violation.with_detail("path", path.as_str());
        }
        vec![violation]
    }
}

/// Functions that read files, run commands or stall the connection
pub struct DangerousFunction {
    denied:   IndexSet<String>,
    fallback: Option<Regex>
}

impl DangerousFunction {
    pub fn new(config: &DangerousFunctionConfig) -> Self {
        let denied: IndexSet<String> = config
            .denied_functions
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        let fallback = if denied.is_empty() {
            None
        } else {
            let names = denied
                .iter()
                .map(|f| regex::escape(f))
                .collect::<Vec<_>>()
                .join("|");
            match Regex::new(&format!(r"(?i)\b({})\s*\(", names)) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    error!(error = %e, "invalid denied function list");
                    None
                }
            }
        };
        Self {
            denied,
            fallback
        }
    }

    fn found(&self, ctx: &CheckContext<'_>) -> IndexSet<String> {
        let mut found = IndexSet::new();
        match ctx.facts() {
            Some(facts) => {
                for function in &facts.functions {
                    if self.denied.contains(function.as_str()) {
                        found.insert(function.to_string());
                    }
                }
            }
            None => {
                if let Some(fallback) = &self.fallback {
                    for caps in fallback.captures_iter(&ctx.scan().code) {
                        if let Some(name) = caps.get(1) {
                            found.insert(name.as_str().to_lowercase());
                        }
                    }
                }
            }
        }
        // T-SQL WAITFOR is a statement, not a call
        if self.denied.contains("waitfor") && WAITFOR_REGEX.is_match(&ctx.scan().code) {
            found.insert(String::from("waitfor"));
        }
        found
    }
}

impl Rule for DangerousFunction {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD011",
            name: "Dangerous function",
            risk: RiskLevel::Critical
        }
    }

    fn needs_statement(&self) -> bool {
        false
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        self.found(ctx)
            .into_iter()
            .map(|function| {
                Violation::new(
                    &self.info(),
                    format!("Dangerous function '{}' is not allowed", function)
                )
                .with_suggestion("Remove the function call from the SQL")
                .with_detail("function", function)
            })
            .collect()
    }
}
