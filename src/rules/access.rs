//! Table access checkers.

use regex::Regex;

use super::{CheckContext, RiskLevel, Rule, RuleInfo, Violation, glob_regex};
use crate::{
    config::{DeniedTableConfig, ReadOnlyTableConfig},
    query::{self, bare_table_name}
};

/// Tables the application must never touch
pub struct DeniedTable {
    patterns: Vec<Regex>
}

impl DeniedTable {
    pub fn new(config: &DeniedTableConfig) -> Self {
        Self {
            // `sys_*` matches `sys_user` but not `sys_user_role`
            patterns: config
                .denied_tables
                .iter()
                .filter_map(|p| glob_regex(&bare_table_name(p), "[^_]+"))
                .collect()
        }
    }
}

impl Rule for DeniedTable {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD014",
            name: "Denied table",
            risk: RiskLevel::Critical
        }
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        if self.patterns.is_empty() {
            return vec![];
        }
        let Some(facts) = ctx.facts() else {
            return vec![];
        };
        facts
            .tables
            .iter()
            .filter(|table| {
                let bare = bare_table_name(table);
                self.patterns.iter().any(|p| p.is_match(&bare))
            })
            .map(|table| {
                Violation::new(
                    &self.info(),
                    format!("Access to denied table '{}' is not allowed", table)
                )
                .with_suggestion("Remove the table from the query or request access")
                .with_detail("table", table)
            })
            .collect()
    }
}

/// Tables that only accept reads
pub struct ReadOnlyTable {
    exact:    Vec<String>,
    prefixes: Vec<String>
}

impl ReadOnlyTable {
    pub fn new(config: &ReadOnlyTableConfig) -> Self {
        let mut rule = Self {
            exact:    Vec::new(),
            prefixes: Vec::new()
        };
        for table in &config.readonly_tables {
            let table = table.trim().to_lowercase();
            match table.strip_suffix('*') {
                Some(prefix) => rule.prefixes.push(bare_table_name(prefix)),
                None => rule.exact.push(bare_table_name(&table))
            }
        }
        rule
    }

    fn is_read_only(&self, table: &str) -> bool {
        let bare = bare_table_name(table);
        self.exact.iter().any(|t| *t == bare)
            || self
                .prefixes
                .iter()
                .any(|p| bare.starts_with(p.as_str()))
    }
}

impl Rule for ReadOnlyTable {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:   "GUARD015",
            name: "Write to read-only table",
            risk: RiskLevel::High
        }
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<Violation> {
        let kind = ctx.kind();
        if !kind.is_write() {
            return vec![];
        }
        let Some(table) = ctx.statement().and_then(query::primary_table) else {
            return vec![];
        };
        if !self.is_read_only(&table) {
            return vec![];
        }
        vec![
            Violation::new(
                &self.info(),
                format!("Write operation {} on read-only table: {}", kind, table)
            )
            .with_suggestion("Read-only tables may only be queried")
            .with_detail("table", table)
        ]
    }
}
