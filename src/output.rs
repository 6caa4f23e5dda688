use colored::Colorize;
use serde::Serialize;

use crate::{
    dialect::DatabaseKind,
    rewriter::RewriteOutcome,
    rules::{RiskLevel, RuleInfo, ValidationResult}
};

/// Output format for results
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true,
            verbose: false
        }
    }
}

/// Verdict for one statement of a checked batch
#[derive(Debug, Clone, Serialize)]
pub struct StatementReport {
    pub index:   usize,
    pub sql:     String,
    pub verdict: ValidationResult
}

/// Checked batch for serialization
#[derive(Debug, Serialize)]
pub struct CheckReport<'a> {
    pub risk:       RiskLevel,
    pub statements: &'a [StatementReport]
}

fn serialize<T: Serialize>(value: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(value).unwrap_or_default(),
        OutputFormat::Text => String::new()
    }
}

fn paint(text: &str, risk: RiskLevel, colored: bool) -> String {
    if !colored {
        return text.to_string();
    }
    match risk {
        RiskLevel::Critical => text.red().bold().to_string(),
        RiskLevel::High => text.red().to_string(),
        RiskLevel::Medium => text.yellow().to_string(),
        RiskLevel::Low => text.blue().to_string(),
        RiskLevel::Safe => text.green().to_string()
    }
}

/// Highest risk across a batch
pub fn batch_risk(reports: &[StatementReport]) -> RiskLevel {
    reports
        .iter()
        .map(|r| r.verdict.risk())
        .max()
        .unwrap_or(RiskLevel::Safe)
}

/// Format the verdicts of a checked batch
pub fn format_check_report(reports: &[StatementReport], opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Text => format_check_text(reports, opts),
        format => serialize(
            &CheckReport {
                risk:       batch_risk(reports),
                statements: reports
            },
            format
        )
    }
}

fn format_check_text(reports: &[StatementReport], opts: &OutputOptions) -> String {
    let mut output = String::new();
    let title = "=== SQL Safety Check ===";
    if opts.colored {
        output.push_str(&title.bold().to_string());
    } else {
        output.push_str(title);
    }
    output.push_str("\n\n");

    for report in reports {
        let verdict = &report.verdict;
        let header = format!("Statement #{}:", report.index + 1);
        if opts.colored {
            output.push_str(&header.cyan().bold().to_string());
        } else {
            output.push_str(&header);
        }
        output.push(' ');
        output.push_str(&paint(verdict.risk().as_str(), verdict.risk(), opts.colored));
        output.push('\n');
        output.push_str(&format!("  {}\n", report.sql.trim()));

        for violation in verdict.violations() {
            let level = format!("[{}]", violation.risk);
            output.push_str(&format!(
                "  {} {} {}\n",
                paint(&level, violation.risk, opts.colored),
                violation.rule_id,
                violation.message
            ));
            if let Some(suggestion) = &violation.suggestion {
                output.push_str(&format!("      -> {}\n", suggestion));
            }
            if opts.verbose {
                for (key, value) in &violation.details {
                    output.push_str(&format!("      {}: {}\n", key, value));
                }
            }
        }
        if opts.verbose {
            for (key, value) in verdict.details() {
                output.push_str(&format!("  {}: {}\n", key, value));
            }
        }
        output.push('\n');
    }

    let total: usize = reports.iter().map(|r| r.verdict.violations().len()).sum();
    let risk = batch_risk(reports);
    output.push_str(&format!(
        "Summary: {} statement(s), {} violation(s), risk {}\n",
        reports.len(),
        total,
        paint(risk.as_str(), risk, opts.colored)
    ));
    output
}

/// Format a rewrite result
pub fn format_rewrite(outcome: &RewriteOutcome, opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Text => {
            let mut output = String::new();
            if opts.verbose || !outcome.is_modified() {
                let note = format!("-- {} ({})", outcome.outcome, outcome.dialect.name());
                if opts.colored {
                    output.push_str(&note.dimmed().to_string());
                } else {
                    output.push_str(&note);
                }
                output.push('\n');
            }
            output.push_str(&outcome.sql);
            output
        }
        format => serialize(outcome, format)
    }
}

#[derive(Serialize)]
struct RuleRow {
    id:   &'static str,
    name: &'static str,
    risk: RiskLevel
}

/// Format the checker catalog
pub fn format_rules(rules: &[RuleInfo], opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Text => {
            let mut output = String::new();
            for rule in rules {
                let risk = format!("{:<8}", rule.risk.as_str());
                output.push_str(&format!(
                    "{}  {}  {}\n",
                    rule.id,
                    paint(&risk, rule.risk, opts.colored),
                    rule.name
                ));
            }
            output
        }
        format => {
            let rows: Vec<RuleRow> = rules
                .iter()
                .map(|r| RuleRow {
                    id:   r.id,
                    name: r.name,
                    risk: r.risk
                })
                .collect();
            serialize(&rows, format)
        }
    }
}

#[derive(Serialize)]
struct DialectRow {
    name:   &'static str,
    syntax: String
}

/// Format the supported dialects with their row-limit syntax
pub fn format_dialects(opts: &OutputOptions) -> String {
    let rows: Vec<DialectRow> = DatabaseKind::all()
        .iter()
        .map(|d| DialectRow {
            name:   d.name(),
            syntax: format!("{:?}", d.limit_syntax())
        })
        .collect();
    match opts.format {
        OutputFormat::Text => rows
            .iter()
            .map(|row| format!("{:<12} {}\n", row.name, row.syntax))
            .collect(),
        format => serialize(&rows, format)
    }
}
