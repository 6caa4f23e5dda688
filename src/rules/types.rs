//! Type definitions for the rule checker chain.
//!
//! - [`RiskLevel`] - Ordered risk classification (SAFE..CRITICAL)
//! - [`Violation`] - A single finding produced by a checker
//! - [`ValidationResult`] - The verdict returned to callers
//! - [`RuleInfo`] - Checker metadata

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, ser::SerializeStruct};

/// Risk level of a violation.
///
/// Ordered from lowest to highest so that the aggregated level of a verdict
/// is simply the maximum of its violations.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize
)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum RiskLevel {
    #[default]
    Safe,
    Low,
    Medium,
    High,
    Critical
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL"
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(Self::Safe),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown risk level '{}'", other))
        }
    }
}

impl TryFrom<String> for RiskLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Metadata about a checker for identification and configuration.
#[derive(Debug, Clone, Copy)]
pub struct RuleInfo {
    /// Stable identifier (e.g., "GUARD001")
    pub id:   &'static str,
    /// Human-readable checker name
    pub name: &'static str,
    /// Default risk level of findings
    pub risk: RiskLevel
}

/// A single finding produced by a checker.
///
/// Immutable once pushed into a [`ValidationResult`].
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub rule_id:    &'static str,
    pub rule_name:  &'static str,
    pub risk:       RiskLevel,
    pub message:    String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub details:    IndexMap<String, String>
}

impl Violation {
    /// Create a violation at the checker's default risk
    pub fn new(info: &RuleInfo, message: impl Into<String>) -> Self {
        Self {
            rule_id:    info.id,
            rule_name:  info.name,
            risk:       info.risk,
            message:    message.into(),
            suggestion: None,
            details:    IndexMap::new()
        }
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}

/// Verdict of a validation call.
///
/// The aggregated risk is derived from the violation list on every read, so
/// it can never disagree with it.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    violations: Vec<Violation>,
    details:    IndexMap<String, String>
}

impl ValidationResult {
    /// A passing, SAFE verdict with no violations
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Maximum risk across all violations, SAFE when there are none
    pub fn risk(&self) -> RiskLevel {
        self.violations
            .iter()
            .map(|v| v.risk)
            .max()
            .unwrap_or(RiskLevel::Safe)
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn add_violation(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
    }

    pub fn has_rule(&self, rule_id: &str) -> bool {
        self.violations.iter().any(|v| v.rule_id == rule_id)
    }

    pub fn details(&self) -> &IndexMap<String, String> {
        &self.details
    }

    pub fn insert_detail(&mut self, key: impl Into<String>, value: impl ToString) {
        self.details.insert(key.into(), value.to_string());
    }

    /// Violation messages formatted as `[LEVEL] message`
    pub fn messages(&self) -> Vec<String> {
        self.violations
            .iter()
            .map(|v| format!("[{}] {}", v.risk, v.message))
            .collect()
    }
}

impl Serialize for ValidationResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationResult", 4)?;
        state.serialize_field("passed", &self.passed())?;
        state.serialize_field("risk", &self.risk())?;
        state.serialize_field("violations", &self.violations)?;
        state.serialize_field("details", &self.details)?;
        state.end()
    }
}
