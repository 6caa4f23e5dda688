// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use sql_guard::rules::{RiskLevel, RuleInfo, ValidationResult, Violation};

const INFO: RuleInfo = RuleInfo {
    id:   "TEST001",
    name: "Test rule",
    risk: RiskLevel::Medium
};

#[test]
fn test_risk_level_display() {
    assert_eq!(format!("{}", RiskLevel::Safe), "SAFE");
    assert_eq!(format!("{}", RiskLevel::Low), "LOW");
    assert_eq!(format!("{}", RiskLevel::Medium), "MEDIUM");
    assert_eq!(format!("{}", RiskLevel::High), "HIGH");
    assert_eq!(format!("{}", RiskLevel::Critical), "CRITICAL");
}

#[test]
fn test_risk_level_ordering() {
    assert!(RiskLevel::Safe < RiskLevel::Low);
    assert!(RiskLevel::Low < RiskLevel::Medium);
    assert!(RiskLevel::Medium < RiskLevel::High);
    assert!(RiskLevel::High < RiskLevel::Critical);
}

#[test]
fn test_risk_level_default() {
    assert_eq!(RiskLevel::default(), RiskLevel::Safe);
}

#[test]
fn test_risk_level_from_str() {
    assert_eq!("critical".parse::<RiskLevel>().unwrap(), RiskLevel::Critical);
    assert_eq!(" High ".parse::<RiskLevel>().unwrap(), RiskLevel::High);
    assert!("severe".parse::<RiskLevel>().is_err());
}

#[test]
fn test_risk_level_serde() {
    assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"HIGH\"");
    let parsed: RiskLevel = serde_json::from_str("\"low\"").unwrap();
    assert_eq!(parsed, RiskLevel::Low);
}

#[test]
fn test_violation_builder() {
    let violation = Violation::new(&INFO, "something is off")
        .with_risk(RiskLevel::High)
        .with_suggestion("fix it")
        .with_detail("table", "orders")
        .with_detail("limit", 5000);

    assert_eq!(violation.rule_id, "TEST001");
    assert_eq!(violation.rule_name, "Test rule");
    assert_eq!(violation.risk, RiskLevel::High);
    assert_eq!(violation.suggestion.as_deref(), Some("fix it"));
    assert_eq!(violation.details.get("limit").unwrap(), "5000");
}

#[test]
fn test_violation_default_risk() {
    let violation = Violation::new(&INFO, "message");
    assert_eq!(violation.risk, RiskLevel::Medium);
    assert!(violation.suggestion.is_none());
    assert!(violation.details.is_empty());
}

#[test]
fn test_result_pass() {
    let result = ValidationResult::pass();
    assert!(result.passed());
    assert_eq!(result.risk(), RiskLevel::Safe);
    assert!(result.violations().is_empty());
    assert!(result.details().is_empty());
}

#[test]
fn test_result_risk_is_max_of_violations() {
    let mut result = ValidationResult::pass();
    result.add_violation(Violation::new(&INFO, "a").with_risk(RiskLevel::Low));
    result.add_violation(Violation::new(&INFO, "b").with_risk(RiskLevel::Critical));
    result.add_violation(Violation::new(&INFO, "c"));

    assert!(!result.passed());
    assert_eq!(result.risk(), RiskLevel::Critical);
    assert_eq!(result.violations().len(), 3);
    assert!(result.has_rule("TEST001"));
    assert!(!result.has_rule("TEST002"));
}

#[test]
fn test_result_keeps_violation_order() {
    let mut result = ValidationResult::pass();
    result.extend([Violation::new(&INFO, "first"), Violation::new(&INFO, "second")]);
    let messages: Vec<_> = result.violations().iter().map(|v| v.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second"]);
}

#[test]
fn test_result_messages() {
    let mut result = ValidationResult::pass();
    result.add_violation(Violation::new(&INFO, "careful"));
    assert_eq!(result.messages(), vec!["[MEDIUM] careful".to_string()]);
}

#[test]
fn test_result_details() {
    let mut result = ValidationResult::pass();
    result.insert_detail("deduplicated", true);
    assert!(result.passed());
    assert_eq!(result.details().get("deduplicated").unwrap(), "true");
}

#[test]
fn test_result_serialization() {
    let mut result = ValidationResult::pass();
    result.add_violation(Violation::new(&INFO, "careful").with_suggestion("slow down"));
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["passed"], false);
    assert_eq!(json["risk"], "MEDIUM");
    assert_eq!(json["violations"][0]["rule_id"], "TEST001");
    assert_eq!(json["violations"][0]["suggestion"], "slow down");
    assert!(json["violations"][0].get("details").is_none());
}
