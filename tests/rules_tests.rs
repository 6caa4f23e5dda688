// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use sql_guard::{
    config::{GuardConfig, ParseFailureMode},
    context::SqlContext,
    error::GuardError,
    query::{SqlDialect, parse},
    rules::{CheckContext, RiskLevel, RuleRunner, ValidationResult},
    strategy::ViolationStrategy,
    validator::Validator
};

fn base_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.dedup.enabled = false;
    config
}

fn validate_with(config: GuardConfig, sql: &str) -> ValidationResult {
    let validator = Validator::new(config).unwrap();
    validator.validate(&SqlContext::new(sql).unwrap())
}

fn validate(sql: &str) -> ValidationResult {
    validate_with(base_config(), sql)
}

fn mysql_config() -> GuardConfig {
    let mut config = base_config();
    config.dialect = SqlDialect::MySQL;
    config
}

fn rule_ids(result: &ValidationResult) -> Vec<&'static str> {
    result.violations().iter().map(|v| v.rule_id).collect()
}

// End-to-end verdicts

#[test]
fn test_delete_filtered_only_by_flag_is_high() {
    let result = validate("DELETE FROM user WHERE deleted = 0");
    assert!(!result.passed());
    assert_eq!(result.risk(), RiskLevel::High);
    assert_eq!(rule_ids(&result), vec!["GUARD003"]);
}

#[test]
fn test_full_table_select_is_critical() {
    let result = validate("SELECT * FROM log");
    assert_eq!(result.risk(), RiskLevel::Critical);
    assert!(result.has_rule("GUARD001"));
    assert!(result.has_rule("GUARD006"));
}

#[test]
fn test_primary_key_lookup_is_safe() {
    let result = validate("SELECT * FROM orders WHERE id = 42");
    assert!(result.passed());
    assert_eq!(result.risk(), RiskLevel::Safe);
    assert!(result.messages().is_empty());
}

#[test]
fn test_table_less_select_is_safe() {
    assert!(validate("SELECT NOW()").passed());
    assert!(validate("SELECT 1").passed());
}

#[test]
fn test_messages_format() {
    let result = validate("DELETE FROM user WHERE deleted = 0");
    let messages = result.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("[HIGH] "));
}

// GUARD001

#[test]
fn test_update_without_where() {
    let result = validate("UPDATE accounts SET balance = 0");
    assert_eq!(rule_ids(&result), vec!["GUARD001"]);
    let violation = &result.violations()[0];
    assert!(violation.message.contains("accounts"));
    assert!(violation.suggestion.is_some());
}

#[test]
fn test_insert_is_not_missing_where() {
    assert!(!validate("INSERT INTO audit (a) VALUES (1)").has_rule("GUARD001"));
}

// GUARD002

#[test]
fn test_dummy_condition_pattern() {
    let result = validate("UPDATE t SET a = 1 WHERE 1 = 1");
    assert!(result.has_rule("GUARD002"));
    assert!(!result.has_rule("GUARD001"));
}

#[test]
fn test_dummy_condition_constant_folding() {
    let result = validate("SELECT * FROM t WHERE id = 5 AND 3 > 2");
    assert!(result.has_rule("GUARD002"));
    let violation = result
        .violations()
        .iter()
        .find(|v| v.rule_id == "GUARD002")
        .unwrap();
    assert_eq!(violation.details.get("condition").unwrap(), "3 > 2");
}

#[test]
fn test_dummy_condition_custom_pattern() {
    let mut config = base_config();
    config.rules.dummy_condition.custom_patterns = vec![String::from("a = a")];
    let result = validate_with(config, "UPDATE t SET b = 1 WHERE a = a");
    assert!(result.has_rule("GUARD002"));
}

#[test]
fn test_real_condition_is_not_dummy() {
    assert!(!validate("UPDATE t SET a = 1 WHERE id = 1").has_rule("GUARD002"));
}

// GUARD003

#[test]
fn test_blacklist_needs_every_field_listed() {
    assert!(!validate("UPDATE t SET a = 1 WHERE status = 1 AND id = 2").has_rule("GUARD003"));
    assert!(validate("UPDATE t SET a = 1 WHERE status = 1 AND type = 2").has_rule("GUARD003"));
}

#[test]
fn test_blacklist_prefix_wildcard() {
    let mut config = base_config();
    config.rules.blacklist_fields.fields = vec![String::from("is_*")];
    let result = validate_with(config, "UPDATE t SET a = 1 WHERE is_active = 1 AND is_hidden = 0");
    assert!(result.has_rule("GUARD003"));
}

// GUARD004

#[test]
fn test_whitelist_fields_by_table() {
    let mut config = base_config();
    config
        .rules
        .whitelist_fields
        .by_table
        .insert(String::from("users"), vec![String::from("id"), String::from("user_id")]);

    let result = validate_with(config.clone(), "UPDATE users SET a = 1 WHERE email = 'x'");
    assert_eq!(rule_ids(&result), vec!["GUARD004"]);
    assert_eq!(result.risk(), RiskLevel::Medium);

    let result = validate_with(config, "UPDATE users SET a = 1 WHERE user_id = 3");
    assert!(result.passed());
}

#[test]
fn test_whitelist_fields_unknown_tables() {
    let mut config = base_config();
    config.rules.whitelist_fields.fields = vec![String::from("tenant_id")];
    let sql = "DELETE FROM invoices WHERE created < '2020-01-01'";

    assert!(!validate_with(config.clone(), sql).has_rule("GUARD004"));

    config.rules.whitelist_fields.enforce_for_unknown_tables = true;
    assert!(validate_with(config, sql).has_rule("GUARD004"));
}

// GUARD005

#[test]
fn test_physical_pagination_without_where() {
    let result = validate("SELECT * FROM orders LIMIT 10");
    assert!(result.has_rule("GUARD005"));
    assert!(!result.has_rule("GUARD006"));
    assert_eq!(result.risk(), RiskLevel::Critical);
}

#[test]
fn test_logical_pagination() {
    let validator = Validator::new(base_config()).unwrap();
    let ctx = SqlContext::builder("SELECT * FROM orders WHERE user_id = 5")
        .pagination(0, 20)
        .build()
        .unwrap();
    let result = validator.validate(&ctx);
    assert_eq!(rule_ids(&result), vec!["GUARD005"]);
    assert_eq!(result.risk(), RiskLevel::Critical);
    assert_eq!(result.violations()[0].details.get("limit").unwrap(), "20");
}

#[test]
fn test_pagination_plugin_makes_hint_physical() {
    let mut config = base_config();
    config.pagination.physical_pagination_plugin = true;
    let validator = Validator::new(config).unwrap();
    let ctx = SqlContext::builder("SELECT * FROM orders WHERE user_id = 5")
        .pagination(0, 20)
        .build()
        .unwrap();
    let result = validator.validate(&ctx);
    // Only the missing ORDER BY remains
    assert_eq!(rule_ids(&result), vec!["GUARD005"]);
    assert_eq!(result.risk(), RiskLevel::Low);
}

#[test]
fn test_deep_offset() {
    let result =
        validate("SELECT * FROM orders WHERE user_id = 5 ORDER BY id LIMIT 20 OFFSET 50000");
    assert_eq!(rule_ids(&result), vec!["GUARD005"]);
    assert_eq!(result.risk(), RiskLevel::Medium);
    assert_eq!(result.violations()[0].details.get("offset").unwrap(), "50000");
}

#[test]
fn test_page_size_from_bound_parameter() {
    let validator = Validator::new(base_config()).unwrap();
    let ctx = SqlContext::builder("SELECT * FROM orders WHERE user_id = 5 ORDER BY id LIMIT $1")
        .param("1", 5000)
        .build()
        .unwrap();
    let result = validator.validate(&ctx);
    assert_eq!(rule_ids(&result), vec!["GUARD005"]);
    assert_eq!(result.violations()[0].details.get("limit").unwrap(), "5000");
}

#[test]
fn test_pagination_without_order_by() {
    let result = validate("SELECT * FROM orders WHERE user_id = 5 LIMIT 20");
    assert_eq!(rule_ids(&result), vec!["GUARD005"]);
    assert_eq!(result.risk(), RiskLevel::Low);
}

// GUARD006

#[test]
fn test_no_pagination_blacklisted_filter() {
    let result = validate("SELECT * FROM t WHERE status = 1");
    assert!(result.has_rule("GUARD003"));
    let violation = result
        .violations()
        .iter()
        .find(|v| v.rule_id == "GUARD006")
        .unwrap();
    assert_eq!(violation.risk, RiskLevel::High);
}

#[test]
fn test_no_pagination_enforce_for_all() {
    let sql = "SELECT * FROM t WHERE name = 'x'";
    assert!(validate(sql).passed());

    let mut config = base_config();
    config.rules.no_pagination.enforce_for_all_queries = true;
    let result = validate_with(config, sql);
    assert_eq!(rule_ids(&result), vec!["GUARD006"]);
    assert_eq!(result.risk(), RiskLevel::Medium);
}

#[test]
fn test_no_pagination_whitelists() {
    let mut config = base_config();
    config.rules.no_pagination.enforce_for_all_queries = true;
    config.rules.no_pagination.whitelist_tables = vec![String::from("dict*")];
    config.rules.no_pagination.whitelist_mapper_ids = vec![String::from("*.selectAll")];
    config.rules.no_pagination.unique_key_fields = vec![String::from("order_no")];
    let validator = Validator::new(config).unwrap();

    let check = |sql: &str, caller: Option<&str>| {
        let mut builder = SqlContext::builder(sql);
        if let Some(caller) = caller {
            builder = builder.caller_id(caller);
        }
        validator.validate(&builder.build().unwrap())
    };

    assert!(check("SELECT * FROM dict_items WHERE name = 'x'", None).passed());
    assert!(check("SELECT * FROM orders WHERE order_no = ?", None).passed());
    assert!(check("SELECT * FROM orders WHERE name = 'y'", Some("OrderMapper.selectAll")).passed());
    assert!(check("SELECT * FROM orders WHERE name = 'z'", Some("OrderMapper.search")).has_rule("GUARD006"));
}

// GUARD007 - GUARD011

#[test]
fn test_stacked_statements() {
    let result = validate("SELECT * FROM t WHERE id = 1; DROP TABLE t");
    assert!(result.has_rule("GUARD007"));
    assert_eq!(result.risk(), RiskLevel::Critical);
}

#[test]
fn test_semicolon_in_literal_is_not_stacked() {
    assert!(!validate("SELECT * FROM t WHERE id = 1 AND note = 'a;b'").has_rule("GUARD007"));
}

#[test]
fn test_backslash_does_not_escape_quote_in_postgres() {
    let sql = r"SELECT * FROM users WHERE name = '\'; DROP TABLE users; --' AND id = 1";

    let mut config = base_config();
    config.dialect = SqlDialect::PostgreSQL;
    let result = validate_with(config, sql);
    assert!(result.has_rule("GUARD007"));
    assert!(result.has_rule("GUARD009"));
    assert_eq!(result.risk(), RiskLevel::Critical);

    // generic dialect scans both ways
    let result = validate(sql);
    assert!(result.has_rule("GUARD007"));
    assert!(result.has_rule("GUARD009"));

    let result = validate_with(mysql_config(), sql);
    assert!(!result.has_rule("GUARD007"));
    assert!(!result.has_rule("GUARD009"));
}

#[test]
fn test_union_is_flagged() {
    let result =
        validate("SELECT name FROM users WHERE id = 1 UNION SELECT password FROM admins WHERE id = 1");
    assert!(result.has_rule("GUARD008"));
}

#[test]
fn test_allowed_set_operation() {
    let mut config = base_config();
    config.rules.set_operation.allowed_operations = vec![String::from("UNION ALL")];
    let result = validate_with(
        config,
        "SELECT a FROM t1 WHERE id = 1 UNION ALL SELECT a FROM t2 WHERE id = 2"
    );
    assert!(!result.has_rule("GUARD008"));
}

#[test]
fn test_sql_comment() {
    let result = validate("SELECT * FROM t WHERE id = 1 -- AND tenant = 2");
    assert!(result.has_rule("GUARD009"));
}

#[test]
fn test_hint_comment_allowed() {
    let sql = "SELECT /*+ INDEX(t idx) */ * FROM t WHERE id = 1";
    assert!(validate(sql).has_rule("GUARD009"));

    let mut config = base_config();
    config.rules.sql_comment.allow_hint_comments = true;
    assert!(!validate_with(config, sql).has_rule("GUARD009"));
}

#[test]
fn test_into_outfile() {
    let result = validate("SELECT * FROM users WHERE id = 1 INTO OUTFILE '/tmp/users.txt'");
    let violation = result
        .violations()
        .iter()
        .find(|v| v.rule_id == "GUARD010")
        .unwrap();
    assert!(violation.message.starts_with("INTO OUTFILE"));
    assert_eq!(violation.details.get("path").unwrap(), "/tmp/users.txt");
}

#[test]
fn test_dangerous_function_in_where() {
    let result = validate("SELECT * FROM users WHERE id = 1 AND SLEEP(5) = 0");
    let violation = result
        .violations()
        .iter()
        .find(|v| v.rule_id == "GUARD011")
        .unwrap();
    assert_eq!(violation.details.get("function").unwrap(), "sleep");
}

#[test]
fn test_waitfor_statement() {
    assert!(validate("WAITFOR DELAY '00:00:05'").has_rule("GUARD011"));
}

#[test]
fn test_function_name_in_literal_is_ignored() {
    assert!(!validate("SELECT * FROM t WHERE id = 1 AND note = 'sleep(5)'").has_rule("GUARD011"));
}

#[test]
fn test_dangerous_function_wrapped_in_expressions() {
    let validator = Validator::new(mysql_config()).unwrap();
    let check = |sql: &str| validator.validate(&SqlContext::new(sql).unwrap());

    for sql in [
        "SELECT SUBSTRING(LOAD_FILE('/etc/passwd'),1,100) FROM dual WHERE id = 1",
        "SELECT TRIM(LOAD_FILE('/etc/passwd')) FROM dual WHERE id = 1",
        "SELECT * FROM users WHERE id = 1 AND (1, SLEEP(5)) = (1, 0)",
        "SELECT * FROM users WHERE id = 1 AND EXTRACT(YEAR FROM SLEEP(5)) = 0",
        "SELECT * FROM users WHERE id = 1 AND name LIKE CONCAT('%', SLEEP(5))",
        "SELECT * FROM users WHERE id = 1 ORDER BY (SELECT SLEEP(5))",
        "SELECT * FROM users WHERE id = 1 AND CASE WHEN id = 1 THEN BENCHMARK(1000, MD5(1)) END"
    ] {
        let result = check(sql);
        assert!(result.has_rule("GUARD011"), "{sql}");
        assert_eq!(result.risk(), RiskLevel::Critical, "{sql}");
    }
}

#[test]
fn test_dangerous_function_in_join_condition() {
    let validator = Validator::new(mysql_config()).unwrap();
    let check = |sql: &str| validator.validate(&SqlContext::new(sql).unwrap());

    for sql in [
        "SELECT * FROM a JOIN b ON a.id = b.id AND SLEEP(5) = 0 WHERE a.id = 1",
        "SELECT * FROM a LEFT JOIN b ON a.id = b.id AND SLEEP(5) = 0 WHERE a.id = 1",
        "SELECT * FROM a RIGHT JOIN b ON a.id = b.id AND SLEEP(5) = 0 WHERE a.id = 1"
    ] {
        assert!(check(sql).has_rule("GUARD011"), "{sql}");
    }
}

#[test]
fn test_dangerous_function_in_update_assignment() {
    let result =
        validate("UPDATE users SET name = SUBSTRING(LOAD_FILE('/etc/passwd'), 1, 10) WHERE id = 1");
    assert!(result.has_rule("GUARD011"));
}

#[test]
fn test_filter_inside_function_is_selective() {
    let validator = Validator::new(mysql_config()).unwrap();
    let check = |sql: &str| validator.validate(&SqlContext::new(sql).unwrap());

    for sql in [
        "DELETE FROM orders WHERE deleted = 0 AND EXTRACT(YEAR FROM created_at) = 2020",
        "DELETE FROM orders WHERE deleted = 0 AND SUBSTRING(order_no,1,3) = 'ABC'",
        "DELETE FROM orders WHERE deleted = 0 AND (user_id, shop_id) IN ((1, 2))",
        "DELETE FROM orders WHERE status = 1 AND TRIM(order_no) = 'A1'"
    ] {
        let result = check(sql);
        assert!(!result.has_rule("GUARD003"), "{sql}");
        assert!(result.passed(), "{sql}");
    }
    assert!(check("DELETE FROM orders WHERE deleted = 0 AND status = 1").has_rule("GUARD003"));
}

// GUARD012 - GUARD017

#[test]
fn test_ddl_operation() {
    let result = validate("DROP TABLE users");
    assert_eq!(rule_ids(&result), vec!["GUARD012"]);
    assert_eq!(
        result.violations()[0].message,
        "DDL operation DROP TABLE is not allowed at runtime"
    );
    assert!(validate("TRUNCATE TABLE logs").has_rule("GUARD012"));
}

#[test]
fn test_allowed_ddl_operation() {
    let mut config = base_config();
    config.rules.ddl_operation.allowed_operations = vec![String::from("create")];
    assert!(!validate_with(config.clone(), "CREATE TABLE t (id INT)").has_rule("GUARD012"));
    assert!(validate_with(config, "ALTER TABLE t ADD COLUMN b INT").has_rule("GUARD012"));
}

#[test]
fn test_call_statement() {
    let result = validate("CALL refresh_stats(1)");
    let violation = result
        .violations()
        .iter()
        .find(|v| v.rule_id == "GUARD013")
        .unwrap();
    assert_eq!(violation.details.get("procedure").unwrap(), "refresh_stats");
    assert!(validate("EXEC sp_who").has_rule("GUARD013"));
}

#[test]
fn test_denied_table() {
    let mut config = base_config();
    config.rules.denied_table.denied_tables =
        vec![String::from("sys_*"), String::from("mysql.user")];
    let validator = Validator::new(config).unwrap();
    let check = |sql: &str| validator.validate(&SqlContext::new(sql).unwrap());

    assert!(check("SELECT * FROM sys_user WHERE id = 1").has_rule("GUARD014"));
    assert!(!check("SELECT * FROM sys_user_role WHERE id = 1").has_rule("GUARD014"));
    assert!(check("SELECT * FROM mysql.user WHERE id = 1").has_rule("GUARD014"));

    let result =
        check("SELECT * FROM orders WHERE id = 3 AND user_id IN (SELECT id FROM sys_config)");
    let violation = result
        .violations()
        .iter()
        .find(|v| v.rule_id == "GUARD014")
        .unwrap();
    assert_eq!(violation.details.get("table").unwrap(), "sys_config");
}

#[test]
fn test_denied_table_in_nested_subquery() {
    let mut config = mysql_config();
    config.rules.denied_table.denied_tables = vec![String::from("sys_*")];
    let validator = Validator::new(config).unwrap();
    let check = |sql: &str| validator.validate(&SqlContext::new(sql).unwrap());

    for sql in [
        "SELECT SUBSTRING((SELECT pwd FROM sys_user LIMIT 1),1,5) FROM t WHERE id = 1",
        "SELECT * FROM t WHERE id = 1 AND (1, 2) = (SELECT 1, 2 FROM sys_user LIMIT 1)",
        "SELECT * FROM t JOIN u ON u.id = (SELECT id FROM sys_role LIMIT 1) WHERE t.id = 1",
        "UPDATE t SET a = (SELECT pwd FROM sys_user LIMIT 1) WHERE id = 1"
    ] {
        assert!(check(sql).has_rule("GUARD014"), "{sql}");
    }
}

#[test]
fn test_read_only_table() {
    let mut config = base_config();
    config.rules.read_only_table.readonly_tables =
        vec![String::from("audit_log"), String::from("hist_*")];
    let validator = Validator::new(config).unwrap();
    let check = |sql: &str| validator.validate(&SqlContext::new(sql).unwrap());

    let result = check("UPDATE audit_log SET a = 1 WHERE id = 1");
    assert_eq!(rule_ids(&result), vec!["GUARD015"]);
    assert_eq!(result.risk(), RiskLevel::High);
    assert!(check("INSERT INTO hist_orders (id) VALUES (1)").has_rule("GUARD015"));
    assert!(check("SELECT * FROM audit_log WHERE id = 1").passed());
}

#[test]
fn test_metadata_statement() {
    assert!(validate("SHOW TABLES").has_rule("GUARD016"));
    let result = validate("DESC users");
    assert_eq!(
        result.violations()[0].details.get("statement").unwrap(),
        "DESCRIBE"
    );

    let mut config = base_config();
    config.rules.metadata_statement.allowed_statements = vec![String::from("SHOW")];
    assert!(!validate_with(config, "SHOW TABLES").has_rule("GUARD016"));
}

#[test]
fn test_set_statement() {
    let result = validate("SET autocommit = 0");
    assert_eq!(result.violations()[0].details.get("variable").unwrap(), "autocommit");

    let result = validate("SET SESSION sql_mode = ''");
    assert_eq!(result.violations()[0].details.get("variable").unwrap(), "sql_mode");
}

// Parse failures

#[test]
fn test_parse_failure_fail_open_runs_text_checkers() {
    let result = validate("SELEC * FROM t; DROP TABLE t");
    assert!(result.details().contains_key("parse_error"));
    assert!(!result.has_rule("PARSE"));
    assert!(result.has_rule("GUARD007"));
}

#[test]
fn test_parse_failure_fail_open_passes_plain_garbage() {
    let result = validate("SELEC * FORM t");
    assert!(result.passed());
    assert!(result.details().contains_key("parse_error"));
}

#[test]
fn test_parse_failure_fail_closed() {
    let mut config = base_config();
    config.parse_failure = ParseFailureMode::FailClosed;
    let result = validate_with(config, "SELEC * FORM t");
    assert!(result.has_rule("PARSE"));
    assert_eq!(result.risk(), RiskLevel::Critical);
}

// Configuration effects

#[test]
fn test_disabled_rules() {
    let mut config = base_config();
    config.rules.disabled = vec![String::from("GUARD001"), String::from("guard006")];
    assert!(validate_with(config, "SELECT * FROM log").passed());
}

#[test]
fn test_toggle_disables_rule() {
    let mut config = base_config();
    config.rules.no_where_clause.enabled = false;
    let result = validate_with(config, "UPDATE accounts SET balance = 0");
    assert!(result.passed());
}

#[test]
fn test_severity_override() {
    let mut config = base_config();
    config
        .rules
        .severity
        .insert(String::from("GUARD003"), RiskLevel::Low);
    let result = validate_with(config, "DELETE FROM user WHERE deleted = 0");
    assert_eq!(result.risk(), RiskLevel::Low);
}

#[test]
fn test_toggle_risk_override() {
    let mut config = base_config();
    config.rules.no_where_clause.risk = Some(RiskLevel::Medium);
    let result = validate_with(config, "UPDATE accounts SET balance = 0");
    assert_eq!(result.risk(), RiskLevel::Medium);
}

#[test]
fn test_master_switch() {
    let mut config = base_config();
    config.enabled = false;
    assert!(validate_with(config, "DROP TABLE users").passed());
}

#[test]
fn test_dedup_skips_repeat() {
    let validator = Validator::new(GuardConfig::default()).unwrap();
    let ctx = SqlContext::new("SELECT * FROM repeat_log").unwrap();

    let first = validator.validate(&ctx);
    assert!(first.has_rule("GUARD001"));

    let second = validator.validate(&ctx);
    assert!(second.passed());
    assert_eq!(second.details().get("deduplicated").unwrap(), "true");
}

#[test]
fn test_check_blocks() {
    let validator = Validator::new(base_config()).unwrap();
    let err = validator
        .check(&SqlContext::new("DROP TABLE users").unwrap())
        .unwrap_err();
    match err {
        GuardError::Blocked(blocked) => {
            assert_eq!(blocked.risk, RiskLevel::Critical);
            assert_eq!(blocked.messages.len(), 1);
            assert_eq!(blocked.sql_snippet, "DROP TABLE users");
        }
        other => panic!("expected a blocked error, got {:?}", other)
    }
}

#[test]
fn test_check_warn_proceeds() {
    let mut config = base_config();
    config.violation_strategy = ViolationStrategy::Warn;
    let validator = Validator::new(config).unwrap();
    let result = validator
        .check(&SqlContext::new("DROP TABLE users").unwrap())
        .unwrap();
    assert!(result.has_rule("GUARD012"));
}

#[test]
fn test_config_swap_rebuilds_chain() {
    let validator = Validator::new(base_config()).unwrap();
    let ctx = SqlContext::new("SHOW TABLES").unwrap();
    assert!(validator.validate(&ctx).has_rule("GUARD016"));

    let mut config = base_config();
    config.rules.disabled = vec![String::from("GUARD016")];
    validator.handle().swap(config).unwrap();
    assert!(validator.validate(&ctx).passed());
}

// Runner

#[test]
fn test_catalog_lists_every_checker() {
    let catalog = RuleRunner::catalog();
    assert_eq!(catalog.len(), 17);
    for (i, info) in catalog.iter().enumerate() {
        assert_eq!(info.id, format!("GUARD{:03}", i + 1));
    }
}

#[test]
fn test_runner_rules_reflect_config() {
    let mut config = base_config();
    config.rules.disabled = vec![String::from("GUARD017")];
    config
        .rules
        .severity
        .insert(String::from("GUARD006"), RiskLevel::Low);
    let runner = RuleRunner::with_config(&config);
    assert_eq!(runner.len(), 16);
    let no_pagination = runner.rules().find(|r| r.id == "GUARD006").unwrap();
    assert_eq!(no_pagination.risk, RiskLevel::Low);
}

#[test]
fn test_runner_direct() {
    let sql = "DELETE FROM orders";
    let statement = parse(sql, SqlDialect::Generic).unwrap();
    let ctx = SqlContext::new(sql).unwrap();
    let check_ctx = CheckContext::new(&ctx, Some(&statement));
    let violations = RuleRunner::new().run(&check_ctx);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].rule_id, "GUARD001");
}

#[test]
fn test_runner_without_statement_runs_text_checkers_only() {
    let ctx = SqlContext::new("DELETE FROM orders; SHOW TABLES").unwrap();
    let check_ctx = CheckContext::new(&ctx, None);
    let violations = RuleRunner::new().run(&check_ctx);
    let ids: Vec<_> = violations.iter().map(|v| v.rule_id).collect();
    assert_eq!(ids, vec!["GUARD007"]);
}
