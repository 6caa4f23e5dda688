//! Integration tests for the sql-guard binary.

use std::io::Write;

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use predicates::prelude::*;
use tempfile::{Builder, NamedTempFile, TempDir};

/// Runs the binary in an empty directory with no user config or overrides
fn cmd(home: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("sql-guard");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("SQL_GUARD_CONFIG")
        .env_remove("SQL_GUARD_STRATEGY")
        .env_remove("SQL_GUARD_MAX_ROWS")
        .env_remove("SQL_GUARD_ENFORCE_MAX_LIMIT")
        .env_remove("SQL_GUARD_PARSE_FAILURE")
        .env_remove("SQL_GUARD_DEDUP_ENABLED")
        .env_remove("RUST_LOG");
    cmd
}

fn sql_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

#[test]
fn test_check_safe_statement() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["check", "--no-color", "SELECT * FROM orders WHERE id = 42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Statement #1: SAFE"));
}

#[test]
fn test_check_critical_statement_exits_2() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["check", "--no-color", "SELECT * FROM log"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("GUARD001"))
        .stdout(predicate::str::contains("GUARD006"));
}

#[test]
fn test_check_medium_statement_exits_1() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["check", "--no-color", "SET autocommit = 0"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("GUARD017"));
}

#[test]
fn test_check_warn_strategy_exits_0() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["check", "--strategy", "warn", "DROP TABLE users"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GUARD012"));
}

#[test]
fn test_check_strategy_from_env() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .env("SQL_GUARD_STRATEGY", "log")
        .args(["check", "DROP TABLE users"])
        .assert()
        .success();
}

#[test]
fn test_check_json_output() {
    let home = TempDir::new().unwrap();
    let output = cmd(&home)
        .args(["check", "-o", "json", "DELETE FROM user WHERE deleted = 0"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["risk"], "HIGH");
    assert_eq!(
        json["statements"][0]["verdict"]["violations"][0]["rule_id"],
        "GUARD003"
    );
}

#[test]
fn test_check_file_with_statements() {
    let home = TempDir::new().unwrap();
    let file = sql_file("SELECT * FROM orders WHERE id = 1;\nUPDATE orders SET paid = 1;\n");
    cmd(&home)
        .args(["check", "--no-color", "-f", file.path().to_str().unwrap()])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Statement #2: CRITICAL"))
        .stdout(predicate::str::contains("Summary: 2 statement(s)"));
}

#[test]
fn test_check_reads_stdin() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["check", "--no-color", "-f", "-"])
        .write_stdin("SELECT * FROM orders WHERE id = 7")
        .assert()
        .success()
        .stdout(predicate::str::contains("Summary: 1 statement(s), 0 violation(s)"));
}

#[test]
fn test_check_missing_file() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["check", "-f", "/nonexistent/queries.sql"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_check_with_config_file() {
    let home = TempDir::new().unwrap();
    let mut config = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(config, "[rules]\ndisabled = [\"GUARD001\", \"GUARD006\"]").unwrap();

    cmd(&home)
        .args([
            "--config",
            config.path().to_str().unwrap(),
            "check",
            "SELECT * FROM log"
        ])
        .assert()
        .success();
}

#[test]
fn test_invalid_config_fails() {
    let home = TempDir::new().unwrap();
    let mut config = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(config, "violation_strategy = \"explode\"").unwrap();

    cmd(&home)
        .args(["--config", config.path().to_str().unwrap(), "rules"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_local_config_is_discovered() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join(".sql-guard.toml"),
        "violation_strategy = \"warn\"\n"
    )
    .unwrap();

    cmd(&home)
        .args(["check", "DROP TABLE users"])
        .assert()
        .success();
}

#[test]
fn test_rewrite_oracle() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["rewrite", "--no-color", "-d", "oracle", "SELECT * FROM orders"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "SELECT * FROM (SELECT * FROM orders) WHERE ROWNUM <= 1000"
        ));
}

#[test]
fn test_rewrite_max_rows_and_enforce() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args([
            "rewrite",
            "--no-color",
            "--max-rows",
            "100",
            "--enforce",
            "SELECT * FROM orders LIMIT 5000;"
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("SELECT * FROM orders LIMIT 100"));
}

#[test]
fn test_rewrite_unknown_dialect() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["rewrite", "-d", "sqlite", "SELECT * FROM orders"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_dialects_command() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .arg("dialects")
        .assert()
        .success()
        .stdout(predicate::str::contains("Informix"))
        .stdout(predicate::str::contains("RowNum"));
}

#[test]
fn test_rules_command_respects_config() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["rules", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GUARD001"))
        .stdout(predicate::str::contains("GUARD017"));

    let mut config = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(config, "[rules]\ndisabled = [\"GUARD017\"]").unwrap();
    cmd(&home)
        .args(["--config", config.path().to_str().unwrap(), "rules"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GUARD017").not());
}

#[test]
fn test_version_and_help() {
    let home = TempDir::new().unwrap();
    cmd(&home).arg("--version").assert().success();
    cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"));
}
