// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use clap::Parser;
use sql_guard::cli::{Cli, Commands, Dialect, Format, LogLevel, Strategy};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("sql-guard").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_check_defaults() {
    let cli = parse(&["check", "SELECT 1"]);

    assert!(matches!(cli.log_level, LogLevel::Warn));
    assert!(!cli.json_logs);
    match cli.command {
        Commands::Check {
            sql,
            file,
            dialect,
            strategy,
            output_format,
            verbose,
            no_color,
            ..
        } => {
            assert_eq!(sql.as_deref(), Some("SELECT 1"));
            assert!(file.is_none());
            assert!(dialect.is_none());
            assert!(strategy.is_none());
            assert!(matches!(output_format, Format::Text));
            assert!(!verbose);
            assert!(!no_color);
        }
        other => panic!("unexpected command {:?}", other)
    }
}

#[test]
fn test_check_all_flags() {
    let cli = parse(&[
        "--log-level",
        "debug",
        "--json-logs",
        "check",
        "--dialect",
        "mysql",
        "--caller",
        "UserMapper.selectAll",
        "--datasource",
        "primary",
        "--strategy",
        "warn",
        "-o",
        "json",
        "-v",
        "--no-color",
        "SELECT * FROM users"
    ]);

    assert!(matches!(cli.log_level, LogLevel::Debug));
    assert!(cli.json_logs);
    match cli.command {
        Commands::Check {
            dialect,
            caller,
            datasource,
            strategy,
            output_format,
            verbose,
            no_color,
            ..
        } => {
            assert!(matches!(dialect, Some(Dialect::Mysql)));
            assert_eq!(caller.as_deref(), Some("UserMapper.selectAll"));
            assert_eq!(datasource.as_deref(), Some("primary"));
            assert!(matches!(strategy, Some(Strategy::Warn)));
            assert!(matches!(output_format, Format::Json));
            assert!(verbose);
            assert!(no_color);
        }
        other => panic!("unexpected command {:?}", other)
    }
}

#[test]
fn test_check_file_conflicts_with_sql() {
    let result = Cli::try_parse_from(["sql-guard", "check", "-f", "query.sql", "SELECT 1"]);
    assert!(result.is_err());
}

#[test]
fn test_check_rejects_unknown_strategy() {
    let result = Cli::try_parse_from(["sql-guard", "check", "--strategy", "ignore", "SELECT 1"]);
    assert!(result.is_err());
}

#[test]
fn test_rewrite_defaults() {
    let cli = parse(&["rewrite", "SELECT * FROM orders"]);
    match cli.command {
        Commands::Rewrite {
            sql,
            dialect,
            max_rows,
            enforce,
            output_format,
            ..
        } => {
            assert_eq!(sql.as_deref(), Some("SELECT * FROM orders"));
            assert_eq!(dialect, "mysql");
            assert!(max_rows.is_none());
            assert!(!enforce);
            assert!(matches!(output_format, Format::Text));
        }
        other => panic!("unexpected command {:?}", other)
    }
}

#[test]
fn test_rewrite_flags() {
    let cli = parse(&[
        "rewrite",
        "-d",
        "SQL Server",
        "--max-rows",
        "50",
        "--enforce",
        "-f",
        "query.sql"
    ]);
    match cli.command {
        Commands::Rewrite {
            sql,
            file,
            dialect,
            max_rows,
            enforce,
            ..
        } => {
            assert!(sql.is_none());
            assert_eq!(file.unwrap().to_str(), Some("query.sql"));
            assert_eq!(dialect, "SQL Server");
            assert_eq!(max_rows, Some(50));
            assert!(enforce);
        }
        other => panic!("unexpected command {:?}", other)
    }
}

#[test]
fn test_global_config_flag() {
    let cli = parse(&["rules", "--config", "guard.yaml"]);
    assert_eq!(cli.config.unwrap().to_str(), Some("guard.yaml"));
}

#[test]
fn test_listing_commands() {
    assert!(matches!(
        parse(&["dialects", "-o", "yaml"]).command,
        Commands::Dialects {
            output_format: Format::Yaml
        }
    ));
    assert!(matches!(
        parse(&["rules", "--no-color"]).command,
        Commands::Rules {
            no_color: true,
            ..
        }
    ));
}

#[test]
fn test_missing_subcommand() {
    assert!(Cli::try_parse_from(["sql-guard"]).is_err());
}

#[test]
fn test_log_level_as_str() {
    assert_eq!(LogLevel::Error.as_str(), "error");
    assert_eq!(LogLevel::Warn.as_str(), "warn");
    assert_eq!(LogLevel::Info.as_str(), "info");
    assert_eq!(LogLevel::Debug.as_str(), "debug");
    assert_eq!(LogLevel::Trace.as_str(), "trace");
}
