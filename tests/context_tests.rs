use std::sync::Arc;

use serde_json::json;
use sql_guard::{
    cache::{self, StatementScope},
    context::{PaginationHint, SqlContext},
    query::{
        CommandKind, SqlDialect, parse,
        scan::{CommentKind, QuoteStyle, leading_keyword, scan, scan_with, split_statements}
    }
};

#[test]
fn test_builder_infers_kind() {
    let ctx = SqlContext::new("update t set a = 1 where id = 2").unwrap();
    assert_eq!(ctx.kind(), CommandKind::Update);
    assert!(ctx.caller_id().is_none());
    assert!(ctx.statement().is_none());
}

#[test]
fn test_builder_explicit_kind_wins() {
    let ctx = SqlContext::builder("CALL refresh()")
        .kind(CommandKind::Update)
        .build()
        .unwrap();
    assert_eq!(ctx.kind(), CommandKind::Update);
}

#[test]
fn test_builder_kind_from_statement() {
    let statement = parse("DELETE FROM t WHERE id = 1", SqlDialect::Generic).unwrap();
    let ctx = SqlContext::builder("DELETE FROM t WHERE id = 1")
        .statement(statement)
        .build()
        .unwrap();
    assert_eq!(ctx.kind(), CommandKind::Delete);
    assert!(ctx.statement().is_some());
}

#[test]
fn test_builder_rejects_empty_sql() {
    assert!(SqlContext::new("").is_err());
    assert!(SqlContext::new("  \n ").is_err());
}

#[test]
fn test_builder_fields() {
    let ctx = SqlContext::builder("SELECT * FROM t WHERE id = :id")
        .caller_id("UserMapper.findById")
        .datasource("primary")
        .execution_layer("mybatis")
        .param("id", 7)
        .build()
        .unwrap();
    assert_eq!(ctx.caller_id(), Some("UserMapper.findById"));
    assert_eq!(ctx.datasource(), Some("primary"));
    assert_eq!(ctx.execution_layer(), Some("mybatis"));
    assert_eq!(ctx.params().len(), 1);
}

#[test]
fn test_param_lookup_spellings() {
    let ctx = SqlContext::builder("SELECT 1")
        .param("id", 7)
        .param("1", "first")
        .param("name", json!("bob"))
        .build()
        .unwrap();
    assert_eq!(ctx.param("id"), Some(&json!(7)));
    assert_eq!(ctx.param(":id"), Some(&json!(7)));
    assert_eq!(ctx.param("#{id}"), Some(&json!(7)));
    assert_eq!(ctx.param("@name"), Some(&json!("bob")));
    assert_eq!(ctx.param("$1"), Some(&json!("first")));
    assert!(ctx.param("missing").is_none());
}

#[test]
fn test_pagination_hint() {
    let ctx = SqlContext::builder("SELECT * FROM t")
        .pagination(20, 10)
        .build()
        .unwrap();
    assert_eq!(ctx.pagination(), Some(PaginationHint::new(20, 10)));
}

#[test]
fn test_unbounded_pagination_is_ignored() {
    let ctx = SqlContext::builder("SELECT * FROM t")
        .pagination(0, u64::MAX)
        .build()
        .unwrap();
    assert!(PaginationHint::UNBOUNDED.is_unbounded());
    assert!(ctx.pagination().is_none());
}

#[test]
fn test_statement_or_parse_fills_slot_once() {
    let _scope = StatementScope::enter();
    let ctx = SqlContext::new("SELECT * FROM t WHERE id = 1").unwrap();
    let first = ctx.statement_or_parse(SqlDialect::Generic).unwrap();
    let second = ctx.statement_or_parse(SqlDialect::Generic).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(ctx.statement().is_some());
    assert_eq!(cache::cached_len(), 1);
}

#[test]
fn test_statement_or_parse_error() {
    let _scope = StatementScope::enter();
    let ctx = SqlContext::new("SELEC broken").unwrap();
    assert!(ctx.statement_or_parse(SqlDialect::Generic).is_err());
    assert!(ctx.statement().is_none());
}

#[test]
fn test_with_sql_replaces_text_and_statement() {
    let ctx = SqlContext::builder("SELECT * FROM t")
        .caller_id("Mapper.list")
        .build()
        .unwrap();
    let rewritten = ctx.with_sql("SELECT * FROM t LIMIT 10", None);
    assert_eq!(rewritten.sql(), "SELECT * FROM t LIMIT 10");
    assert_eq!(rewritten.caller_id(), Some("Mapper.list"));
    assert!(rewritten.statement().is_none());
    assert_eq!(ctx.sql(), "SELECT * FROM t");
}

#[test]
fn test_scan_strips_comments_and_literals() {
    let result = scan("SELECT 'a;b -- x' FROM t -- trailing\n/* note */ WHERE id = 1");
    assert!(!result.code.contains("note"));
    assert!(!result.code.contains("trailing"));
    assert!(result.code.contains("''"));
    assert_eq!(result.comments.len(), 2);
    assert_eq!(result.comments[0].kind, CommentKind::Line);
    assert_eq!(result.comments[1].kind, CommentKind::Block);
    assert!(!result.is_stacked());
}

#[test]
fn test_scan_comment_kinds() {
    let result = scan("SELECT /*+ INDEX(t) */ * FROM t # mysql");
    assert_eq!(result.comments[0].kind, CommentKind::Hint);
    assert_eq!(result.comments[1].kind, CommentKind::Hash);
}

#[test]
fn test_scan_mybatis_placeholder_not_comment() {
    let result = scan("SELECT * FROM t WHERE id = #{id}");
    assert!(result.comments.is_empty());
}

#[test]
fn test_scan_backslash_quoting_rules() {
    let sql = r"SELECT * FROM users WHERE name = '\'; DROP TABLE users; --' AND id = 1";

    let mysql = scan_with(sql, QuoteStyle::Backslash);
    assert!(!mysql.is_stacked());
    assert!(mysql.comments.is_empty());

    let standard = scan_with(sql, QuoteStyle::Standard);
    assert!(standard.is_stacked());
    assert_eq!(standard.statements[1], "DROP TABLE users");
    assert_eq!(standard.comments[0].kind, CommentKind::Line);
}

#[test]
fn test_scan_escape_string_prefix() {
    let sql = r"SELECT * FROM t WHERE a = E'it\'s; -- fine' AND b = 'x\'";
    let result = scan_with(sql, QuoteStyle::Standard);
    assert!(!result.is_stacked());
    assert!(result.comments.is_empty());

    let suffix = scan_with(r"SELECT * FROM t WHERE type'\' ; DELETE FROM t", QuoteStyle::Standard);
    assert!(suffix.is_stacked());
}

#[test]
fn test_quote_style_for_dialect() {
    assert_eq!(QuoteStyle::for_dialect(SqlDialect::MySQL), &[QuoteStyle::Backslash]);
    assert_eq!(QuoteStyle::for_dialect(SqlDialect::PostgreSQL), &[QuoteStyle::Standard]);
    assert_eq!(QuoteStyle::for_dialect(SqlDialect::Generic).len(), 2);
}

#[test]
fn test_split_statements() {
    let parts = split_statements("SELECT 1; SELECT ';'; ; -- only comment\n");
    assert_eq!(parts, vec!["SELECT 1", "SELECT ';'"]);
    assert!(split_statements("  ;; ").is_empty());
}

#[test]
fn test_leading_keyword() {
    assert_eq!(leading_keyword("  /* c */ (select 1)"), "SELECT");
    assert_eq!(leading_keyword("-- only\n"), "");
}
