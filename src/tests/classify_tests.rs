// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::classify::classify;
use crate::error::KernelError;

#[test]
fn test_insert_is_write_and_returns_rows() {
    let plan = classify("INSERT INTO t VALUES (1, 'a')").unwrap();
    assert_eq!(plan.statements.len(), 1);
    assert!(plan.is_write);

    let stmt = &plan.statements[0];
    assert!(stmt.is_write);
    assert!(stmt.captures_rows);
    assert!(stmt.text.starts_with("INSERT INTO t"));
    assert!(stmt.text.ends_with(" RETURNING *"));
}

#[test]
fn test_update_and_delete_get_returning_clause() {
    let plan = classify("UPDATE t SET b = 'x' WHERE a = 1; DELETE FROM t WHERE a = 2").unwrap();
    assert_eq!(plan.statements.len(), 2);
    for stmt in &plan.statements {
        assert!(stmt.is_write);
        assert!(stmt.captures_rows);
        assert!(stmt.text.ends_with(" RETURNING *"), "missing RETURNING: {}", stmt.text);
    }
    assert!(plan.statements[0].text.starts_with("UPDATE"));
    assert!(plan.statements[1].text.starts_with("DELETE"));
}

#[test]
fn test_explicit_returning_is_not_doubled() {
    let plan = classify("DELETE FROM t WHERE a = 1 RETURNING a").unwrap();
    let text = &plan.statements[0].text;
    assert_eq!(text.matches("RETURNING").count(), 1, "{}", text);
}

#[test]
fn test_select_is_read_that_captures() {
    let plan = classify("SELECT * FROM t").unwrap();
    assert!(!plan.is_write);

    let stmt = &plan.statements[0];
    assert!(!stmt.is_write);
    assert!(stmt.captures_rows);
    assert_eq!(stmt.text, "SELECT * FROM t");
}

#[test]
fn test_ddl_is_write_without_capture() {
    let plan = classify("CREATE TABLE t (a INTEGER, b TEXT)").unwrap();
    assert!(plan.is_write);

    let stmt = &plan.statements[0];
    assert!(stmt.is_write);
    assert!(!stmt.captures_rows);
    assert!(!stmt.text.contains("RETURNING"));
}

#[test]
fn test_any_write_makes_plan_write() {
    let plan = classify("SELECT * FROM t; DROP TABLE t; SELECT 1").unwrap();
    assert_eq!(plan.statements.len(), 3);
    assert!(plan.is_write);
    assert!(!plan.statements[0].is_write);
    assert!(plan.statements[1].is_write);
    assert!(!plan.statements[2].is_write);
}

#[test]
fn test_statement_order_is_preserved() {
    let plan = classify("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (1); SELECT a FROM t").unwrap();
    assert!(plan.statements[0].text.starts_with("CREATE TABLE"));
    assert!(plan.statements[1].text.starts_with("INSERT"));
    assert!(plan.statements[2].text.starts_with("SELECT"));
}

#[test]
fn test_parse_failure_rejects_whole_plan() {
    let result = classify("SELECT * FROM t; garbage !!");
    match result {
        Err(KernelError::Parse(_)) => (),
        other => panic!("Expected parse error, got {:?}", other),
    }
}

#[test]
fn test_empty_text_is_empty_read() {
    let plan = classify("").unwrap();
    assert!(plan.is_empty());
    assert!(!plan.is_write);
}
