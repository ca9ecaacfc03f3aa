// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Flight plan classification.
//!
//! A flight plan is raw SQL text that may hold several statements. Before
//! anything touches a store, the whole text is parsed with the SQLite
//! grammar and every statement is tagged:
//!
//! | kind                 | is_write | captures_rows | rewrite              |
//! |----------------------|----------|---------------|----------------------|
//! | INSERT/UPDATE/DELETE | true     | true          | `RETURNING *` added  |
//! | SELECT / WITH        | false    | true          | none                 |
//! | anything else        | true     | false         | none                 |
//!
//! A parse failure anywhere rejects the whole plan. There is no partial
//! classification.

use crate::error::{KernelError, Result};
use sqlparser::ast::Statement as SqlStatement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

const RETURNING_ALL: &str = " RETURNING *";

/// One parsed unit of a flight plan, in execution order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    /// Normalized text, as it will be executed.
    pub text: String,
    pub is_write: bool,
    /// Execution must read back a result set that feeds the digest.
    pub captures_rows: bool,
}

/// A fully classified flight plan.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ClassifiedPlan {
    pub statements: Vec<Statement>,
    /// True if any statement writes (DDL included).
    pub is_write: bool,
}

impl ClassifiedPlan {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Parse and classify raw flight plan text.
pub fn classify(query: &str) -> Result<ClassifiedPlan> {
    let parsed = Parser::parse_sql(&SQLiteDialect {}, query)
        .map_err(|e| KernelError::Parse(e.to_string()))?;

    let statements: Vec<Statement> = parsed.iter().map(classify_statement).collect();
    let is_write = statements.iter().any(|s| s.is_write);

    Ok(ClassifiedPlan { statements, is_write })
}

fn classify_statement(stmt: &SqlStatement) -> Statement {
    let text = stmt.to_string();
    match stmt {
        SqlStatement::Insert(insert) => row_returning_write(text, insert.returning.is_some()),
        SqlStatement::Update { returning, .. } => row_returning_write(text, returning.is_some()),
        SqlStatement::Delete(delete) => row_returning_write(text, delete.returning.is_some()),
        SqlStatement::Query(_) => Statement {
            text,
            is_write: false,
            captures_rows: true,
        },
        _ => Statement {
            text,
            is_write: true,
            captures_rows: false,
        },
    }
}

fn row_returning_write(mut text: String, has_returning: bool) -> Statement {
    // An explicit RETURNING list is kept; a second clause would not parse.
    if !has_returning {
        text.push_str(RETURNING_ALL);
    }
    Statement {
        text,
        is_write: true,
        captures_rows: true,
    }
}
