// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Per-destination relational store.
//!
//! Every destination has its own SQLite database, `<hex destination>.db`,
//! touched only by that destination's listener (or by the replayer before the
//! listener starts). No schema is imposed here; the flight plans define it.

use crate::classify::{ClassifiedPlan, Statement};
use crate::digest::{format_real, ColumnBytes, Digest, PlanHasher, StatementHasher};
use crate::error::Result;
use crate::types::Destination;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Outcome of running one classified plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub digest: Digest,
    /// Statements that ran to completion.
    pub executed: usize,
    /// Statements that failed and were skipped.
    pub failed: usize,
    /// Row-capturing statements folded into the digest.
    pub captured: usize,
}

pub struct RouteStore {
    destination: Destination,
    path: Option<PathBuf>,
    conn: Connection,
}

impl RouteStore {
    /// Open (or create) the destination's database under `dir`.
    pub fn open(dir: impl AsRef<Path>, destination: Destination) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = Self::path_for(dir, &destination);
        let conn = Connection::open(&path)?;
        Ok(Self {
            destination,
            path: Some(path),
            conn,
        })
    }

    /// Throwaway store, used for offline digests and tests.
    pub fn open_in_memory(destination: Destination) -> Result<Self> {
        Ok(Self {
            destination,
            path: None,
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn path_for(dir: impl AsRef<Path>, destination: &Destination) -> PathBuf {
        dir.as_ref().join(format!("{}.db", destination.to_hex()))
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run the plan's statements in order and fold captured rows into a digest.
    ///
    /// A failing statement is logged and skipped; the rest still run and the
    /// failed statement leaves no trace in the digest.
    pub fn execute(&self, plan: &ClassifiedPlan) -> ExecutionReport {
        let mut plan_hasher = PlanHasher::new();
        let mut executed = 0;
        let mut failed = 0;

        for statement in &plan.statements {
            tracing::debug!(destination = %self.destination, "Query: {}", statement.text);

            let outcome = if statement.captures_rows {
                self.capture(statement).map(Some)
            } else {
                self.run_for_effect(statement).map(|_| None)
            };

            match outcome {
                Ok(Some(statement_hash)) => {
                    plan_hasher.append_statement(&statement_hash);
                    executed += 1;
                }
                Ok(None) => executed += 1,
                Err(e) => {
                    tracing::error!(destination = %self.destination, "Statement failed, skipping: {} ({})", statement.text, e);
                    failed += 1;
                }
            }
        }

        let captured = plan_hasher.statements();
        let digest = plan_hasher.finish();
        tracing::debug!(destination = %self.destination, "Hash: {}", digest);

        ExecutionReport {
            digest,
            executed,
            failed,
            captured,
        }
    }

    fn capture(&self, statement: &Statement) -> rusqlite::Result<[u8; 32]> {
        let mut stmt = self.conn.prepare(&statement.text)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut hasher = StatementHasher::new();

        while let Some(row) = rows.next()? {
            for idx in 0..column_count {
                write_value(&mut hasher, row.get_ref(idx)?);
            }
        }

        Ok(hasher.finish())
    }

    fn run_for_effect(&self, statement: &Statement) -> rusqlite::Result<()> {
        // Stepping through `query` tolerates statements that yield rows (PRAGMA).
        let mut stmt = self.conn.prepare(&statement.text)?;
        let mut rows = stmt.query([])?;
        while rows.next()?.is_some() {}
        Ok(())
    }

    /// Direct read access for inspection and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn write_value(hasher: &mut StatementHasher, value: ValueRef<'_>) {
    match value {
        ValueRef::Null => hasher.write_column(ColumnBytes::Null),
        ValueRef::Integer(i) => hasher.write_column(ColumnBytes::Raw(i.to_string().as_bytes())),
        ValueRef::Real(f) => hasher.write_column(ColumnBytes::Raw(format_real(f).as_bytes())),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => hasher.write_column(ColumnBytes::Raw(bytes)),
    }
}
