// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Catch-Up Replayer
//!
//! Rebuilds a destination's store from the ledger's full flight plan history
//! before a rerouted route goes live. Every historical submission goes
//! through the same landing pipeline as live traffic, without attestation.
//!
//! Replay is all-or-nothing: a denial, an unparsable flight plan or an
//! undecodable history aborts it, and the route is not started.

use crate::ledger::{EventKind, LedgerError, LedgerEvent, LedgerGateway, LogRecord, TopicFilter};
use airport_kernel::landing::{land, LandingError};
use airport_kernel::policy::RoutePolicy;
use airport_kernel::store::RouteStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("ledger error during replay: {0}")]
    Ledger(#[from] LedgerError),

    #[error("replay aborted at block {block}: {source}")]
    Landing {
        block: u64,
        #[source]
        source: LandingError,
    },

    #[error("unexpected {kind} event at block {block} in flight plan history")]
    UnexpectedEvent { block: u64, kind: EventKind },

    #[error("replay task failed: {0}")]
    Task(String),
}

/// Block range covered by a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayCursor {
    pub from_block: u64,
    pub to_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub cursor: ReplayCursor,
    pub submissions: usize,
    /// BLAKE3 chain over `(nonce, digest)` of every replayed flight plan.
    pub fingerprint: blake3::Hash,
}

/// Replay `[0, head]` into `store` and hand the store back.
pub async fn replay_route(
    gateway: &dyn LedgerGateway,
    store: RouteStore,
    policy: Arc<RoutePolicy>,
) -> Result<(RouteStore, ReplaySummary), ReplayError> {
    let started = Instant::now();
    let destination = store.destination();

    let cursor = ReplayCursor {
        from_block: 0,
        to_block: gateway.head_block().await?,
    };
    let history = gateway
        .query_history(TopicFilter::flight_plans(destination), cursor.from_block, Some(cursor.to_block))
        .await?;
    tracing::info!(
        "Reroute: replaying {} flight plans (blocks {}..={})",
        history.len(),
        cursor.from_block,
        cursor.to_block
    );

    let (store, applied) = tokio::task::spawn_blocking(move || {
        let applied = apply_history(&store, &policy, history);
        (store, applied)
    })
    .await
    .map_err(|e| ReplayError::Task(e.to_string()))?;
    let (submissions, fingerprint) = applied?;

    let elapsed = started.elapsed();
    metrics::histogram!("airport_replay_duration_seconds", elapsed.as_secs_f64());
    tracing::info!(
        "Reroute complete: {} flight plans in {:?}, fingerprint {}",
        submissions,
        elapsed,
        fingerprint
    );

    Ok((
        store,
        ReplaySummary {
            cursor,
            submissions,
            fingerprint,
        },
    ))
}

/// Land each historical flight plan in order. Stops at the first failure.
pub fn apply_history(
    store: &RouteStore,
    policy: &RoutePolicy,
    history: Vec<LogRecord>,
) -> Result<(usize, blake3::Hash), ReplayError> {
    let mut chain = blake3::Hasher::new();
    let mut submissions = 0;

    for record in history {
        let block = record.block_number;
        let submission = match record.event {
            LedgerEvent::FlightPlanSubmitted(submission) => submission,
            other => {
                return Err(ReplayError::UnexpectedEvent {
                    block,
                    kind: other.kind(),
                })
            }
        };

        let report = land(store, policy, &submission).map_err(|source| ReplayError::Landing { block, source })?;
        tracing::debug!("Replayed flight plan {} from block {}: {}", submission.nonce, block, report.digest);

        chain.update(&submission.nonce.0.to_le_bytes());
        chain.update(report.digest.as_bytes());
        submissions += 1;
    }

    Ok((submissions, chain.finalize()))
}
