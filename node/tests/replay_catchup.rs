// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
mod common;

use airport_kernel::store::RouteStore;
use airport_kernel::types::{AirportCode, Nonce};
use airport_node::ledger::memory::MemoryLedger;
use airport_node::ledger::{LedgerEvent, RouteLaunched};
use common::*;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::time::{sleep, Duration};

const HISTORY: [&str; 4] = [
    "CREATE TABLE t (a INTEGER, b TEXT)",
    "INSERT INTO t VALUES (1, 'a')",
    "INSERT INTO t VALUES (2, NULL)",
    "UPDATE t SET b = 'z' WHERE a = 2",
];

/// Row count read alongside a running listener; `None` while the store is
/// busy or the table does not exist yet.
fn try_count_rows(dir: &Path, destination: AirportCode) -> Option<i64> {
    let store = RouteStore::open(dir, destination).ok()?;
    store
        .connection()
        .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
        .ok()
}

fn reroute(origin: AirportCode, destination: AirportCode) -> RouteLaunched {
    match launched(origin, destination, "closed", true) {
        LedgerEvent::NewRouteLaunched(launched) => launched,
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_rerouted_replica_matches_continuous_replica() {
    init_tracing();
    let ledger = Arc::new(MemoryLedger::new());
    let destination = AirportCode::generate();

    // Replica A is online from the start.
    let dir_a = tempdir().unwrap();
    let (online, _loops_a) = start_airport(&ledger, dir_a.path()).await;
    ledger.emit(launched(online.code(), destination, "closed", false)).unwrap();
    wait_route(&online, destination, true).await;

    for (nonce, query) in HISTORY.iter().enumerate() {
        ledger.emit(flight_plan(destination, nonce as u64, query, WRITER)).unwrap();
    }
    wait_for("history attested by A", || {
        attested_nonces(&ledger, online.code(), destination).len() == HISTORY.len()
    })
    .await;

    // Replica B joins late and catches up.
    let dir_b = tempdir().unwrap();
    let (late, _loops_b) = start_airport(&ledger, dir_b.path()).await;
    ledger.emit(launched(late.code(), destination, "closed", true)).unwrap();
    wait_route(&late, destination, true).await;

    let probe = HISTORY.len() as u64;
    ledger.emit(flight_plan(destination, probe, "SELECT * FROM t ORDER BY a", WRITER)).unwrap();
    wait_for("probe attested by both", || {
        attested_nonces(&ledger, online.code(), destination).contains(&probe)
            && attested_nonces(&ledger, late.code(), destination).contains(&probe)
    })
    .await;

    // Replay never attests; only the live probe shows up for B.
    assert_eq!(attested_nonces(&ledger, late.code(), destination), vec![probe]);

    let digest_of = |code: AirportCode| {
        ledger
            .attestations(code)
            .into_iter()
            .find(|(_, nonce, _)| *nonce == Nonce(probe))
            .map(|(_, _, digest)| digest)
            .unwrap()
    };
    assert_eq!(digest_of(online.code()), digest_of(late.code()));

    online.shutdown().await;
    late.shutdown().await;
    assert_eq!(try_count_rows(dir_a.path(), destination), Some(2));
    assert_eq!(try_count_rows(dir_b.path(), destination), Some(2));
}

#[tokio::test]
async fn test_denial_in_history_keeps_route_down() {
    init_tracing();
    let ledger = Arc::new(MemoryLedger::new());
    let destination = AirportCode::generate();

    ledger.emit(flight_plan(destination, 0, HISTORY[0], WRITER)).unwrap();
    ledger.emit(flight_plan(destination, 1, HISTORY[1], STRANGER)).unwrap();
    ledger.emit(flight_plan(destination, 2, HISTORY[2], WRITER)).unwrap();

    let dir = tempdir().unwrap();
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    let head = ledger.head().unwrap();
    airport.launch_route(head, reroute(airport.code(), destination)).await;

    wait_route(&airport, destination, false).await;

    ledger.emit(flight_plan(destination, 3, "SELECT * FROM t", WRITER)).unwrap();
    sleep(Duration::from_millis(200)).await;
    assert!(attested_nonces(&ledger, airport.code(), destination).is_empty());

    airport.shutdown().await;
    assert_eq!(try_count_rows(dir.path(), destination), Some(0));
}

#[tokio::test]
async fn test_unparsable_history_keeps_route_down() {
    let ledger = Arc::new(MemoryLedger::new());
    let destination = AirportCode::generate();

    ledger.emit(flight_plan(destination, 0, HISTORY[0], WRITER)).unwrap();
    ledger.emit(flight_plan(destination, 1, "garbage !!", WRITER)).unwrap();

    let dir = tempdir().unwrap();
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    airport
        .launch_route(ledger.head().unwrap(), reroute(airport.code(), destination))
        .await;

    wait_route(&airport, destination, false).await;
    airport.shutdown().await;
}

#[tokio::test]
async fn test_flight_plan_racing_replay_lands_once() {
    let ledger = Arc::new(MemoryLedger::new());
    let destination = AirportCode::generate();

    ledger.emit(flight_plan(destination, 0, HISTORY[0], WRITER)).unwrap();
    ledger.emit(flight_plan(destination, 1, HISTORY[1], WRITER)).unwrap();

    let dir = tempdir().unwrap();
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    airport
        .launch_route(ledger.head().unwrap(), reroute(airport.code(), destination))
        .await;

    // Lands either through replay or live, never both.
    ledger.emit(flight_plan(destination, 2, HISTORY[2], WRITER)).unwrap();

    wait_for("both inserts landed", || try_count_rows(dir.path(), destination) == Some(2)).await;
    sleep(Duration::from_millis(200)).await;

    // Replay never attests: nonce 2 is attested once if it landed live and
    // not at all if the replay covered it.
    let attested = attested_nonces(&ledger, airport.code(), destination);
    assert!(attested.is_empty() || attested == vec![2], "unexpected attestations {:?}", attested);
    assert!(airport.registry().is_active(&destination).await);

    airport.shutdown().await;
    assert_eq!(try_count_rows(dir.path(), destination), Some(2));
}

#[tokio::test]
async fn test_reroute_with_empty_history_goes_live() {
    let ledger = Arc::new(MemoryLedger::new());
    let destination = AirportCode::generate();
    let dir = tempdir().unwrap();
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;

    ledger.emit(launched(airport.code(), destination, "closed", true)).unwrap();
    wait_route(&airport, destination, true).await;

    ledger.emit(flight_plan(destination, 0, HISTORY[0], WRITER)).unwrap();
    wait_for("first flight plan attested", || {
        attested_nonces(&ledger, airport.code(), destination) == vec![0]
    })
    .await;
    airport.shutdown().await;
}
