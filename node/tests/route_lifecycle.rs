// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
mod common;

use airport_kernel::landing::land;
use airport_kernel::policy::RoutePolicy;
use airport_kernel::store::RouteStore;
use airport_kernel::types::{AirportCode, DefaultPermission, Nonce};
use airport_node::ledger::memory::MemoryLedger;
use common::*;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::time::{sleep, Duration};

const CREATE: &str = "CREATE TABLE t (a INTEGER, b TEXT)";
const INSERT: &str = "INSERT INTO t VALUES (1,'a')";

fn count_rows(dir: &std::path::Path, destination: AirportCode) -> i64 {
    let store = RouteStore::open(dir, destination).unwrap();
    store
        .connection()
        .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
        .unwrap()
}

#[tokio::test]
async fn test_allow_listed_insert_is_attested() {
    init_tracing();
    let dir = tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    let code = airport.code();
    let destination = AirportCode::generate();

    ledger.emit(launched(code, destination, "closed", false)).unwrap();
    wait_route(&airport, destination, true).await;

    ledger.emit(flight_plan(destination, 0, CREATE, WRITER)).unwrap();
    ledger.emit(flight_plan(destination, 1, INSERT, WRITER)).unwrap();
    wait_for("two attestations", || attested_nonces(&ledger, code, destination).len() == 2).await;

    // Same sequence on a scratch store gives the attested digest.
    let scratch = RouteStore::open_in_memory(destination).unwrap();
    let policy = RoutePolicy::new([WRITER], DefaultPermission::Closed);
    let expected: Vec<_> = [(0, CREATE), (1, INSERT)]
        .into_iter()
        .map(|(nonce, query)| {
            let submission = airport_kernel::landing::Submission {
                destination,
                nonce: Nonce(nonce),
                query: query.to_string(),
                operator: WRITER,
            };
            (destination, Nonce(nonce), land(&scratch, &policy, &submission).unwrap().digest)
        })
        .collect();
    assert_eq!(ledger.attestations(code), expected);

    airport.shutdown().await;
    assert_eq!(count_rows(dir.path(), destination), 1);
}

#[tokio::test]
async fn test_denied_flight_plan_is_dropped_without_attestation() {
    init_tracing();
    let dir = tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    let code = airport.code();
    let destination = AirportCode::generate();

    ledger.emit(launched(code, destination, "closed", false)).unwrap();
    wait_route(&airport, destination, true).await;

    ledger.emit(flight_plan(destination, 0, CREATE, WRITER)).unwrap();
    ledger.emit(flight_plan(destination, 1, INSERT, STRANGER)).unwrap();
    // Reads are never gated, so the stranger's SELECT still lands.
    ledger.emit(flight_plan(destination, 2, "SELECT * FROM t", STRANGER)).unwrap();

    wait_for("select attested", || attested_nonces(&ledger, code, destination).contains(&2)).await;
    assert_eq!(attested_nonces(&ledger, code, destination), vec![0, 2]);
    assert!(airport.registry().is_active(&destination).await, "Denial must not stop the route");

    airport.shutdown().await;
    assert_eq!(count_rows(dir.path(), destination), 0);
}

#[tokio::test]
async fn test_open_route_accepts_any_writer() {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    let code = airport.code();
    let destination = AirportCode::generate();

    // Legacy "write" is the same as "open".
    ledger.emit(launched(code, destination, "write", false)).unwrap();
    wait_route(&airport, destination, true).await;

    ledger.emit(flight_plan(destination, 0, CREATE, STRANGER)).unwrap();
    ledger.emit(flight_plan(destination, 1, INSERT, STRANGER)).unwrap();
    wait_for("two attestations", || attested_nonces(&ledger, code, destination).len() == 2).await;

    airport.shutdown().await;
    assert_eq!(count_rows(dir.path(), destination), 1);
}

#[tokio::test]
async fn test_unparsable_flight_plan_executes_nothing() {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    let code = airport.code();
    let destination = AirportCode::generate();

    ledger.emit(launched(code, destination, "closed", false)).unwrap();
    wait_route(&airport, destination, true).await;

    ledger.emit(flight_plan(destination, 0, CREATE, WRITER)).unwrap();
    ledger.emit(flight_plan(destination, 1, "INSERT INTO t VALUES (1,'a'); garbage !!", WRITER)).unwrap();
    ledger.emit(flight_plan(destination, 2, "SELECT * FROM t", WRITER)).unwrap();

    wait_for("select attested", || attested_nonces(&ledger, code, destination).contains(&2)).await;
    assert_eq!(attested_nonces(&ledger, code, destination), vec![0, 2]);

    airport.shutdown().await;
    assert_eq!(count_rows(dir.path(), destination), 0);
}

#[tokio::test]
async fn test_termination_stops_processing() {
    init_tracing();
    let dir = tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    let code = airport.code();
    let destination = AirportCode::generate();

    ledger.emit(launched(code, destination, "closed", false)).unwrap();
    wait_route(&airport, destination, true).await;
    ledger.emit(flight_plan(destination, 0, CREATE, WRITER)).unwrap();
    wait_for("create attested", || attested_nonces(&ledger, code, destination) == vec![0]).await;

    ledger.emit(terminated(code, destination)).unwrap();
    wait_route(&airport, destination, false).await;

    ledger.emit(flight_plan(destination, 1, INSERT, WRITER)).unwrap();
    sleep(Duration::from_millis(200)).await;

    assert_eq!(attested_nonces(&ledger, code, destination), vec![0]);
    airport.shutdown().await;
    assert_eq!(count_rows(dir.path(), destination), 0);
}

#[tokio::test]
async fn test_relaunch_after_termination_is_a_fresh_route() {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    let code = airport.code();
    let destination = AirportCode::generate();

    ledger.emit(launched(code, destination, "closed", false)).unwrap();
    wait_route(&airport, destination, true).await;
    let first = airport.registry().get(&destination).await.unwrap().instance;

    ledger.emit(terminated(code, destination)).unwrap();
    wait_route(&airport, destination, false).await;

    ledger.emit(launched(code, destination, "closed", false)).unwrap();
    wait_route(&airport, destination, true).await;
    let second = airport.registry().get(&destination).await.unwrap().instance;
    assert_ne!(first, second);

    ledger.emit(flight_plan(destination, 0, CREATE, WRITER)).unwrap();
    ledger.emit(flight_plan(destination, 1, INSERT, WRITER)).unwrap();
    wait_for("two attestations", || attested_nonces(&ledger, code, destination).len() == 2).await;
    airport.shutdown().await;
    assert_eq!(count_rows(dir.path(), destination), 1);
}

#[tokio::test]
async fn test_routes_for_other_airports_are_ignored() {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    let destination = AirportCode::generate();

    ledger.emit(launched(AirportCode::generate(), destination, "open", false)).unwrap();
    sleep(Duration::from_millis(100)).await;

    assert!(!airport.registry().is_active(&destination).await);
    airport.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_loops_and_routes() {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (airport, loops) = start_airport(&ledger, dir.path()).await;
    let code = airport.code();

    for _ in 0..3 {
        ledger.emit(launched(code, AirportCode::generate(), "closed", false)).unwrap();
    }
    wait_route_count(&airport, 3).await;

    airport.shutdown().await;
    assert!(airport.registry().is_empty().await);
    assert!(loops.launched.await.is_ok());
    assert!(loops.terminated.await.is_ok());
}

#[tokio::test]
async fn test_airport_loops_survive_ledger_outage() {
    init_tracing();
    let dir = tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (airport, loops) = start_airport(&ledger, dir.path()).await;
    let code = airport.code();

    let flapping = ledger.clone();
    let outage = tokio::spawn(async move {
        loop {
            flapping.interrupt_subscriptions("ledger unreachable");
            sleep(Duration::from_millis(1)).await;
        }
    });
    sleep(Duration::from_millis(500)).await;
    outage.abort();
    let _ = outage.await;

    assert!(!loops.launched.is_finished(), "Route launch loop must outlive the outage");
    assert!(!loops.terminated.is_finished(), "Route termination loop must outlive the outage");

    let destination = AirportCode::generate();
    ledger.emit(launched(code, destination, "closed", false)).unwrap();
    wait_route(&airport, destination, true).await;
    ledger.emit(terminated(code, destination)).unwrap();
    wait_route(&airport, destination, false).await;

    airport.shutdown().await;
    assert!(loops.launched.await.is_ok());
    assert!(loops.terminated.await.is_ok());
}

#[tokio::test]
async fn test_route_launch_survives_stream_blip() {
    let dir = tempdir().unwrap();
    let ledger = Arc::new(MemoryLedger::new());
    let (airport, _loops) = start_airport(&ledger, dir.path()).await;
    let code = airport.code();
    let destination = AirportCode::generate();

    // Two errors force a resubscribe while the launch is still buffered.
    ledger.interrupt_subscriptions("blip");
    ledger.interrupt_subscriptions("blip");
    ledger.emit(launched(code, destination, "closed", false)).unwrap();

    wait_route(&airport, destination, true).await;
    airport.shutdown().await;
}
