// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![allow(dead_code)]

use airport_kernel::landing::Submission;
use airport_kernel::types::{AirportCode, Nonce, OperatorAddress};
use airport_node::dispatch::{Airport, AirportLoops};
use airport_node::ledger::memory::MemoryLedger;
use airport_node::ledger::{LedgerEvent, RouteLaunched, RouteTerminated, SharedLedger};
use airport_node::registry::RouteRegistry;
use airport_node::retry::RetryPolicy;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

pub const WRITER: OperatorAddress = OperatorAddress([0xAA; 20]);
pub const STRANGER: OperatorAddress = OperatorAddress([0xBB; 20]);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("airport_node=debug").try_init();
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        initial_delay_ms: 5,
        max_delay_ms: 50,
        multiplier: 2.0,
    }
}

const WAIT_LIMIT: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(10);

pub async fn wait_for(what: &str, check: impl Fn() -> bool) {
    let polled = timeout(WAIT_LIMIT, async {
        while !check() {
            sleep(POLL).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "Timed out waiting for {}", what);
}

/// Wait until the route to `destination` is (or is no longer) registered.
pub async fn wait_route(airport: &Airport, destination: AirportCode, active: bool) {
    let polled = timeout(WAIT_LIMIT, async {
        while airport.registry().is_active(&destination).await != active {
            sleep(POLL).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "Timed out waiting for route {} active={}", destination, active);
}

pub async fn wait_route_count(airport: &Airport, count: usize) {
    let polled = timeout(WAIT_LIMIT, async {
        while airport.registry().len().await != count {
            sleep(POLL).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "Timed out waiting for {} routes", count);
}

pub fn launched(origin: AirportCode, destination: AirportCode, permission: &str, reroute: bool) -> LedgerEvent {
    LedgerEvent::NewRouteLaunched(RouteLaunched {
        origin,
        destination,
        writers: vec![WRITER],
        default_permission: permission.to_string(),
        reroute,
        origin_ip: None,
    })
}

pub fn terminated(origin: AirportCode, destination: AirportCode) -> LedgerEvent {
    LedgerEvent::RouteTerminated(RouteTerminated { origin, destination })
}

pub fn flight_plan(destination: AirportCode, nonce: u64, query: &str, operator: OperatorAddress) -> LedgerEvent {
    LedgerEvent::FlightPlanSubmitted(Submission {
        destination,
        nonce: Nonce(nonce),
        query: query.to_string(),
        operator,
    })
}

pub async fn start_airport(ledger: &Arc<MemoryLedger>, dir: &Path) -> (Arc<Airport>, AirportLoops) {
    let gateway: SharedLedger = ledger.clone();
    let airport = Airport::new(
        AirportCode::generate(),
        gateway,
        Arc::new(RouteRegistry::new()),
        dir,
        fast_retry(),
    );
    let loops = airport.start().await.unwrap();
    (airport, loops)
}

/// Attested nonces of `code` for `destination`, in submission order.
pub fn attested_nonces(ledger: &MemoryLedger, code: AirportCode, destination: AirportCode) -> Vec<u64> {
    ledger
        .attestations(code)
        .into_iter()
        .filter(|(d, _, _)| *d == destination)
        .map(|(_, nonce, _)| nonce.0)
        .collect()
}
