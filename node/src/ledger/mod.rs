// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Ledger Gateway
//!
//! The dispatcher ledger is the only channel between airports. This module
//! defines what the node consumes from it:
//! - live event subscriptions by topic filter
//! - historical event queries by topic filter and block range
//! - transaction submission (`DispatcherCall`)
//!
//! # Implementations
//! - [`memory::MemoryLedger`]: in-process ordered log (tests, dev dispatcher)
//! - [`http::HttpLedger`]: client for the dev dispatcher's HTTP surface
//!
//! Listeners consume subscriptions through [`feed::EventFeed`].

pub mod feed;
pub mod memory;
pub mod http;

use airport_kernel::digest::Digest;
use airport_kernel::landing::Submission;
use airport_kernel::policy::RoutePolicy;
use airport_kernel::types::{AirportCode, DefaultPermission, Destination, Nonce, OperatorAddress};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    /// A single event could not be decoded. The stream itself is healthy.
    #[error("event decode error: {0}")]
    Decode(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("subscription closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    NewRouteLaunched,
    FlightPlanSubmitted,
    RouteTerminated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewRouteLaunched => "NewRouteLaunched",
            EventKind::FlightPlanSubmitted => "FlightPlanSubmitted",
            EventKind::RouteTerminated => "RouteTerminated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A route was opened between `origin` and `destination`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLaunched {
    pub origin: AirportCode,
    pub destination: Destination,
    #[serde(default)]
    pub writers: Vec<OperatorAddress>,
    pub default_permission: String,
    #[serde(default)]
    pub reroute: bool,
    /// Address the origin announced; informational only.
    #[serde(default)]
    pub origin_ip: Option<Ipv4Addr>,
}

impl RouteLaunched {
    pub fn policy(&self) -> RoutePolicy {
        RoutePolicy::new(
            self.writers.iter().copied(),
            DefaultPermission::from_event_str(&self.default_permission),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTerminated {
    pub origin: AirportCode,
    pub destination: Destination,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum LedgerEvent {
    NewRouteLaunched(RouteLaunched),
    FlightPlanSubmitted(Submission),
    RouteTerminated(RouteTerminated),
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LedgerEvent::NewRouteLaunched(_) => EventKind::NewRouteLaunched,
            LedgerEvent::FlightPlanSubmitted(_) => EventKind::FlightPlanSubmitted,
            LedgerEvent::RouteTerminated(_) => EventKind::RouteTerminated,
        }
    }

    /// First indexed topic: the origin for route events, the destination
    /// for flight plans.
    pub fn topic(&self) -> AirportCode {
        match self {
            LedgerEvent::NewRouteLaunched(e) => e.origin,
            LedgerEvent::FlightPlanSubmitted(s) => s.destination,
            LedgerEvent::RouteTerminated(e) => e.origin,
        }
    }
}

/// One event as placed in the ledger's total order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub block_number: u64,
    pub log_index: u64,
    pub event: LedgerEvent,
}

impl LogRecord {
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicFilter {
    pub kind: EventKind,
    pub topic: AirportCode,
}

impl TopicFilter {
    pub fn route_launched(origin: AirportCode) -> Self {
        Self { kind: EventKind::NewRouteLaunched, topic: origin }
    }

    pub fn route_terminated(origin: AirportCode) -> Self {
        Self { kind: EventKind::RouteTerminated, topic: origin }
    }

    pub fn flight_plans(destination: Destination) -> Self {
        Self { kind: EventKind::FlightPlanSubmitted, topic: destination }
    }

    pub fn matches(&self, event: &LedgerEvent) -> bool {
        event.kind() == self.kind && event.topic() == self.topic
    }
}

/// Transactions this node sends to the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", content = "args", rename_all = "camelCase")]
pub enum DispatcherCall {
    ConstructAirport { code: AirportCode, ip: Ipv4Addr },
    CloseAirport { code: AirportCode },
    DestroyAirport { code: AirportCode },
    /// Attestation of one landed flight plan.
    ReportPos {
        code: AirportCode,
        destination: Destination,
        nonce: Nonce,
        digest: Digest,
    },
}

impl DispatcherCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            DispatcherCall::ConstructAirport { .. } => "constructAirport",
            DispatcherCall::CloseAirport { .. } => "closeAirport",
            DispatcherCall::DestroyAirport { .. } => "destroyAirport",
            DispatcherCall::ReportPos { .. } => "reportPos",
        }
    }
}

/// Live event stream for one filter.
///
/// Holds the task pumping events into the channel; dropping the
/// subscription releases it.
pub struct Subscription {
    rx: mpsc::Receiver<Result<LogRecord>>,
    pump: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<Result<LogRecord>>, pump: JoinHandle<()>) -> Self {
        Self { rx, pump: Some(pump) }
    }

    /// Next item; `None` once the stream has closed.
    pub async fn next(&mut self) -> Option<Result<LogRecord>> {
        self.rx.recv().await
    }

    fn release(&mut self) {
        self.rx.close();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Buffer depth between a pump task and its subscriber.
pub const SUBSCRIPTION_BUFFER: usize = 256;

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Start a live subscription. Events emitted after this returns are
    /// delivered in ledger order.
    async fn subscribe(&self, filter: TopicFilter) -> Result<Subscription>;

    /// Events matching `filter` in `[from_block, to_block]`, ledger order.
    /// `to_block = None` means up to the current head.
    async fn query_history(&self, filter: TopicFilter, from_block: u64, to_block: Option<u64>) -> Result<Vec<LogRecord>>;

    /// Latest block number.
    async fn head_block(&self) -> Result<u64>;

    async fn submit(&self, call: DispatcherCall) -> Result<()>;
}

pub type SharedLedger = Arc<dyn LedgerGateway>;
