// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Dispatch Loops
//!
//! Two airport-scoped loops live as long as the process:
//! - route-launched: installs routes in the registry
//! - route-terminated: fires a route's liveness signal
//!
//! Each active route runs one flight plan listener. It owns the
//! destination's store and lands submissions strictly in ledger order,
//! attesting each digest back to the dispatcher.

use crate::ledger::feed::{EventFeed, FeedItem};
use crate::ledger::{
    DispatcherCall, LedgerError, LedgerEvent, RouteLaunched, SharedLedger, Subscription, TopicFilter,
};
use crate::registry::{RouteRegistry, RouteTicket};
use crate::replay::replay_route;
use crate::retry::RetryPolicy;
use airport_kernel::landing::{land, LandingError, Submission};
use airport_kernel::policy::RoutePolicy;
use airport_kernel::store::RouteStore;
use airport_kernel::types::{AirportCode, Destination};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub struct Airport {
    code: AirportCode,
    gateway: SharedLedger,
    registry: Arc<RouteRegistry>,
    database_dir: PathBuf,
    retry: RetryPolicy,
    shutdown: CancellationToken,
}

/// Handles of the two airport-scoped loops. They return only once the
/// airport shuts down.
pub struct AirportLoops {
    pub launched: JoinHandle<()>,
    pub terminated: JoinHandle<()>,
}

impl Airport {
    pub fn new(
        code: AirportCode,
        gateway: SharedLedger,
        registry: Arc<RouteRegistry>,
        database_dir: impl Into<PathBuf>,
        retry: RetryPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            code,
            gateway,
            registry,
            database_dir: database_dir.into(),
            retry,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn code(&self) -> AirportCode {
        self.code
    }

    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// Subscribe both airport-scoped loops, then spawn them. Events past the
    /// current head are seen, including ones emitted before this returns.
    pub async fn start(self: &Arc<Self>) -> Result<AirportLoops, LedgerError> {
        let head = self.gateway.head_block().await?;
        let launched_feed = self.open_feed(TopicFilter::route_launched(self.code), head).await?;
        let terminated_feed = self.open_feed(TopicFilter::route_terminated(self.code), head).await?;

        let span = tracing::info_span!("airport", scope = "general");
        let launched = tokio::spawn(
            Arc::clone(self)
                .run_route_launched_loop(launched_feed)
                .instrument(span.clone()),
        );
        let terminated = tokio::spawn(
            Arc::clone(self)
                .run_route_terminated_loop(terminated_feed)
                .instrument(span),
        );

        tracing::info!(scope = "general", "Airport {} listening for routes after block {}", self.code, head);
        Ok(AirportLoops { launched, terminated })
    }

    async fn open_feed(&self, filter: TopicFilter, head: u64) -> Result<EventFeed, LedgerError> {
        let subscription = self.gateway.subscribe(filter).await?;
        let mut feed = EventFeed::new(self.gateway.clone(), filter, self.retry.clone(), self.shutdown.clone())
            .with_subscription(subscription);
        feed.resume_after(head).await?;
        Ok(feed)
    }

    async fn run_route_launched_loop(self: Arc<Self>, mut feed: EventFeed) {
        loop {
            match feed.next().await {
                FeedItem::Record(record) => match record.event {
                    LedgerEvent::NewRouteLaunched(launched) => {
                        self.launch_route(record.block_number, launched).await;
                    }
                    other => tracing::warn!("Unexpected {} event on route launch stream", other.kind()),
                },
                FeedItem::Cancelled => {
                    tracing::info!("Route launch listener stopped");
                    return;
                }
                FeedItem::Failed(e) => {
                    tracing::error!("Route launch stream keeps failing, resubscribing: {}", e);
                    feed.recover();
                }
            }
        }
    }

    async fn run_route_terminated_loop(self: Arc<Self>, mut feed: EventFeed) {
        loop {
            match feed.next().await {
                FeedItem::Record(record) => match record.event {
                    LedgerEvent::RouteTerminated(terminated) if terminated.origin == self.code => {
                        self.terminate_route(&terminated.destination).await;
                    }
                    LedgerEvent::RouteTerminated(terminated) => {
                        tracing::debug!("Ignoring termination from origin {}", terminated.origin);
                    }
                    other => tracing::warn!("Unexpected {} event on route termination stream", other.kind()),
                },
                FeedItem::Cancelled => {
                    tracing::info!("Route termination listener stopped");
                    return;
                }
                FeedItem::Failed(e) => {
                    tracing::error!("Route termination stream keeps failing, resubscribing: {}", e);
                    feed.recover();
                }
            }
        }
    }

    /// Install a route for `launched.destination` and start its listener.
    pub async fn launch_route(&self, block: u64, launched: RouteLaunched) {
        if launched.origin != self.code {
            tracing::debug!("Ignoring route launched by {}", launched.origin);
            return;
        }
        let destination = launched.destination;
        let policy = Arc::new(launched.policy());
        let default_permission = policy.default_permission;

        // Open the live stream before anything else; replay reads history up
        // to a head taken after this point.
        let filter = TopicFilter::flight_plans(destination);
        let subscription = match self.gateway.subscribe(filter).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                tracing::warn!(destination = %destination, "Flight plan subscription failed, listener will retry: {}", e);
                None
            }
        };

        let liveness = self.shutdown.child_token();
        let instance = self
            .registry
            .launch(destination, policy.clone(), liveness, block, launched.reroute, |ticket| {
                let listener = RouteListener {
                    code: self.code,
                    destination,
                    gateway: self.gateway.clone(),
                    registry: self.registry.clone(),
                    policy,
                    database_dir: self.database_dir.clone(),
                    retry: self.retry.clone(),
                    launched_block: block,
                    reroute: launched.reroute,
                };
                let span = tracing::info_span!("route", destination = %destination);
                tokio::spawn(listener.run(ticket, subscription).instrument(span))
            })
            .await;

        tracing::info!(
            destination = %destination,
            "Route launched at block {} (instance {}, default {}, {} writers, reroute: {})",
            block,
            instance,
            default_permission,
            launched.writers.len(),
            launched.reroute
        );
    }

    pub async fn terminate_route(&self, destination: &Destination) -> bool {
        match self.registry.terminate(destination).await {
            Some(_) => {
                tracing::info!(destination = %destination, "Route terminated");
                true
            }
            None => {
                tracing::warn!(destination = %destination, "Termination for a route that is not active");
                false
            }
        }
    }

    /// Stop both loops and every route, then wait for route listeners to
    /// finish the flight plan they are on.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let listeners = self.registry.terminate_all().await;
        tracing::info!(scope = "general", "Waiting for {} route listeners", listeners.len());
        futures::future::join_all(listeners).await;
    }
}

struct RouteListener {
    code: AirportCode,
    destination: Destination,
    gateway: SharedLedger,
    registry: Arc<RouteRegistry>,
    policy: Arc<RoutePolicy>,
    database_dir: PathBuf,
    retry: RetryPolicy,
    launched_block: u64,
    reroute: bool,
}

impl RouteListener {
    async fn run(self, ticket: RouteTicket, subscription: Option<Subscription>) {
        let RouteTicket {
            instance,
            liveness,
            previous,
        } = ticket;

        if let Some(previous) = previous {
            let _ = previous.await;
        }

        let mut store = match RouteStore::open(&self.database_dir, self.destination) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!("Cannot open store, failing route: {}", e);
                self.registry.retire(&self.destination, instance).await;
                return;
            }
        };

        let filter = TopicFilter::flight_plans(self.destination);
        let mut feed = EventFeed::new(self.gateway.clone(), filter, self.retry.clone(), liveness);
        if let Some(subscription) = subscription {
            feed = feed.with_subscription(subscription);
        }

        if self.reroute {
            match replay_route(self.gateway.as_ref(), store, self.policy.clone()).await {
                Ok((replayed, summary)) => {
                    store = replayed;
                    feed.skip_through(summary.cursor.to_block);
                }
                Err(e) => {
                    tracing::error!("Reroute failed, route not started: {}", e);
                    self.registry.retire(&self.destination, instance).await;
                    return;
                }
            }
        } else {
            // Anchors back-fill if the stream has to be reopened.
            feed.skip_through(self.launched_block);
        }

        tracing::info!("Accepting flight plans");
        loop {
            match feed.next().await {
                FeedItem::Record(record) => match record.event {
                    LedgerEvent::FlightPlanSubmitted(submission) if submission.destination == self.destination => {
                        store = match self.land_and_attest(store, submission).await {
                            Some(store) => store,
                            None => {
                                self.registry.retire(&self.destination, instance).await;
                                return;
                            }
                        };
                    }
                    other => tracing::warn!("Unexpected {} event on flight plan stream", other.kind()),
                },
                FeedItem::Cancelled => {
                    tracing::info!("Route closed, listener exiting");
                    return;
                }
                FeedItem::Failed(e) => {
                    tracing::error!("Flight plan stream lost, failing route: {}", e);
                    self.registry.retire(&self.destination, instance).await;
                    return;
                }
            }
        }
    }

    /// Land one flight plan off the async runtime and attest its digest.
    /// `None` means the store was lost and the route cannot continue.
    async fn land_and_attest(&self, store: RouteStore, submission: Submission) -> Option<RouteStore> {
        let nonce = submission.nonce;
        let policy = self.policy.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let outcome = land(&store, &policy, &submission);
            (store, outcome)
        })
        .await;
        let (store, outcome) = match joined {
            Ok(landed) => landed,
            Err(e) => {
                tracing::error!("Landing flight plan {} panicked: {}", nonce, e);
                return None;
            }
        };

        match outcome {
            Ok(report) => {
                metrics::counter!("airport_flight_plans_total", 1, "outcome" => "landed");
                if report.failed > 0 {
                    metrics::counter!("airport_statement_failures_total", report.failed as u64);
                }
                tracing::info!(
                    "Flight plan {} landed: {} statements, {} failed, digest {}",
                    nonce,
                    report.executed,
                    report.failed,
                    report.digest
                );

                let attestation = DispatcherCall::ReportPos {
                    code: self.code,
                    destination: self.destination,
                    nonce,
                    digest: report.digest,
                };
                match self.gateway.submit(attestation).await {
                    Ok(()) => {
                        metrics::counter!("airport_attestations_total", 1);
                    }
                    Err(e) => tracing::error!("Attestation for flight plan {} failed: {}", nonce, e),
                }
            }
            Err(e @ LandingError::Denied { .. }) => {
                metrics::counter!("airport_flight_plans_total", 1, "outcome" => "denied");
                tracing::warn!("{}", e);
            }
            Err(e @ LandingError::Parse { .. }) => {
                metrics::counter!("airport_flight_plans_total", 1, "outcome" => "rejected");
                tracing::error!("{}", e);
            }
        }

        Some(store)
    }
}
