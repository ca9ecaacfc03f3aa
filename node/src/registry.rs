// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Route Registry
//!
//! The only place routes are created and destroyed. One entry per
//! destination; installing a route for a destination that already has one
//! terminates the old instance first, so at most one listener is ever live
//! per destination.
//!
//! Entries are immutable after insertion. Listeners never write here except
//! to retire their own instance when they fail.

use airport_kernel::policy::RoutePolicy;
use airport_kernel::types::{DefaultPermission, Destination, OperatorAddress};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no active route to {0}")]
    NotFound(Destination),
}

struct Route {
    instance: u64,
    policy: Arc<RoutePolicy>,
    liveness: CancellationToken,
    listener: Option<JoinHandle<()>>,
    launched_block: u64,
    reroute: bool,
}

/// What a freshly installed route's listener needs to start.
pub struct RouteTicket {
    pub instance: u64,
    pub liveness: CancellationToken,
    /// Listener of the instance this one replaced, if any. Await it before
    /// touching the destination's store.
    pub previous: Option<JoinHandle<()>>,
}

/// Read-only view of a registered route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub destination: Destination,
    pub instance: u64,
    pub writers: Vec<OperatorAddress>,
    pub default_permission: DefaultPermission,
    pub reroute: bool,
    pub launched_block: u64,
}

impl RouteInfo {
    fn from_route(destination: Destination, route: &Route) -> Self {
        Self {
            destination,
            instance: route.instance,
            writers: route.policy.writers.iter().copied().collect(),
            default_permission: route.policy.default_permission,
            reroute: route.reroute,
            launched_block: route.launched_block,
        }
    }
}

#[derive(Default)]
pub struct RouteRegistry {
    routes: Mutex<HashMap<Destination, Route>>,
    next_instance: AtomicU64,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a route and spawn its listener under the registry lock.
    ///
    /// `spawn` receives the ticket for the new instance and returns the
    /// listener's handle. Any existing route for `destination` has its
    /// liveness signal fired first.
    pub async fn launch<F>(
        &self,
        destination: Destination,
        policy: Arc<RoutePolicy>,
        liveness: CancellationToken,
        launched_block: u64,
        reroute: bool,
        spawn: F,
    ) -> u64
    where
        F: FnOnce(RouteTicket) -> JoinHandle<()>,
    {
        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed) + 1;
        let mut routes = self.routes.lock().await;

        let previous = routes.remove(&destination).and_then(|old| {
            tracing::info!(destination = %destination, "Replacing route instance {}", old.instance);
            old.liveness.cancel();
            old.listener
        });

        let listener = spawn(RouteTicket {
            instance,
            liveness: liveness.clone(),
            previous,
        });

        routes.insert(
            destination,
            Route {
                instance,
                policy,
                liveness,
                listener: Some(listener),
                launched_block,
                reroute,
            },
        );
        metrics::gauge!("airport_routes_active", routes.len() as f64);
        instance
    }

    /// Fire the route's liveness signal and drop it from the registry.
    /// Returns the listener handle so callers may wait for it to drain.
    pub async fn terminate(&self, destination: &Destination) -> Option<JoinHandle<()>> {
        let mut routes = self.routes.lock().await;
        let route = routes.remove(destination)?;
        route.liveness.cancel();
        metrics::gauge!("airport_routes_active", routes.len() as f64);
        route.listener
    }

    /// Remove `instance` if it is still the registered one. Used by a
    /// listener that can no longer serve its route.
    pub async fn retire(&self, destination: &Destination, instance: u64) -> bool {
        let mut routes = self.routes.lock().await;
        match routes.get(destination) {
            Some(route) if route.instance == instance => {
                if let Some(route) = routes.remove(destination) {
                    route.liveness.cancel();
                }
                metrics::gauge!("airport_routes_active", routes.len() as f64);
                true
            }
            _ => false,
        }
    }

    pub async fn terminate_all(&self) -> Vec<JoinHandle<()>> {
        let mut routes = self.routes.lock().await;
        let handles = routes
            .drain()
            .filter_map(|(_, route)| {
                route.liveness.cancel();
                route.listener
            })
            .collect();
        metrics::gauge!("airport_routes_active", 0.0);
        handles
    }

    pub async fn is_active(&self, destination: &Destination) -> bool {
        self.routes.lock().await.contains_key(destination)
    }

    pub async fn get(&self, destination: &Destination) -> Result<RouteInfo, RegistryError> {
        self.routes
            .lock()
            .await
            .get(destination)
            .map(|route| RouteInfo::from_route(*destination, route))
            .ok_or(RegistryError::NotFound(*destination))
    }

    /// Every active route, ordered by destination.
    pub async fn list(&self) -> Vec<RouteInfo> {
        let routes = self.routes.lock().await;
        let mut infos: Vec<RouteInfo> = routes
            .iter()
            .map(|(destination, route)| RouteInfo::from_route(*destination, route))
            .collect();
        infos.sort_by_key(|info| info.destination);
        infos
    }

    pub async fn len(&self) -> usize {
        self.routes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.routes.lock().await.is_empty()
    }
}
