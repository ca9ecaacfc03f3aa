// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::errors::NodeError;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const DEFAULT_LOG_FILTER: &str = "airport_node=info,airport_kernel=info,tower_http=info";

/// Install the tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Install the Prometheus recorder and describe the airport metrics.
pub fn init_metrics() -> Result<(), NodeError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| NodeError::Telemetry(e.to_string()))?;

    if PROM_HANDLE.set(handle).is_err() {
        tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
    }

    metrics::describe_counter!("airport_flight_plans_total", "Flight plans seen by route listeners, by outcome");
    metrics::describe_counter!("airport_attestations_total", "Digests reported back to the dispatcher");
    metrics::describe_counter!("airport_statement_failures_total", "Statements that failed and were skipped");
    metrics::describe_gauge!("airport_routes_active", "Routes currently registered");
    metrics::describe_histogram!("airport_replay_duration_seconds", "Time taken to replay a destination's history");

    metrics::gauge!("airport_routes_active", 0.0);
    Ok(())
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
