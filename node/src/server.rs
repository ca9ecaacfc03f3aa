// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! HTTP surfaces.
//!
//! - admin router: route registry inspection and `/metrics`
//! - dispatcher router: a development dispatcher over [`MemoryLedger`],
//!   the server side of [`crate::ledger::http::HttpLedger`]

use crate::errors::NodeError;
use crate::ledger::http::{EventQuery, HeadResponse};
use crate::ledger::memory::MemoryLedger;
use crate::ledger::{DispatcherCall, LedgerEvent, LogRecord};
use crate::registry::{RouteInfo, RouteRegistry};
use airport_kernel::types::Destination;
use axum::body::Body;
use axum::extract::{Path, Query, Request as AxumRequest, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub type SharedRegistry = Arc<RouteRegistry>;
pub type SharedDispatcher = Arc<MemoryLedger>;

async fn auth_guard(
    State(token): State<Arc<Option<String>>>,
    req: AxumRequest,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(token_str) = &*token {
        let auth_header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|val| val.to_str().ok())
            .filter(|val| val.starts_with("Bearer "));

        if let Some(val) = auth_header {
            let provided = val.trim_start_matches("Bearer ");
            if provided == token_str {
                return Ok(next.run(req).await);
            }
        }
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

fn with_auth(app: Router, auth_token: Option<String>) -> Router {
    if let Some(token) = auth_token {
        tracing::info!("Auth Enabled: Bearer token required");
        let auth_state = Arc::new(Some(token));
        app.layer(from_fn_with_state(auth_state, auth_guard))
    } else {
        tracing::warn!("Auth Disabled: No token configured");
        app
    }
}

pub fn build_admin_router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/v1/routes", get(list_routes))
        .route("/v1/routes/:destination", get(get_route))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

pub fn build_dispatcher_router(ledger: SharedDispatcher, auth_token: Option<String>) -> Router {
    let app = Router::new()
        .route("/v1/events", get(event_history).post(emit_event))
        .route("/v1/events/stream", get(event_stream))
        .route("/v1/head", get(head))
        .route("/v1/calls", get(list_calls).post(submit_call))
        .layer(TraceLayer::new_for_http())
        .with_state(ledger);

    with_auth(app, auth_token)
}

async fn list_routes(State(registry): State<SharedRegistry>) -> Json<Vec<RouteInfo>> {
    Json(registry.list().await)
}

async fn get_route(
    State(registry): State<SharedRegistry>,
    Path(destination): Path<String>,
) -> Result<Json<RouteInfo>, NodeError> {
    let destination: Destination = destination.parse()?;
    Ok(Json(registry.get(&destination).await?))
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}

async fn event_history(
    State(ledger): State<SharedDispatcher>,
    Query(query): Query<EventQuery>,
) -> Result<Json<Vec<LogRecord>>, NodeError> {
    let records = ledger.history(query.filter(), query.from_block.unwrap_or(0), query.to_block)?;
    Ok(Json(records))
}

async fn emit_event(
    State(ledger): State<SharedDispatcher>,
    Json(event): Json<LedgerEvent>,
) -> Result<Json<LogRecord>, NodeError> {
    Ok(Json(ledger.emit(event)?))
}

/// NDJSON stream of live events for one filter. The subscription is open
/// before the response headers go out.
async fn event_stream(State(ledger): State<SharedDispatcher>, Query(query): Query<EventQuery>) -> Body {
    let subscription = ledger.open_subscription(query.filter());

    let lines = futures::stream::unfold(subscription, |mut subscription| async move {
        let item = subscription.next().await?;
        let line = match item {
            Ok(record) => serde_json::to_string(&record)
                .map(|json| json + "\n")
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
        };
        Some((line, subscription))
    });

    Body::from_stream(lines)
}

async fn head(State(ledger): State<SharedDispatcher>) -> Result<Json<HeadResponse>, NodeError> {
    Ok(Json(HeadResponse { block: ledger.head()? }))
}

async fn list_calls(State(ledger): State<SharedDispatcher>) -> Json<Vec<DispatcherCall>> {
    Json(ledger.calls())
}

async fn submit_call(
    State(ledger): State<SharedDispatcher>,
    Json(call): Json<DispatcherCall>,
) -> Result<StatusCode, NodeError> {
    ledger.record_call(call)?;
    Ok(StatusCode::ACCEPTED)
}
