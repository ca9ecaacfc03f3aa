// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::ledger::LedgerError;
use crate::registry::RegistryError;
use crate::replay::ReplayError;
use airport_kernel::error::KernelError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            NodeError::Registry(e @ RegistryError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            NodeError::Ledger(LedgerError::Rejected(msg)) => (StatusCode::BAD_REQUEST, msg),
            NodeError::Ledger(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            NodeError::Kernel(KernelError::InvalidInput(msg)) | NodeError::Kernel(KernelError::Parse(msg)) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            NodeError::Kernel(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            NodeError::Replay(e) => (StatusCode::CONFLICT, e.to_string()),
            NodeError::Config(msg) | NodeError::Telemetry(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
