// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Airport registration with the dispatcher.
//!
//! Failures here are fatal to the process; callers propagate them.

use crate::ledger::{DispatcherCall, LedgerError, LedgerGateway};
use airport_kernel::types::AirportCode;
use std::net::Ipv4Addr;

/// Register a freshly generated airport code announcing `ip`.
pub async fn construct(gateway: &dyn LedgerGateway, ip: Ipv4Addr) -> Result<AirportCode, LedgerError> {
    let code = AirportCode::generate();
    gateway.submit(DispatcherCall::ConstructAirport { code, ip }).await?;
    tracing::info!(scope = "general", "Constructed airport {} at {}", code, ip);
    Ok(code)
}

pub async fn close(gateway: &dyn LedgerGateway, code: AirportCode) -> Result<(), LedgerError> {
    gateway.submit(DispatcherCall::CloseAirport { code }).await?;
    tracing::info!(scope = "general", "Closed airport {}", code);
    Ok(())
}

pub async fn destroy(gateway: &dyn LedgerGateway, code: AirportCode) -> Result<(), LedgerError> {
    gateway.submit(DispatcherCall::DestroyAirport { code }).await?;
    tracing::info!(scope = "general", "Destroyed airport {}", code);
    Ok(())
}
