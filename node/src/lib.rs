// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod retry;
pub mod ledger;
pub mod registry;
pub mod replay;
pub mod dispatch;
pub mod airport;
pub mod server;
