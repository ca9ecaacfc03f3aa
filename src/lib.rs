// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! airport-kernel: deterministic flight-plan landing for ledger-coordinated SQL replicas.
//!
//! Everything here is synchronous and ledger-agnostic. The async node
//! (`airport-node`) feeds ordered ledger events into [`landing::land`] and
//! attests the resulting [`digest::Digest`].

pub mod error;
pub mod types;
pub mod classify;
pub mod policy;
pub mod digest;
pub mod store;
pub mod landing;

#[cfg(test)]
pub mod tests;
