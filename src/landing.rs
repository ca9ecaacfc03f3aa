// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Landing a flight plan: classify → authorize → execute.
//!
//! Live processing and catch-up replay share this pipeline so that a replayed
//! submission reproduces exactly what live processing did. They differ only in
//! what they do with a [`LandingError`]: the live path drops the submission,
//! replay aborts.

use crate::classify::classify;
use crate::policy::RoutePolicy;
use crate::store::{ExecutionReport, RouteStore};
use crate::types::{Destination, Nonce, OperatorAddress};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload of one flight-plan-submitted event. Immutable once observed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub destination: Destination,
    pub nonce: Nonce,
    pub query: String,
    pub operator: OperatorAddress,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LandingError {
    #[error("flight plan {nonce} does not parse: {reason}")]
    Parse { nonce: Nonce, reason: String },

    #[error("No proper permissions: operator {operator} may not write (flight plan {nonce})")]
    Denied { nonce: Nonce, operator: OperatorAddress },
}

/// Classify, authorize and execute one submission against its store.
///
/// Nothing executes unless the whole text parses and the operator is allowed
/// to run it.
pub fn land(
    store: &RouteStore,
    policy: &RoutePolicy,
    submission: &Submission,
) -> Result<ExecutionReport, LandingError> {
    let plan = classify(&submission.query).map_err(|e| LandingError::Parse {
        nonce: submission.nonce,
        reason: e.to_string(),
    })?;

    if !policy.permitted(plan.is_write, &submission.operator) {
        return Err(LandingError::Denied {
            nonce: submission.nonce,
            operator: submission.operator,
        });
    }

    Ok(store.execute(&plan))
}
