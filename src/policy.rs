// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Route permission policy.
//!
//! Reads are never gated. A write is allowed when the operator is on the
//! route's allow-list or the route's default permission is `open`. The check
//! runs once per flight plan against its aggregate `is_write`, so a plan is
//! accepted or rejected as a unit.

use crate::types::{DefaultPermission, OperatorAddress};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    pub writers: BTreeSet<OperatorAddress>,
    pub default_permission: DefaultPermission,
}

impl RoutePolicy {
    pub fn new(writers: impl IntoIterator<Item = OperatorAddress>, default_permission: DefaultPermission) -> Self {
        Self {
            writers: writers.into_iter().collect(),
            default_permission,
        }
    }

    pub fn permitted(&self, is_write: bool, operator: &OperatorAddress) -> bool {
        if !is_write {
            return true;
        }
        self.default_permission == DefaultPermission::Open || self.writers.contains(operator)
    }
}
