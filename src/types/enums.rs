// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Route policy enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a route does with writes from operators outside its allow-list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPermission {
    Open,
    Closed,
}

impl DefaultPermission {
    /// Parse the string carried by a route-launched event.
    ///
    /// `"open"` and the older `"write"` spelling open the route; every other
    /// value closes it.
    pub fn from_event_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "write" => DefaultPermission::Open,
            _ => DefaultPermission::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DefaultPermission::Open => "open",
            DefaultPermission::Closed => "closed",
        }
    }
}

impl Default for DefaultPermission {
    fn default() -> Self {
        DefaultPermission::Closed
    }
}

impl fmt::Display for DefaultPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
