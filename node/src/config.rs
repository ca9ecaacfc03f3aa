// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::errors::NodeError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AirportConfig {
    /// Address announced in `constructAirport`.
    #[serde(alias = "IPAddr")]
    pub ip_addr: String,
    /// Dispatcher base URL.
    #[serde(alias = "rpcEndpoint")]
    pub ledger_url: String,
    pub auth_token: Option<String>,
    /// Where the per-destination `<hex>.db` files live.
    pub database_dir: PathBuf,
    /// Admin/metrics HTTP surface; `None` disables it.
    pub admin_bind_addr: Option<SocketAddr>,
    pub retry: RetryPolicy,
}

impl Default for AirportConfig {
    fn default() -> Self {
        Self {
            ip_addr: "127.0.0.1".to_string(),
            ledger_url: "http://127.0.0.1:7545".to_string(),
            auth_token: None,
            database_dir: PathBuf::from("database"),
            admin_bind_addr: Some(SocketAddr::from(([127, 0, 0, 1], 3000))),
            retry: RetryPolicy::default(),
        }
    }
}

impl AirportConfig {
    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Config {:?} not found, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(NodeError::Config(format!("{:?}: {}", path, e))),
        };
        serde_json::from_str(&raw).map_err(|e| NodeError::Config(format!("{:?}: {}", path, e)))
    }

    /// Announced address; an unparsable value degrades to `0.0.0.0`.
    pub fn announced_ip(&self) -> Ipv4Addr {
        self.ip_addr.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid IP address {:?}, announcing 0.0.0.0", self.ip_addr);
            Ipv4Addr::UNSPECIFIED
        })
    }
}
