//! Identity types.
//!
//! Byte identifiers render as lowercase hex. That is also their serde form, so
//! the same string shows up in log tags, JSON payloads and store file names.

use crate::error::{KernelError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 128-bit airport identity. Names this node, and every destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct AirportCode(pub [u8; 16]);

impl AirportCode {
    /// Fresh random code (v4 UUID bytes).
    pub fn generate() -> Self {
        AirportCode(*uuid::Uuid::new_v4().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Ledger topic form: the 16 code bytes left-aligned in a 32-byte word.
    pub fn topic(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[..16].copy_from_slice(&self.0);
        word
    }
}

impl fmt::Display for AirportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for AirportCode {
    type Err = KernelError;

    /// Accepts 32 hex chars (optionally `0x`-prefixed) or a hyphenated UUID.
    fn from_str(s: &str) -> Result<Self> {
        if s.contains('-') {
            let uuid = uuid::Uuid::parse_str(s)
                .map_err(|e| KernelError::InvalidInput(format!("airport code {:?}: {}", s, e)))?;
            return Ok(AirportCode(*uuid.as_bytes()));
        }
        decode_fixed::<16>(s, "airport code").map(AirportCode)
    }
}

/// 20-byte ledger account of the operator that submitted a flight plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct OperatorAddress(pub [u8; 20]);

impl fmt::Display for OperatorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for OperatorAddress {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        decode_fixed::<20>(s, "operator address").map(OperatorAddress)
    }
}

/// Per-destination submission sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Nonce(pub u64);

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn decode_fixed<const N: usize>(s: &str, what: &str) -> Result<[u8; N]> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed)
        .map_err(|e| KernelError::InvalidInput(format!("{} {:?}: {}", what, s, e)))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        KernelError::InvalidInput(format!("{} {:?}: expected {} bytes, got {}", what, s, N, b.len()))
    })
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(AirportCode);
hex_serde!(OperatorAddress);
