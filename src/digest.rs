// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Result Digest
//!
//! Replicas of a destination prove they saw the same results by attesting the
//! same digest for the same nonce. The digest is SHA-256 over the chained
//! per-statement hashes of every row-capturing statement, in statement order.
//!
//! # Hash Input Structure
//! ```text
//! per statement (captures_rows only):
//!   for each returned row, in row order:
//!     for each column, in column order:
//!       column bytes (NULL = DE AD BE EF)
//!       0x00
//!   -> SHA-256 = statement hash
//!
//! plan digest = SHA-256(statement hash || statement hash || ...)
//! ```
//!
//! Statements that run for effect only, or fail, contribute nothing.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt::{self, Write as _};

/// Bytes hashed in place of a NULL column.
pub const NULL_SENTINEL: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Separator written after every column.
pub const COLUMN_SEPARATOR: u8 = 0;

/// 256-bit summary of one flight plan's captured results.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("digest must be 32 bytes"))?;
        Ok(Digest(arr))
    }
}

/// Text form of a REAL column as replicas hash it: shortest round-trip
/// digits, in exponent form (`1e-07`, `1.5e+21`) when the decimal exponent
/// is below -4 or at least 6.
pub fn format_real(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }

    // `{:e}` gives the shortest round-trip digits as `d[.ddd]e<exp>`.
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exp) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let mut out = String::new();
    if value.is_sign_negative() {
        out.push('-');
    }

    if exp < -4 || exp >= 6 {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let _ = write!(out, "e{}{:02}", if exp < 0 { '-' } else { '+' }, exp.unsigned_abs());
        return out;
    }

    let int_digits = exp + 1;
    if int_digits <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take(int_digits.unsigned_abs() as usize));
        out.push_str(&digits);
    } else {
        let int_digits = int_digits as usize;
        if digits.len() <= int_digits {
            out.push_str(&digits);
            out.extend(std::iter::repeat('0').take(int_digits - digits.len()));
        } else {
            out.push_str(&digits[..int_digits]);
            out.push('.');
            out.push_str(&digits[int_digits..]);
        }
    }
    out
}

/// Raw column value as observed in a result row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColumnBytes<'a> {
    Null,
    Raw(&'a [u8]),
}

/// Hash of one row-capturing statement's result set.
#[derive(Default)]
pub struct StatementHasher {
    inner: Sha256,
}

impl StatementHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one row, columns in order.
    pub fn write_row<'a>(&mut self, columns: impl IntoIterator<Item = ColumnBytes<'a>>) {
        for column in columns {
            self.write_column(column);
        }
    }

    pub fn write_column(&mut self, column: ColumnBytes<'_>) {
        match column {
            ColumnBytes::Null => self.inner.update(NULL_SENTINEL),
            ColumnBytes::Raw(bytes) => self.inner.update(bytes),
        }
        self.inner.update([COLUMN_SEPARATOR]);
    }

    pub fn finish(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}

/// Running hash over the statement hashes of one flight plan.
#[derive(Default)]
pub struct PlanHasher {
    inner: Sha256,
    statements: usize,
}

impl PlanHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_statement(&mut self, statement_hash: &[u8; 32]) {
        self.inner.update(statement_hash);
        self.statements += 1;
    }

    /// Number of statement hashes folded in so far.
    pub fn statements(&self) -> usize {
        self.statements
    }

    pub fn finish(self) -> Digest {
        Digest(self.inner.finalize().into())
    }
}
