//! Error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    /// Flight plan text does not parse. Nothing was executed.
    #[error("parse error: {0}")]
    Parse(String),
    /// The destination's local store could not be opened or queried.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
    /// Store directory could not be prepared.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed identifier or payload field.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
pub type Result<T> = KernelResult<T>;
