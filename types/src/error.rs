//! Top-level error type shared across crates.

use thiserror::Error;

/// Decoding and encoding failures for the fundamental types.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid height encoding: expected {expected} bytes, got {actual}")]
    InvalidHeight { expected: usize, actual: usize },

    #[error("envelope payload is empty")]
    EmptyPayload,

    #[error("transaction action has no successful response")]
    NoResponse,
}

impl From<bincode::Error> for TypesError {
    fn from(e: bincode::Error) -> Self {
        TypesError::Serialization(e.to_string())
    }
}
