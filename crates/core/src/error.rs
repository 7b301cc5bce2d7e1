//! Error types for winagg.

use crate::types::DataType;
use alloc::string::String;
use thiserror::Error;

/// Result type alias for winagg operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types shared by every winagg crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Type mismatch error.
    #[error("Type mismatch: expected {expected:?}, got {got:?}")]
    TypeMismatch { expected: DataType, got: DataType },
    /// Arithmetic overflow while accumulating a value.
    #[error("Overflow: {message}")]
    Overflow { message: String },
    /// Unsupported or malformed configuration, rejected before any row is processed.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
    /// A broken internal invariant. Never retried.
    #[error("Invariant violated: {message}")]
    Invariant { message: String },
    /// Invalid operation.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch { expected, got }
    }

    /// Creates an overflow error.
    pub fn overflow(message: impl Into<String>) -> Self {
        Error::Overflow {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::Invariant {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}
