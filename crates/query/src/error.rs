//! Error types for window evaluation.

use thiserror::Error;
use winagg_storage::StoreError;

/// Result type alias for window evaluation.
pub type Result<T> = std::result::Result<T, WindowError>;

/// Window executor failures. Every one of them aborts the query.
#[derive(Debug, Error)]
pub enum WindowError {
    /// Unsupported frame shape, bad frame offset or invalid tuning value.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
    /// A broken internal invariant.
    #[error("Invariant violated: {message}")]
    Invariant { message: String },
    /// Row store failure, including spill file I/O.
    #[error("Row store error: {0}")]
    Storage(#[from] StoreError),
    /// Evaluation failure raised by a function or argument expression.
    #[error(transparent)]
    Core(#[from] winagg_core::Error),
    /// No function with this name accepts these argument types.
    #[error("function {name}({args}) does not exist")]
    UnknownFunction { name: String, args: String },
    /// A previous call failed; the executor refuses further work.
    #[error("window executor already failed")]
    Poisoned,
}

impl WindowError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        WindowError::Configuration {
            message: message.into(),
        }
    }

    /// Creates an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        WindowError::Invariant {
            message: message.into(),
        }
    }

    /// Returns true for setup failures, as opposed to faults raised while running.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WindowError::Configuration { .. }
                | WindowError::UnknownFunction { .. }
                | WindowError::Core(winagg_core::Error::Configuration { .. })
        )
    }
}
