//! Error type for the common crate.

use thiserror::Error;

/// Errors produced by common primitives.
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CommonError {
    /// Shorthand for an internal error with a formatted message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Result type alias for common operations.
pub type CommonResult<T> = std::result::Result<T, CommonError>;
