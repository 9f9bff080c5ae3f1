//! Error types for the Vanish Core.

use thiserror::Error;

/// Errors raised when a request violates share policy or carries malformed input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("password must be at least {min_chars} characters")]
    WeakPassword { min_chars: usize },

    #[error("invalid ttl: {0}")]
    InvalidTtl(String),

    #[error("invalid share id: {0}")]
    InvalidShareId(String),

    #[error("unknown share status: {0}")]
    UnknownStatus(u8),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
