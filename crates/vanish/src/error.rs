//! Error types for the share engine.

use thiserror::Error;
use vanish_core::{ContentHandle, CoreError};
use vanish_crypto::CryptoError;
use vanish_store::StoreError;

/// Errors returned by engine operations.
///
/// The access outcomes (`NotFound`, `Expired`, `Locked`,
/// `AuthenticationFailed`) are ordinary results for a caller, not faults.
#[derive(Debug, Error)]
pub enum ShareError {
    /// No such share, or it was already consumed.
    #[error("share not found")]
    NotFound,

    /// The share passed its deadline.
    #[error("share expired")]
    Expired,

    /// Too many failed attempts; temporarily or for good.
    #[error("share locked")]
    Locked,

    /// Wrong password.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The stored ciphertext failed its integrity check.
    #[error("content integrity check failed")]
    IntegrityFailed,

    #[error("password must be at least {min_chars} characters")]
    WeakPassword { min_chars: usize },

    #[error("invalid ttl: {0}")]
    InvalidTtl(String),

    /// Nothing is staged under the handle given to create-share.
    #[error("no content staged under handle {0}")]
    ContentNotFound(ContentHandle),

    /// Another live share already owns the content under this handle.
    #[error("content under handle {0} already belongs to a live share")]
    ContentInUse(ContentHandle),

    /// The engine could not serve the request in time or a backend is down.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Rejected engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Content store error.
    #[error("content store error: {0}")]
    Content(String),

    /// Invariant violation or unexpected crypto failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShareError {
    /// Transport-neutral error code.
    pub fn code(&self) -> &'static str {
        match self {
            ShareError::NotFound => "not_found",
            ShareError::Expired => "expired",
            ShareError::Locked => "locked",
            ShareError::AuthenticationFailed => "auth_failed",
            ShareError::WeakPassword { .. } => "weak_password",
            ShareError::InvalidTtl(_) => "invalid_ttl",
            ShareError::ContentNotFound(_) => "content_not_found",
            ShareError::ContentInUse(_) => "content_in_use",
            ShareError::Unavailable(_) | ShareError::Store(StoreError::Unavailable(_)) => {
                "unavailable"
            }
            ShareError::IntegrityFailed
            | ShareError::Config(_)
            | ShareError::Store(_)
            | ShareError::Content(_)
            | ShareError::Internal(_) => "internal",
        }
    }

    /// Whether this is a fault worth an operator's attention rather than an
    /// expected access outcome.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            ShareError::IntegrityFailed
                | ShareError::Store(_)
                | ShareError::Content(_)
                | ShareError::Internal(_)
        )
    }
}

impl From<CoreError> for ShareError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::WeakPassword { min_chars } => ShareError::WeakPassword { min_chars },
            CoreError::InvalidTtl(msg) => ShareError::InvalidTtl(msg),
            CoreError::InvalidShareId(_) => ShareError::NotFound,
            CoreError::UnknownStatus(status) => {
                ShareError::Internal(format!("unknown share status {}", status))
            }
        }
    }
}

impl From<CryptoError> for ShareError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AuthenticationFailed => ShareError::AuthenticationFailed,
            CryptoError::IntegrityFailed => ShareError::IntegrityFailed,
            other => ShareError::Internal(other.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ShareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ShareError::NotFound.code(), "not_found");
        assert_eq!(ShareError::Expired.code(), "expired");
        assert_eq!(ShareError::Locked.code(), "locked");
        assert_eq!(ShareError::AuthenticationFailed.code(), "auth_failed");
        assert_eq!(ShareError::IntegrityFailed.code(), "internal");
        assert_eq!(
            ShareError::ContentInUse(ContentHandle::new("upload")).code(),
            "content_in_use"
        );
        assert_eq!(
            ShareError::Store(StoreError::Unavailable("down".into())).code(),
            "unavailable"
        );
        assert_eq!(
            ShareError::Store(StoreError::InvalidData("bad".into())).code(),
            "internal"
        );
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(
            ShareError::from(CoreError::InvalidShareId("x".into())),
            ShareError::NotFound
        ));
        assert!(matches!(
            ShareError::from(CoreError::WeakPassword { min_chars: 8 }),
            ShareError::WeakPassword { min_chars: 8 }
        ));
        assert!(matches!(
            ShareError::from(CryptoError::AuthenticationFailed),
            ShareError::AuthenticationFailed
        ));
        assert!(matches!(
            ShareError::from(CryptoError::IntegrityFailed),
            ShareError::IntegrityFailed
        ));
        assert!(!ShareError::AuthenticationFailed.is_fault());
        assert!(ShareError::IntegrityFailed.is_fault());
    }
}
