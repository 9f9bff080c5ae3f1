//! Error types for the crypto envelope.

use thiserror::Error;

/// Errors that can occur during envelope operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Wrong password, or a wrapped key that does not belong to this salt.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Ciphertext was corrupted or tampered with.
    #[error("integrity check failed")]
    IntegrityFailed,

    /// Argon2 rejected the cost parameters.
    #[error("invalid kdf parameters: {0}")]
    InvalidKdfParams(String),

    /// Key derivation error.
    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
