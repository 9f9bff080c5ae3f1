//! Symmetric keys and nonces.
//!
//! Provides ChaCha20-Poly1305 authenticated encryption under 256-bit keys.
//! Key material is wiped on drop.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, Result};

/// Length of every symmetric key in the envelope.
pub const KEY_LEN: usize = 32;

/// The per-share content encryption key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; KEY_LEN]);

impl ContentKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encrypt data with this key.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce, aad: &[u8]) -> Result<Vec<u8>> {
        seal(&self.0, plaintext, nonce, aad)
    }

    /// Decrypt data with this key. Any tag mismatch is an integrity failure.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        nonce: &EncryptionNonce,
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        open(&self.0, ciphertext, nonce, aad).map_err(|_| CryptoError::IntegrityFailed)
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentKey(<redacted>)")
    }
}

/// A key derived from a share password. Only ever wraps a [`ContentKey`].
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct WrappingKey(pub(crate) [u8; KEY_LEN]);

impl WrappingKey {
    pub(crate) fn seal(&self, plaintext: &[u8], nonce: &EncryptionNonce, aad: &[u8]) -> Result<Vec<u8>> {
        seal(&self.0, plaintext, nonce, aad)
    }

    /// A tag mismatch here means the password was wrong.
    pub(crate) fn open(
        &self,
        ciphertext: &[u8],
        nonce: &EncryptionNonce,
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        open(&self.0, ciphertext, nonce, aad).map_err(|_| CryptoError::AuthenticationFailed)
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

fn seal(key: &[u8; KEY_LEN], plaintext: &[u8], nonce: &EncryptionNonce, aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    cipher
        .encrypt(
            Nonce::from_slice(&nonce.0),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

fn open(
    key: &[u8; KEY_LEN],
    ciphertext: &[u8],
    nonce: &EncryptionNonce,
    aad: &[u8],
) -> std::result::Result<Zeroizing<Vec<u8>>, chacha20poly1305::aead::Error> {
    let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| chacha20poly1305::aead::Error)?;

    cipher
        .decrypt(
            Nonce::from_slice(&nonce.0),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map(Zeroizing::new)
}
