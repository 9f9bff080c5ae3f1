//! Key wrapping and encrypted content envelopes.
//!
//! [`wrap`]/[`unwrap`] protect the content key under the share password.
//! [`EncryptedContent`] is what the content store holds in place of the
//! uploaded file.

use serde::{Deserialize, Serialize};
use vanish_core::{KdfParams, SealedKey};
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::kdf::{derive_wrapping_key, generate_salt};
use crate::key::{ContentKey, EncryptionNonce, KEY_LEN};

/// Associated data binding a wrapped key to its purpose.
const WRAP_AAD: &[u8] = b"vanish-share-v1 content-key";

/// Associated data for content ciphertext.
const CONTENT_AAD: &[u8] = b"vanish-share-v1 content";

/// Wrap a content key under a password-derived key.
///
/// Draws a fresh salt and nonce; the returned [`SealedKey`] carries
/// everything [`unwrap`] needs except the password.
pub fn wrap(content_key: &ContentKey, password: &str, kdf: KdfParams) -> Result<SealedKey> {
    let salt = generate_salt();
    let nonce = EncryptionNonce::generate();
    let wrapping_key = derive_wrapping_key(password.as_bytes(), &salt, &kdf)?;
    let wrapped_key = wrapping_key.seal(content_key.as_bytes(), &nonce, WRAP_AAD)?;

    Ok(SealedKey {
        wrapped_key,
        nonce: nonce.0,
        salt,
        kdf,
    })
}

/// Recover the content key with the share password.
///
/// Always performs the full derivation followed by one AEAD open; the only
/// branch on correctness is the tag check at the very end.
pub fn unwrap(sealed: &SealedKey, password: &str) -> Result<ContentKey> {
    let wrapping_key = derive_wrapping_key(password.as_bytes(), &sealed.salt, &sealed.kdf)?;
    let nonce = EncryptionNonce::from_bytes(sealed.nonce);
    let raw = wrapping_key.open(&sealed.wrapped_key, &nonce, WRAP_AAD)?;

    let bytes: Zeroizing<[u8; KEY_LEN]> = Zeroizing::new(
        raw.as_slice()
            .try_into()
            .map_err(|_| CryptoError::AuthenticationFailed)?,
    );
    Ok(ContentKey::from_bytes(*bytes))
}

/// Format identifier for encrypted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

/// An encrypted content envelope.
///
/// Holds the ciphertext plus the metadata needed to decrypt it, given the
/// content key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedContent {
    /// Encryption algorithm used.
    pub format: EncryptionFormat,

    /// Nonce used for encryption (unique per encryption).
    pub nonce: EncryptionNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedContent {
    /// Encrypt plaintext with the given key.
    pub fn encrypt(plaintext: &[u8], key: &ContentKey) -> Result<Self> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce, CONTENT_AAD)?;

        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt with the given key.
    pub fn decrypt(&self, key: &ContentKey) -> Result<Zeroizing<Vec<u8>>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => {
                key.decrypt(&self.ciphertext, &self.nonce, CONTENT_AAD)
            }
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes. Malformed framing counts as tampering.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|_| CryptoError::IntegrityFailed)
    }

    /// Get the size of the ciphertext.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }
}
