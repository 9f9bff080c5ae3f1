//! Strong type definitions for the Vanish engine.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A 32-byte share identifier drawn from the OS random source.
///
/// Rendered as lowercase hex, which is URL-safe. The full value is a bearer
/// credential together with the password, so `Debug` and `Display` only show
/// a prefix and logs should use [`ShareId::fingerprint`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShareId(pub [u8; 32]);

impl ShareId {
    /// Generate a fresh random share id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create a new ShareId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string. This is the external form of the id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidShareId(e.to_string()))?;
        Self::try_from(bytes.as_slice())
            .map_err(|_| CoreError::InvalidShareId(format!("expected 32 bytes, got {}", bytes.len())))
    }

    /// A short, one-way tag for log lines.
    ///
    /// Knowing the fingerprint does not help to reconstruct the id.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new_derive_key("vanish-share-v1 log fingerprint");
        hasher.update(&self.0);
        hex::encode(&hasher.finalize().as_bytes()[..6])
    }
}

impl fmt::Debug for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShareId({})", self.fingerprint())
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fingerprint())
    }
}

impl AsRef<[u8]> for ShareId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for ShareId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for ShareId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Opaque reference into the external content store.
///
/// The engine never interprets it beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHandle(pub String);

impl ContentHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_id_hex_roundtrip() {
        let id = ShareId::from_bytes([0x42; 32]);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        let recovered = ShareId::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_share_id_rejects_short_hex() {
        let err = ShareId::from_hex("abcd").unwrap_err();
        assert!(matches!(err, CoreError::InvalidShareId(_)));
        assert!(ShareId::from_hex("not hex at all").is_err());
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = ShareId::generate();
        let b = ShareId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_does_not_leak_id() {
        let id = ShareId::from_bytes([0xab; 32]);
        let display = format!("{}", id);
        let debug = format!("{:?}", id);

        assert_eq!(display.len(), 12);
        assert!(!id.to_hex().starts_with(&display));
        assert!(debug.starts_with("ShareId("));
        assert!(!debug.contains(&id.to_hex()));
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let id = ShareId::from_bytes([0x01; 32]);
        assert_eq!(id.fingerprint(), id.fingerprint());
        assert_ne!(id.fingerprint(), ShareId::from_bytes([0x02; 32]).fingerprint());
    }
}
