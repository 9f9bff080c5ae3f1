//! # Vanish Crypto
//!
//! The crypto envelope for shares.
//!
//! ## Encryption Model
//!
//! Shares use a two-layer key model:
//!
//! 1. **Content Key**: a random 256-bit ChaCha20-Poly1305 key, fresh per
//!    share, that encrypts the file content
//! 2. **Wrapping Key**: derived from the share password with Argon2id and a
//!    per-share salt; it only encrypts (wraps) the content key
//!
//! File secrecy therefore never rests on password entropy alone, and the
//! password only gates unwrapping. Both layers are authenticated, so a wrong
//! password or a tampered blob fails the tag check instead of producing
//! garbage.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vanish_core::KdfParams;
//! use vanish_crypto::{wrap, unwrap, ContentKey, EncryptedContent};
//!
//! let key = ContentKey::generate();
//! let sealed = wrap(&key, "correcthorse1", KdfParams::default()).unwrap();
//! let envelope = EncryptedContent::encrypt(b"file bytes", &key).unwrap();
//!
//! let recovered = unwrap(&sealed, "correcthorse1").unwrap();
//! let plaintext = envelope.decrypt(&recovered).unwrap();
//! assert_eq!(&plaintext[..], b"file bytes");
//! ```

pub mod envelope;
pub mod error;
pub mod kdf;
pub mod key;

pub use envelope::{unwrap, wrap, EncryptedContent, EncryptionFormat};
pub use error::{CryptoError, Result};
pub use kdf::{decoy_derive, derive_wrapping_key, generate_salt, validate_params};
pub use key::{ContentKey, EncryptionNonce, WrappingKey};
