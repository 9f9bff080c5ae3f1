//! # Vanish Core
//!
//! Pure types for the Vanish share engine: identifiers, the share record
//! state machine, access policies and clocks.
//!
//! This crate contains no I/O, no storage and no cryptography beyond id
//! generation. Everything here is plain data plus the rules that govern how
//! it may change.
//!
//! ## Key Types
//!
//! - [`ShareId`] - Unguessable, URL-safe share identifier (256 bits)
//! - [`ContentHandle`] - Opaque reference into the external content store
//! - [`ShareRecord`] - Authoritative per-share state
//! - [`ShareStatus`] - `Active` or one of the terminal states
//! - [`SealedKey`] - The wrapped content key and its derivation parameters
//! - [`LockoutPolicy`] / [`SharePolicy`] - Tunable policy parameters
//! - [`Clock`] - Time source (system or manual)

pub mod clock;
pub mod error;
pub mod policy;
pub mod record;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
pub use policy::{LockoutPolicy, SharePolicy};
pub use record::{KdfParams, SealedKey, ShareRecord, ShareStatus};
pub use types::{ContentHandle, ShareId};
