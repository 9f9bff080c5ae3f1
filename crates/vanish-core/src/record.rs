//! Share record: the authoritative state of one share.
//!
//! A record starts `Active` and ends in exactly one terminal status. The
//! terminal transition strips every secret from the record; what remains is
//! a tombstone that lets racing actors learn that they lost.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CoreError;
use crate::policy::LockoutPolicy;
use crate::types::{ContentHandle, ShareId};

/// Lifecycle status of a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShareStatus {
    /// Accessible, possibly under a temporary lockout.
    Active = 0,
    /// Accessed successfully once.
    Consumed = 1,
    /// Deadline passed before any successful access.
    Expired = 2,
    /// Attempt budget exhausted for good.
    Locked = 3,
}

impl ShareStatus {
    /// Whether no further access is possible from this status.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, ShareStatus::Active)
    }

    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Result<Self, CoreError> {
        match value {
            0 => Ok(ShareStatus::Active),
            1 => Ok(ShareStatus::Consumed),
            2 => Ok(ShareStatus::Expired),
            3 => Ok(ShareStatus::Locked),
            other => Err(CoreError::UnknownStatus(other)),
        }
    }
}

/// Argon2id cost parameters, stored per share so they can be raised later
/// without invalidating outstanding shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost_kib: u32,
    /// Number of passes.
    pub t_cost: u32,
    /// Lanes.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // OWASP baseline for Argon2id.
        Self {
            m_cost_kib: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

/// The content key wrapped under a password-derived key.
///
/// Wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SealedKey {
    /// ChaCha20-Poly1305 ciphertext of the content key (key + tag).
    pub wrapped_key: Vec<u8>,
    /// Nonce used for the wrap.
    pub nonce: [u8; 12],
    /// Per-share Argon2 salt.
    pub salt: [u8; 16],
    #[zeroize(skip)]
    pub kdf: KdfParams,
}

impl std::fmt::Debug for SealedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedKey")
            .field("wrapped_key", &"<redacted>")
            .field("kdf", &self.kdf)
            .finish()
    }
}

/// The authoritative state of one share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub share_id: ShareId,

    /// Current lifecycle status.
    pub status: ShareStatus,

    /// Where the ciphertext lives. `None` once purged.
    pub content_handle: Option<ContentHandle>,

    /// Wrapped content key. `None` once purged.
    pub sealed: Option<SealedKey>,

    /// Creation time (Unix ms).
    pub created_at: i64,

    /// Absolute deadline (Unix ms). Never changes after creation.
    pub expires_at: i64,

    /// Attempts charged in the current lock cycle.
    pub failed_attempts: u32,

    /// End of the current temporary lockout (Unix ms).
    pub lock_until: Option<i64>,

    /// Lockouts applied so far.
    pub lock_cycles: u32,

    /// When the terminal transition happened (Unix ms).
    pub closed_at: Option<i64>,
}

impl ShareRecord {
    /// Create a fresh `Active` record.
    pub fn new(
        share_id: ShareId,
        content_handle: ContentHandle,
        sealed: SealedKey,
        created_at: i64,
        ttl_ms: i64,
    ) -> Self {
        Self {
            share_id,
            status: ShareStatus::Active,
            content_handle: Some(content_handle),
            sealed: Some(sealed),
            created_at,
            expires_at: created_at.saturating_add(ttl_ms),
            failed_attempts: 0,
            lock_until: None,
            lock_cycles: 0,
            closed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the deadline has been reached.
    pub fn is_past_deadline(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Whether a temporary lockout is in force.
    pub fn is_locked_at(&self, now: i64) -> bool {
        matches!(self.lock_until, Some(until) if now < until)
    }

    /// Milliseconds left until the deadline, clamped at zero.
    pub fn remaining_ms(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }

    /// Whether the record still carries anything secret.
    pub fn holds_secrets(&self) -> bool {
        self.sealed.is_some() || self.content_handle.is_some()
    }

    /// Charge one attempt against the budget unless a lockout is in force.
    ///
    /// An elapsed lockout is cleared first so the new cycle starts clean.
    pub fn charge_attempt(&mut self, now: i64) {
        if self.is_locked_at(now) {
            return;
        }
        self.lock_until = None;
        self.failed_attempts = self.failed_attempts.saturating_add(1);
    }

    /// Start a lockout window for the current cycle and reset the budget.
    pub fn apply_lockout(&mut self, now: i64, policy: &LockoutPolicy) {
        let window = policy.lockout_ms(self.lock_cycles);
        self.lock_until = Some(now.saturating_add(window));
        self.lock_cycles = self.lock_cycles.saturating_add(1);
        self.failed_attempts = 0;
    }

    /// Strip every secret and counter, returning the detached content handle.
    ///
    /// Called by stores as part of a terminal transition.
    pub fn purge(&mut self, now: i64) -> Option<ContentHandle> {
        self.sealed = None;
        self.failed_attempts = 0;
        self.lock_until = None;
        self.lock_cycles = 0;
        self.closed_at = Some(now);
        self.content_handle.take()
    }
}
