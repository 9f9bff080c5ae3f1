//! Policy parameters for share creation and brute-force protection.
//!
//! Defaults: 47 second TTL, 8 character passwords, 5 attempts per cycle,
//! a 30 second lockout doubling each cycle up to one hour, terminal lock
//! after 3 cycles.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Rules applied when a share is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharePolicy {
    /// TTL used when the caller does not pick one.
    pub default_ttl_ms: u64,
    /// Upper bound on caller-chosen TTLs.
    pub max_ttl_ms: u64,
    /// Minimum password length in characters.
    pub min_password_chars: usize,
    /// Report `expired` as `not_found` to callers.
    pub alias_expired_as_not_found: bool,
}

impl Default for SharePolicy {
    fn default() -> Self {
        Self {
            default_ttl_ms: 47_000,
            max_ttl_ms: 24 * 60 * 60 * 1000,
            min_password_chars: 8,
            alias_expired_as_not_found: false,
        }
    }
}

impl SharePolicy {
    /// Reject passwords shorter than the minimum.
    pub fn check_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_password_chars {
            return Err(CoreError::WeakPassword {
                min_chars: self.min_password_chars,
            });
        }
        Ok(())
    }

    /// Resolve an optional caller TTL into milliseconds.
    pub fn resolve_ttl(&self, ttl: Option<Duration>) -> Result<i64> {
        let ms = match ttl {
            Some(ttl) => u64::try_from(ttl.as_millis())
                .map_err(|_| CoreError::InvalidTtl("ttl out of range".into()))?,
            None => self.default_ttl_ms,
        };
        if ms == 0 {
            return Err(CoreError::InvalidTtl("ttl must be positive".into()));
        }
        if ms > self.max_ttl_ms {
            return Err(CoreError::InvalidTtl(format!(
                "ttl {}ms exceeds maximum {}ms",
                ms, self.max_ttl_ms
            )));
        }
        i64::try_from(ms).map_err(|_| CoreError::InvalidTtl("ttl out of range".into()))
    }
}

/// Per-share brute-force policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutPolicy {
    /// Attempts allowed per cycle before a lockout.
    pub max_attempts: u32,
    /// Lockout length for the first cycle.
    pub base_lockout_ms: u64,
    /// Cap on the lockout length.
    pub max_lockout_ms: u64,
    /// Lockouts tolerated before the share is locked for good.
    /// `None` keeps cycling until the deadline.
    pub max_lock_cycles: Option<u32>,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_lockout_ms: 30_000,
            max_lockout_ms: 60 * 60 * 1000,
            max_lock_cycles: Some(3),
        }
    }
}

impl LockoutPolicy {
    /// Lockout length for the given zero-based cycle: `base * 2^cycle`, capped.
    pub fn lockout_ms(&self, cycle: u32) -> i64 {
        let factor = 1u64.checked_shl(cycle).unwrap_or(u64::MAX);
        let ms = self
            .base_lockout_ms
            .saturating_mul(factor)
            .min(self.max_lockout_ms);
        i64::try_from(ms).unwrap_or(i64::MAX)
    }

    /// Whether reaching `cycles` lockouts ends the share.
    pub fn is_exhausted(&self, cycles: u32) -> bool {
        matches!(self.max_lock_cycles, Some(max) if cycles > max)
    }
}
