//! Engine configuration.
//!
//! Every knob has a default, and every struct deserializes with
//! `#[serde(default)]`, so a host can load a partial document in any serde
//! format and get the stock policy for whatever it leaves out.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vanish_core::{KdfParams, LockoutPolicy, SharePolicy};

use crate::error::{Result, ShareError};

/// What the scheduler does with outstanding shares when the engine stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Leave records and deadlines in the store; `recover` picks them up.
    #[default]
    Persist,
    /// Expire every share still pending.
    ExpireOutstanding,
}

/// Expiry scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Longest the run loop sleeps without checking the heap.
    pub max_idle_ms: u64,
    /// How long tombstones are kept before being reaped.
    pub tombstone_retention_ms: u64,
    /// Delay before retrying an expiry that hit a storage error.
    pub retry_delay_ms: u64,
    pub shutdown: ShutdownPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_idle_ms: 1_000,
            tombstone_retention_ms: 60_000,
            retry_delay_ms: 1_000,
            shutdown: ShutdownPolicy::Persist,
        }
    }
}

impl SchedulerConfig {
    pub fn max_idle(&self) -> Duration {
        Duration::from_millis(self.max_idle_ms)
    }
}

/// Configuration for the share engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Creation rules: TTLs and password length.
    pub share: SharePolicy,
    /// Brute-force protection.
    pub lockout: LockoutPolicy,
    /// Argon2id cost for new shares.
    pub kdf: KdfParams,
    pub scheduler: SchedulerConfig,
    /// Concurrent key derivations. `0` means one per available core.
    pub workers: usize,
    /// Bound on waiting for a worker plus the derivation itself.
    pub access_timeout_ms: u64,
    /// Run a decoy derivation on not-found and expired paths.
    pub equalize_timing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            share: SharePolicy::default(),
            lockout: LockoutPolicy::default(),
            kdf: KdfParams::default(),
            scheduler: SchedulerConfig::default(),
            workers: 0,
            access_timeout_ms: 10_000,
            equalize_timing: true,
        }
    }
}

impl EngineConfig {
    /// Number of derivation workers after resolving `0`.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    pub fn access_timeout(&self) -> Duration {
        Duration::from_millis(self.access_timeout_ms)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let share = &self.share;
        if share.min_password_chars == 0 {
            return Err(ShareError::Config("min_password_chars must be at least 1".into()));
        }
        if share.max_ttl_ms == 0 {
            return Err(ShareError::Config("max_ttl_ms must be positive".into()));
        }
        if share.default_ttl_ms == 0 || share.default_ttl_ms > share.max_ttl_ms {
            return Err(ShareError::Config(format!(
                "default_ttl_ms {} must be in 1..={}",
                share.default_ttl_ms, share.max_ttl_ms
            )));
        }

        let lockout = &self.lockout;
        if lockout.max_attempts == 0 {
            return Err(ShareError::Config("max_attempts must be at least 1".into()));
        }
        if lockout.base_lockout_ms == 0 || lockout.base_lockout_ms > lockout.max_lockout_ms {
            return Err(ShareError::Config(format!(
                "base_lockout_ms {} must be in 1..={}",
                lockout.base_lockout_ms, lockout.max_lockout_ms
            )));
        }

        vanish_crypto::validate_params(&self.kdf)
            .map_err(|e| ShareError::Config(e.to_string()))?;

        if self.access_timeout_ms == 0 {
            return Err(ShareError::Config("access_timeout_ms must be positive".into()));
        }
        if self.scheduler.max_idle_ms == 0 {
            return Err(ShareError::Config("scheduler.max_idle_ms must be positive".into()));
        }

        Ok(())
    }
}
