//! Access controller: password verification, attempt budget, lockouts and
//! the single-use consume.
//!
//! An attempt is charged against the budget *before* the password is
//! checked, inside a compare-and-transition, and the slot number comes back
//! with the updated record. Parallel guesses therefore each get a distinct
//! slot and can never exceed the budget between them. Only the holder of the
//! last slot applies the lockout when its guess fails.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use vanish_core::{Clock, ContentHandle, KdfParams, LockoutPolicy, ShareId, ShareRecord, ShareStatus};
use vanish_crypto::{decoy_derive, ContentKey, CryptoError, EncryptedContent};
use vanish_store::{ShareStore, Transition, TransitionResult};
use zeroize::Zeroizing;

use crate::content::ContentStore;
use crate::error::{Result, ShareError};
use crate::pool::KdfPool;
use crate::scheduler::ExpiryScheduler;

/// What a successful access hands back.
pub struct SharedContent {
    /// Handle the content was stored under. The blob itself is gone.
    pub content_handle: ContentHandle,
    /// The decrypted file. Wiped when dropped.
    pub plaintext: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for SharedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedContent")
            .field("content_handle", &self.content_handle)
            .field("len", &self.plaintext.len())
            .finish()
    }
}

/// Map the status that beat us in a race to what the caller sees.
fn lost_race(current: ShareStatus) -> ShareError {
    match current {
        ShareStatus::Expired => ShareError::Expired,
        ShareStatus::Locked => ShareError::Locked,
        ShareStatus::Consumed | ShareStatus::Active => ShareError::NotFound,
    }
}

/// Runs the access algorithm against a store, content store and scheduler.
pub struct AccessController<S, C> {
    store: Arc<S>,
    content: Arc<C>,
    scheduler: Arc<ExpiryScheduler<S, C>>,
    pool: KdfPool,
    clock: Arc<dyn Clock>,
    lockout: LockoutPolicy,
    decoy_params: KdfParams,
    equalize_timing: bool,
    timeout: Duration,
}

impl<S: ShareStore, C: ContentStore> AccessController<S, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<S>,
        content: Arc<C>,
        scheduler: Arc<ExpiryScheduler<S, C>>,
        pool: KdfPool,
        clock: Arc<dyn Clock>,
        lockout: LockoutPolicy,
        decoy_params: KdfParams,
        equalize_timing: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            content,
            scheduler,
            pool,
            clock,
            lockout,
            decoy_params,
            equalize_timing,
            timeout,
        }
    }

    /// Verify `password` for the share and, on success, consume it.
    pub async fn access(&self, id: &ShareId, password: &str) -> Result<SharedContent> {
        let now = self.clock.now_millis();

        let Some(record) = self.store.get(id).await? else {
            self.decoy(password).await;
            return Err(ShareError::NotFound);
        };

        match record.status {
            ShareStatus::Active => {}
            ShareStatus::Consumed => {
                self.decoy(password).await;
                return Err(ShareError::NotFound);
            }
            ShareStatus::Expired => {
                self.decoy(password).await;
                return Err(ShareError::Expired);
            }
            ShareStatus::Locked => return Err(ShareError::Locked),
        }

        if record.is_past_deadline(now) {
            self.scheduler.expire(id, now).await?;
            self.decoy(password).await;
            return Err(ShareError::Expired);
        }

        // A lockout was applied but the terminal step never ran.
        if self.lockout.is_exhausted(record.lock_cycles) {
            self.lock_for_good(id, now).await?;
            return Err(ShareError::Locked);
        }

        if record.is_locked_at(now) {
            return Err(ShareError::Locked);
        }

        let charged = self.charge(id, now).await?;
        let slot = charged.failed_attempts;

        if charged.is_locked_at(now) || slot == 0 {
            return Err(ShareError::Locked);
        }
        if slot > self.lockout.max_attempts {
            // The last slot's holder went away without settling it.
            self.lock_out(id, now).await?;
            return Err(ShareError::Locked);
        }

        let Some(sealed) = charged.sealed.clone() else {
            return Err(ShareError::Internal("active share without a sealed key".into()));
        };

        let password = Zeroizing::new(password.to_owned());
        let unwrap_job = self
            .pool
            .run(move || vanish_crypto::unwrap(&sealed, &password));
        let verified = tokio::time::timeout(self.timeout, unwrap_job).await;

        let key = match verified {
            Ok(Ok(Ok(key))) => key,
            Ok(Ok(Err(CryptoError::AuthenticationFailed))) => {
                debug!(share = %id, slot, "wrong password");
                self.settle_failure(id, slot, now).await?;
                return Err(ShareError::AuthenticationFailed);
            }
            Ok(Ok(Err(e))) => return Err(e.into()),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                self.settle_failure(id, slot, now).await?;
                return Err(ShareError::Unavailable("access timed out".into()));
            }
        };

        self.consume(id, key, charged.expires_at).await
    }

    /// Reserve one attempt slot.
    async fn charge(&self, id: &ShareId, now: i64) -> Result<ShareRecord> {
        let charge = Transition::new(ShareStatus::Active, ShareStatus::Active, now)
            .with(move |r| r.charge_attempt(now));

        match self.store.compare_and_transition(id, charge).await? {
            TransitionResult::Applied { record, .. } => Ok(record),
            TransitionResult::Conflict { current } => Err(lost_race(current)),
            TransitionResult::NotFound => Err(ShareError::NotFound),
        }
    }

    async fn settle_failure(&self, id: &ShareId, slot: u32, now: i64) -> Result<()> {
        if slot >= self.lockout.max_attempts {
            self.lock_out(id, now).await?;
        }
        Ok(())
    }

    /// Start a lockout window, or lock for good once the cycles run out.
    ///
    /// Guarded on the counter so two callers settling the same exhausted
    /// budget only apply one lockout.
    async fn lock_out(&self, id: &ShareId, now: i64) -> Result<()> {
        let policy = self.lockout.clone();
        let lockout = Transition::new(ShareStatus::Active, ShareStatus::Active, now).with(move |r| {
            if r.failed_attempts >= policy.max_attempts && !r.is_locked_at(now) {
                r.apply_lockout(now, &policy);
            }
        });

        let record = match self.store.compare_and_transition(id, lockout).await? {
            TransitionResult::Applied { record, .. } => record,
            TransitionResult::Conflict { .. } | TransitionResult::NotFound => return Ok(()),
        };

        if self.lockout.is_exhausted(record.lock_cycles) {
            self.lock_for_good(id, now).await
        } else {
            warn!(
                share = %id,
                cycle = record.lock_cycles,
                lock_until = ?record.lock_until,
                "share temporarily locked"
            );
            Ok(())
        }
    }

    async fn lock_for_good(&self, id: &ShareId, now: i64) -> Result<()> {
        let lock = Transition::new(ShareStatus::Active, ShareStatus::Locked, now);

        match self.store.compare_and_transition(id, lock).await? {
            TransitionResult::Applied { released, .. } => {
                self.scheduler.cancel(id);
                self.release(id, released.as_ref()).await;
                warn!(share = %id, "share locked permanently");
            }
            TransitionResult::Conflict { current } => {
                debug!(share = %id, ?current, "lock lost race");
            }
            TransitionResult::NotFound => {}
        }
        Ok(())
    }

    /// Move the share to `Consumed`, then decrypt and delete its content.
    async fn consume(&self, id: &ShareId, key: ContentKey, deadline: i64) -> Result<SharedContent> {
        // The derivation took time; the deadline may have passed meanwhile.
        let now = self.clock.now_millis();
        if now >= deadline {
            self.scheduler.expire(id, now).await?;
            return Err(ShareError::Expired);
        }

        let consume = Transition::new(ShareStatus::Active, ShareStatus::Consumed, now);
        let handle = match self.store.compare_and_transition(id, consume).await? {
            TransitionResult::Applied { released, .. } => released.ok_or_else(|| {
                ShareError::Internal("consumed share had no content handle".into())
            })?,
            TransitionResult::Conflict { current } => {
                debug!(share = %id, ?current, "consume lost race");
                return Err(lost_race(current));
            }
            TransitionResult::NotFound => return Err(ShareError::NotFound),
        };
        self.scheduler.cancel(id);

        let opened = self.open(&handle, &key).await;
        self.release(id, Some(&handle)).await;

        let plaintext = opened.map_err(|e| {
            error!(share = %id, error = %e, "consumed share could not be decrypted");
            e
        })?;

        info!(share = %id, bytes = plaintext.len(), "share consumed");
        Ok(SharedContent {
            content_handle: handle,
            plaintext,
        })
    }

    async fn open(&self, handle: &ContentHandle, key: &ContentKey) -> Result<Zeroizing<Vec<u8>>> {
        let blob = self
            .content
            .get(handle)
            .await?
            .ok_or(ShareError::IntegrityFailed)?;
        let envelope = EncryptedContent::from_bytes(&blob)?;
        Ok(envelope.decrypt(key)?)
    }

    async fn release(&self, id: &ShareId, handle: Option<&ContentHandle>) {
        if let Some(handle) = handle {
            if let Err(e) = self.content.delete(handle).await {
                error!(share = %id, error = %e, "failed to delete share content");
            }
        }
    }

    /// Spend about as long as a real unwrap would.
    pub(crate) async fn decoy(&self, password: &str) {
        if !self.equalize_timing {
            return;
        }
        let password = Zeroizing::new(password.as_bytes().to_vec());
        let params = self.decoy_params;
        let decoy = self.pool.run(move || decoy_derive(&password, &params));
        let _ = tokio::time::timeout(self.timeout, decoy).await;
    }
}
