//! The share engine: lifecycle entry points.
//!
//! `ShareEngine` owns the store, content store, scheduler and access
//! controller, and is the only code that inserts share records.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use vanish_core::{
    Clock, ContentHandle, SealedKey, ShareId, ShareRecord, ShareStatus, SystemClock,
};
use vanish_crypto::{wrap, ContentKey, EncryptedContent};
use vanish_store::{InsertResult, RemoveResult, ShareStore};
use zeroize::Zeroizing;

use crate::access::{AccessController, SharedContent};
use crate::config::{EngineConfig, ShutdownPolicy};
use crate::content::ContentStore;
use crate::error::{Result, ShareError};
use crate::pool::KdfPool;
use crate::scheduler::ExpiryScheduler;

/// Fresh ids collide with probability 2^-256; this only bounds a broken RNG.
const MAX_ID_ATTEMPTS: usize = 4;

/// Returned by [`ShareEngine::create_share`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedShare {
    pub share_id: ShareId,
    /// Absolute deadline (Unix ms), for the client countdown.
    pub expires_at: i64,
}

/// Secret-free view of a share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInfo {
    /// Status as a client should see it; an `Active` share past its
    /// deadline reads as `Expired`.
    pub status: ShareStatus,
    pub expires_at: i64,
    pub remaining_ms: i64,
    /// End of a temporary lockout in force.
    pub locked_until: Option<i64>,
}

impl ShareInfo {
    fn from_record(record: &ShareRecord, now: i64) -> Self {
        let status = if record.status == ShareStatus::Active && record.is_past_deadline(now) {
            ShareStatus::Expired
        } else {
            record.status
        };
        let locked_until = record.lock_until.filter(|_| record.is_locked_at(now));
        let remaining_ms = if status.is_terminal() {
            0
        } else {
            record.remaining_ms(now)
        };

        Self {
            status,
            expires_at: record.expires_at,
            remaining_ms,
            locked_until,
        }
    }
}

/// The main engine.
///
/// Provides:
/// - Share creation (encrypt staged content, wrap the key, schedule expiry)
/// - Password-gated, single-use access
/// - Administrative deletion
/// - Expiry scheduling and recovery across restarts
pub struct ShareEngine<S, C> {
    store: Arc<S>,
    content: Arc<C>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    pool: KdfPool,
    scheduler: Arc<ExpiryScheduler<S, C>>,
    access: AccessController<S, C>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S, C> ShareEngine<S, C>
where
    S: ShareStore + 'static,
    C: ContentStore + 'static,
{
    /// Create an engine on the system clock.
    pub fn new(store: S, content: C, config: EngineConfig) -> Result<Self> {
        Self::with_clock(store, content, config, Arc::new(SystemClock))
    }

    /// Create an engine on a caller-supplied clock.
    pub fn with_clock(
        store: S,
        content: C,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(store);
        let content = Arc::new(content);
        let pool = KdfPool::new(config.worker_count());
        let scheduler = Arc::new(ExpiryScheduler::new(
            store.clone(),
            content.clone(),
            clock.clone(),
            config.scheduler.clone(),
        ));
        let access = AccessController::new(
            store.clone(),
            content.clone(),
            scheduler.clone(),
            pool.clone(),
            clock.clone(),
            config.lockout.clone(),
            config.kdf,
            config.equalize_timing,
            config.access_timeout(),
        );
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            store,
            content,
            clock,
            config,
            pool,
            scheduler,
            access,
            shutdown,
            task: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn scheduler(&self) -> &ExpiryScheduler<S, C> {
        &self.scheduler
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Turn the content staged under `content_handle` into a share.
    ///
    /// The staged plaintext is replaced in place by its encrypted envelope.
    /// A handle backs at most one live share at a time; reusing it before
    /// that share ends is `ContentInUse`. `ttl` defaults to the configured default (47 seconds).
    pub async fn create_share(
        &self,
        content_handle: ContentHandle,
        password: &str,
        ttl: Option<Duration>,
    ) -> Result<CreatedShare> {
        self.config.share.check_password(password)?;
        let ttl_ms = self.config.share.resolve_ttl(ttl)?;

        let plaintext = self
            .content
            .get(&content_handle)
            .await?
            .ok_or_else(|| ShareError::ContentNotFound(content_handle.clone()))?;

        let password = Zeroizing::new(password.to_owned());
        let kdf = self.config.kdf;
        let (sealed, envelope) = self
            .pool
            .run(move || -> vanish_crypto::Result<_> {
                let key = ContentKey::generate();
                let envelope = EncryptedContent::encrypt(&plaintext, &key)?;
                let sealed = wrap(&key, &password, kdf)?;
                Ok((sealed, envelope))
            })
            .await??;

        let envelope = Bytes::from(envelope.to_bytes()?);

        // Stamped after the derivation so key wrapping does not eat into the TTL.
        let created_at = self.clock.now_millis();
        let record = self
            .insert_record(&content_handle, sealed, created_at, ttl_ms)
            .await?;

        // The record now owns the handle; only then is the staged plaintext
        // replaced, so a failed create leaves the upload untouched.
        if let Err(e) = self.content.put(&content_handle, envelope).await {
            if let Err(undo) = self.store.remove(&record.share_id).await {
                error!(
                    share = %record.share_id,
                    error = %undo,
                    "failed to roll back share record"
                );
            }
            return Err(e);
        }

        self.scheduler.schedule(record.share_id, record.expires_at);
        info!(
            share = %record.share_id,
            ttl_ms,
            expires_at = record.expires_at,
            "share created"
        );

        Ok(CreatedShare {
            share_id: record.share_id,
            expires_at: record.expires_at,
        })
    }

    /// Insert a fresh record for the handle, regenerating the id on collision.
    async fn insert_record(
        &self,
        content_handle: &ContentHandle,
        sealed: SealedKey,
        created_at: i64,
        ttl_ms: i64,
    ) -> Result<ShareRecord> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let record = ShareRecord::new(
                ShareId::generate(),
                content_handle.clone(),
                sealed.clone(),
                created_at,
                ttl_ms,
            );
            match self.store.insert(&record).await? {
                InsertResult::Inserted => return Ok(record),
                InsertResult::ContentInUse => {
                    return Err(ShareError::ContentInUse(content_handle.clone()))
                }
                InsertResult::AlreadyExists => {
                    warn!(attempt, "share id collision, regenerating");
                }
            }
        }
        Err(ShareError::Internal("could not allocate a share id".into()))
    }

    /// Verify the password and consume the share.
    pub async fn access_share(&self, share_id: &ShareId, password: &str) -> Result<SharedContent> {
        match self.access.access(share_id, password).await {
            Ok(content) => Ok(content),
            Err(ShareError::Expired) if self.config.share.alias_expired_as_not_found => {
                Err(ShareError::NotFound)
            }
            Err(e) => {
                if e.is_fault() {
                    error!(share = %share_id, error = %e, code = e.code(), "access failed");
                }
                Err(e)
            }
        }
    }

    /// [`access_share`](Self::access_share) with the id in its external hex
    /// form. An unparsable id is `NotFound`.
    pub async fn access_share_hex(&self, share_id: &str, password: &str) -> Result<SharedContent> {
        match ShareId::from_hex(share_id) {
            Ok(id) => self.access_share(&id, password).await,
            Err(_) => {
                self.access.decoy(password).await;
                Err(ShareError::NotFound)
            }
        }
    }

    /// Delete a share outright, whatever its status.
    ///
    /// Returns whether a record existed.
    pub async fn force_delete(&self, share_id: &ShareId) -> Result<bool> {
        self.scheduler.cancel(share_id);

        match self.store.remove(share_id).await? {
            RemoveResult::Removed { released } => {
                if let Some(handle) = released {
                    self.content.delete(&handle).await?;
                }
                info!(share = %share_id, "share force-deleted");
                Ok(true)
            }
            RemoveResult::NotFound => Ok(false),
        }
    }

    /// Status and deadline for a share, without touching its secrets.
    pub async fn share_status(&self, share_id: &ShareId) -> Result<Option<ShareInfo>> {
        let now = self.clock.now_millis();
        Ok(self
            .store
            .get(share_id)
            .await?
            .map(|record| ShareInfo::from_record(&record, now)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Process lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Re-schedule every `Active` share found in the store.
    pub async fn recover(&self) -> Result<usize> {
        self.scheduler.recover().await
    }

    /// Start the expiry loop on the current tokio runtime.
    ///
    /// Returns false if it is already running.
    pub fn spawn_scheduler(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        self.shutdown.send_replace(false);
        let scheduler = self.scheduler.clone();
        *task = Some(tokio::spawn(scheduler.run(self.shutdown.subscribe())));
        true
    }

    /// Stop the expiry loop and apply the shutdown policy.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.send_replace(true);

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.await
                .map_err(|e| ShareError::Internal(format!("scheduler task failed: {}", e)))?;
        }

        if self.config.scheduler.shutdown == ShutdownPolicy::ExpireOutstanding {
            let expired = self.scheduler.expire_outstanding().await;
            info!(expired, "expired outstanding shares on shutdown");
        }
        Ok(())
    }
}
