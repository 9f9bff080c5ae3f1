//! Expiry scheduler.
//!
//! Deadlines live in a min-heap keyed by `expires_at`. Cancelling only drops
//! the id from the `pending` map; the heap entry goes stale and is skipped
//! when it reaches the top, or dropped when the heap is compacted. Firing goes through the store's
//! compare-and-transition, so a share consumed or deleted a moment earlier
//! simply loses the race and nothing happens.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};
use vanish_core::{Clock, ShareId, ShareStatus};
use vanish_store::{ShareStore, Transition, TransitionResult};

use crate::config::SchedulerConfig;
use crate::content::ContentStore;
use crate::error::Result;

/// Below this many heap entries stale ones are left to surface on their own.
const COMPACT_MIN_LEN: usize = 64;

#[derive(Debug, Default)]
struct DeadlineQueue {
    heap: BinaryHeap<Reverse<(i64, ShareId)>>,
    /// Live deadline per share. Heap entries that disagree are stale.
    pending: HashMap<ShareId, i64>,
}

impl DeadlineQueue {
    /// Returns true when `expires_at` became the earliest deadline.
    fn push(&mut self, id: ShareId, expires_at: i64) -> bool {
        let earliest = self.peek().map_or(true, |next| expires_at < next);
        self.pending.insert(id, expires_at);
        self.heap.push(Reverse((expires_at, id)));
        self.maybe_compact();
        earliest
    }

    fn cancel(&mut self, id: &ShareId) -> bool {
        let cancelled = self.pending.remove(id).is_some();
        self.maybe_compact();
        cancelled
    }

    /// Drop stale entries once they outnumber the live ones.
    fn maybe_compact(&mut self) {
        if self.heap.len() <= COMPACT_MIN_LEN || self.heap.len() <= 2 * self.pending.len() {
            return;
        }
        let pending = &self.pending;
        self.heap.retain(|Reverse((at, id))| pending.get(id) == Some(at));
    }

    fn is_live(&self, id: &ShareId, at: i64) -> bool {
        self.pending.get(id) == Some(&at)
    }

    fn peek(&mut self) -> Option<i64> {
        while let Some(Reverse((at, id))) = self.heap.peek().copied() {
            if self.is_live(&id, at) {
                return Some(at);
            }
            self.heap.pop();
        }
        None
    }

    fn pop_due(&mut self, now: i64) -> Vec<ShareId> {
        let mut due = Vec::new();
        while let Some(Reverse((at, id))) = self.heap.peek().copied() {
            if at > now {
                break;
            }
            self.heap.pop();
            if self.is_live(&id, at) {
                self.pending.remove(&id);
                due.push(id);
            }
        }
        due
    }

    fn drain(&mut self) -> Vec<ShareId> {
        self.heap.clear();
        self.pending.drain().map(|(id, _)| id).collect()
    }
}

/// Fires `Active → Expired` for each share at its deadline.
pub struct ExpiryScheduler<S, C> {
    store: Arc<S>,
    content: Arc<C>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    queue: Mutex<DeadlineQueue>,
    wake: Notify,
}

impl<S: ShareStore, C: ContentStore> ExpiryScheduler<S, C> {
    pub fn new(
        store: Arc<S>,
        content: Arc<C>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            content,
            clock,
            config,
            queue: Mutex::new(DeadlineQueue::default()),
            wake: Notify::new(),
        }
    }

    fn queue(&self) -> MutexGuard<'_, DeadlineQueue> {
        // The queue holds no invariants a panicking holder could break halfway.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register (or move) the deadline for a share.
    pub fn schedule(&self, id: ShareId, expires_at: i64) {
        if self.queue().push(id, expires_at) {
            self.wake.notify_one();
        }
    }

    /// Forget a share's deadline. Returns whether one was pending.
    pub fn cancel(&self, id: &ShareId) -> bool {
        self.queue().cancel(id)
    }

    /// Number of shares with a live deadline.
    pub fn pending(&self) -> usize {
        self.queue().pending.len()
    }

    /// The earliest live deadline.
    pub fn next_deadline(&self) -> Option<i64> {
        self.queue().peek()
    }

    /// Expire every share whose deadline has been reached. Returns how many
    /// this call moved to `Expired`.
    pub async fn fire_due(&self) -> usize {
        let now = self.clock.now_millis();
        let due = self.queue().pop_due(now);

        let mut expired = 0;
        for id in due {
            match self.expire(&id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(share = %id, error = %e, "expiry failed, will retry");
                    let retry_at = now.saturating_add(self.config.retry_delay_ms as i64);
                    self.queue().push(id, retry_at);
                }
            }
        }
        expired
    }

    /// Move one share to `Expired` now, purging it and deleting its blob.
    ///
    /// Returns `false` when the share was already terminal or gone.
    pub async fn expire(&self, id: &ShareId, now: i64) -> Result<bool> {
        self.cancel(id);

        let transition = Transition::new(ShareStatus::Active, ShareStatus::Expired, now);
        match self.store.compare_and_transition(id, transition).await? {
            TransitionResult::Applied { record, released } => {
                if let Some(handle) = released {
                    if let Err(e) = self.content.delete(&handle).await {
                        error!(share = %id, error = %e, "failed to delete expired content");
                    }
                }
                info!(share = %id, expires_at = record.expires_at, "share expired");
                Ok(true)
            }
            TransitionResult::Conflict { current } => {
                debug!(share = %id, ?current, "expiry lost race");
                Ok(false)
            }
            TransitionResult::NotFound => {
                debug!(share = %id, "expiry found no record");
                Ok(false)
            }
        }
    }

    /// Delete tombstones older than the retention window.
    pub async fn reap(&self) -> Result<usize> {
        let retention = i64::try_from(self.config.tombstone_retention_ms).unwrap_or(i64::MAX);
        let cutoff = self.clock.now_millis().saturating_sub(retention);
        let reaped = self.store.reap_tombstones(cutoff).await?;
        if reaped > 0 {
            debug!(reaped, "reaped tombstones");
        }
        Ok(reaped)
    }

    /// Re-register every `Active` share found in the store.
    ///
    /// Overdue shares are expired on the next tick.
    pub async fn recover(&self) -> Result<usize> {
        let active = self.store.list_active().await?;
        let count = active.len();
        for (id, expires_at) in active {
            self.schedule(id, expires_at);
        }
        info!(count, "recovered pending shares");
        Ok(count)
    }

    /// Expire every share still pending, regardless of deadline.
    pub async fn expire_outstanding(&self) -> usize {
        let now = self.clock.now_millis();
        let ids = self.queue().drain();

        let mut expired = 0;
        for id in ids {
            match self.expire(&id, now).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => error!(share = %id, error = %e, "expiry on shutdown failed"),
            }
        }
        expired
    }

    /// Drive the scheduler until `shutdown` flips to true or its sender drops.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(pending = self.pending(), "expiry scheduler started");

        while !*shutdown.borrow() {
            self.fire_due().await;
            if let Err(e) = self.reap().await {
                warn!(error = %e, "tombstone reaping failed");
            }

            let idle = self.config.max_idle();
            let wait = match self.next_deadline() {
                Some(at) => {
                    let ms = at.saturating_sub(self.clock.now_millis()).max(0);
                    Duration::from_millis(ms as u64).min(idle)
                }
                None => idle,
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.wake.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(pending = self.pending(), "expiry scheduler stopped");
    }
}
