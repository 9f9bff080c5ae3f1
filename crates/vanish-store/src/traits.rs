//! ShareStore trait: the abstract interface for share persistence.
//!
//! This trait allows the engine to be storage-agnostic. Implementations
//! include SQLite (durable) and in-memory.

use async_trait::async_trait;
use vanish_core::{ContentHandle, ShareId, ShareRecord, ShareStatus};

use crate::error::Result;

/// Result of inserting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// A record with this id already exists (nothing was written).
    AlreadyExists,
    /// A live record already holds this content handle (nothing was written).
    ContentInUse,
}

/// Result of removing a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveResult {
    /// The record was removed; `released` is its content handle if it still had one.
    Removed { released: Option<ContentHandle> },
    /// No record with this id.
    NotFound,
}

/// Result of a compare-and-transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// The transition ran. `record` is the stored state afterwards; when the
    /// transition was terminal, `released` carries the content handle that
    /// the purge detached so the caller can delete the blob.
    Applied {
        record: ShareRecord,
        released: Option<ContentHandle>,
    },
    /// The record was not in the expected status.
    Conflict { current: ShareStatus },
    /// No record with this id.
    NotFound,
}

/// A mutation run on the current record inside the atomic section.
pub type Mutator = Box<dyn FnOnce(&mut ShareRecord) + Send>;

/// A guarded status change: only applies when the record is in `expected`.
pub struct Transition {
    pub expected: ShareStatus,
    pub next: ShareStatus,
    /// Time of the transition (Unix ms), stamped as `closed_at` when terminal.
    pub at: i64,
    mutator: Option<Mutator>,
}

impl Transition {
    pub fn new(expected: ShareStatus, next: ShareStatus, at: i64) -> Self {
        Self {
            expected,
            next,
            at,
            mutator: None,
        }
    }

    /// Attach a mutation to run before the status change.
    pub fn with(mut self, mutator: impl FnOnce(&mut ShareRecord) + Send + 'static) -> Self {
        self.mutator = Some(Box::new(mutator));
        self
    }

    /// Apply to a record already known to be in `expected`.
    ///
    /// Identity and deadline are restored after the mutator runs, so no
    /// transition can move them. Terminal transitions purge secrets.
    pub fn apply(self, record: &mut ShareRecord) -> Option<ContentHandle> {
        let share_id = record.share_id;
        let created_at = record.created_at;
        let expires_at = record.expires_at;

        if let Some(mutate) = self.mutator {
            mutate(record);
        }

        record.share_id = share_id;
        record.created_at = created_at;
        record.expires_at = expires_at;
        record.status = self.next;

        if self.next.is_terminal() {
            record.purge(self.at)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("expected", &self.expected)
            .field("next", &self.next)
            .field("at", &self.at)
            .field("mutator", &self.mutator.is_some())
            .finish()
    }
}

/// The ShareStore trait: async interface for share persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the runtime.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Insert a new record. Only the lifecycle manager calls this.
    ///
    /// A content handle belongs to at most one non-terminal record; tombstones
    /// have released theirs.
    async fn insert(&self, record: &ShareRecord) -> Result<InsertResult>;

    /// Get a record by id. Terminal records come back as tombstones.
    async fn get(&self, id: &ShareId) -> Result<Option<ShareRecord>>;

    /// Atomically check the status and apply a transition.
    ///
    /// This is the single serialization point per share.
    async fn compare_and_transition(
        &self,
        id: &ShareId,
        transition: Transition,
    ) -> Result<TransitionResult>;

    /// Delete a record outright, tombstone or not.
    async fn remove(&self, id: &ShareId) -> Result<RemoveResult>;

    /// Ids and deadlines of every `Active` record, for rescheduling after restart.
    async fn list_active(&self) -> Result<Vec<(ShareId, i64)>>;

    /// Delete tombstones closed strictly before `closed_before`. Returns how many.
    async fn reap_tombstones(&self, closed_before: i64) -> Result<usize>;
}

#[async_trait]
impl<S: ShareStore + ?Sized> ShareStore for std::sync::Arc<S> {
    async fn insert(&self, record: &ShareRecord) -> Result<InsertResult> {
        (**self).insert(record).await
    }

    async fn get(&self, id: &ShareId) -> Result<Option<ShareRecord>> {
        (**self).get(id).await
    }

    async fn compare_and_transition(
        &self,
        id: &ShareId,
        transition: Transition,
    ) -> Result<TransitionResult> {
        (**self).compare_and_transition(id, transition).await
    }

    async fn remove(&self, id: &ShareId) -> Result<RemoveResult> {
        (**self).remove(id).await
    }

    async fn list_active(&self) -> Result<Vec<(ShareId, i64)>> {
        (**self).list_active().await
    }

    async fn reap_tombstones(&self, closed_before: i64) -> Result<usize> {
        (**self).reap_tombstones(closed_before).await
    }
}
