//! In-memory implementation of the ShareStore trait.
//!
//! Same semantics as SQLite but keeps everything in memory with no
//! persistence. Suitable for tests and single-process deployments that
//! expire everything on shutdown.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use vanish_core::{ShareId, ShareRecord, ShareStatus};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, RemoveResult, ShareStore, Transition, TransitionResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<ShareId, ShareRecord>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, tombstones included.
    pub fn len(&self) -> usize {
        self.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ShareId, ShareRecord>>> {
        self.records
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ShareId, ShareRecord>>> {
        self.records
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn insert(&self, record: &ShareRecord) -> Result<InsertResult> {
        let mut records = self.write()?;

        if records.contains_key(&record.share_id) {
            return Ok(InsertResult::AlreadyExists);
        }

        if let Some(handle) = &record.content_handle {
            if records
                .values()
                .any(|r| r.content_handle.as_ref() == Some(handle))
            {
                return Ok(InsertResult::ContentInUse);
            }
        }

        records.insert(record.share_id, record.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get(&self, id: &ShareId) -> Result<Option<ShareRecord>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn compare_and_transition(
        &self,
        id: &ShareId,
        transition: Transition,
    ) -> Result<TransitionResult> {
        let mut records = self.write()?;

        let Some(record) = records.get_mut(id) else {
            return Ok(TransitionResult::NotFound);
        };

        if record.status != transition.expected {
            return Ok(TransitionResult::Conflict {
                current: record.status,
            });
        }

        let released = transition.apply(record);
        Ok(TransitionResult::Applied {
            record: record.clone(),
            released,
        })
    }

    async fn remove(&self, id: &ShareId) -> Result<RemoveResult> {
        let mut records = self.write()?;

        Ok(match records.remove(id) {
            Some(mut record) => RemoveResult::Removed {
                released: record.content_handle.take(),
            },
            None => RemoveResult::NotFound,
        })
    }

    async fn list_active(&self) -> Result<Vec<(ShareId, i64)>> {
        let records = self.read()?;

        let mut active: Vec<(ShareId, i64)> = records
            .values()
            .filter(|r| r.status == ShareStatus::Active)
            .map(|r| (r.share_id, r.expires_at))
            .collect();

        active.sort_by_key(|(_, expires_at)| *expires_at);
        Ok(active)
    }

    async fn reap_tombstones(&self, closed_before: i64) -> Result<usize> {
        let mut records = self.write()?;
        let before = records.len();

        records.retain(|_, r| !matches!(r.closed_at, Some(closed) if closed < closed_before));

        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanish_core::{ContentHandle, KdfParams, SealedKey};

    fn make_test_record(seed: u8, created_at: i64) -> ShareRecord {
        ShareRecord::new(
            ShareId::from_bytes([seed; 32]),
            ContentHandle::new(format!("blob-{}", seed)),
            SealedKey {
                wrapped_key: vec![seed; 48],
                nonce: [seed; 12],
                salt: [seed; 16],
                kdf: KdfParams::default(),
            },
            created_at,
            47_000,
        )
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let record = make_test_record(1, 0);

        let result = store.insert(&record).await.unwrap();
        assert_eq!(result, InsertResult::Inserted);

        let retrieved = store.get(&record.share_id).await.unwrap().unwrap();
        assert_eq!(retrieved, record);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_id() {
        let store = MemoryStore::new();
        let record = make_test_record(1, 0);

        assert_eq!(store.insert(&record).await.unwrap(), InsertResult::Inserted);
        assert_eq!(
            store.insert(&record).await.unwrap(),
            InsertResult::AlreadyExists
        );
    }

    #[tokio::test]
    async fn test_content_handle_held_by_one_live_record() {
        let store = MemoryStore::new();
        let first = make_test_record(1, 0);
        let mut second = make_test_record(2, 0);
        second.content_handle = first.content_handle.clone();

        assert_eq!(store.insert(&first).await.unwrap(), InsertResult::Inserted);
        assert_eq!(
            store.insert(&second).await.unwrap(),
            InsertResult::ContentInUse
        );
        assert!(store.get(&second.share_id).await.unwrap().is_none());

        // A tombstone no longer holds the handle.
        let consume = Transition::new(ShareStatus::Active, ShareStatus::Consumed, 10);
        store
            .compare_and_transition(&first.share_id, consume)
            .await
            .unwrap();
        assert_eq!(store.insert(&second).await.unwrap(), InsertResult::Inserted);
    }

    #[tokio::test]
    async fn test_transition_conflict_after_terminal() {
        let store = MemoryStore::new();
        let record = make_test_record(1, 0);
        store.insert(&record).await.unwrap();

        let consume = Transition::new(ShareStatus::Active, ShareStatus::Consumed, 10);
        let result = store
            .compare_and_transition(&record.share_id, consume)
            .await
            .unwrap();
        assert!(matches!(
            result,
            TransitionResult::Applied { released: Some(_), .. }
        ));

        let expire = Transition::new(ShareStatus::Active, ShareStatus::Expired, 20);
        let result = store
            .compare_and_transition(&record.share_id, expire)
            .await
            .unwrap();
        assert_eq!(
            result,
            TransitionResult::Conflict {
                current: ShareStatus::Consumed
            }
        );

        let tombstone = store.get(&record.share_id).await.unwrap().unwrap();
        assert!(!tombstone.holds_secrets());
    }

    #[tokio::test]
    async fn test_transition_missing_record() {
        let store = MemoryStore::new();
        let t = Transition::new(ShareStatus::Active, ShareStatus::Expired, 0);
        let result = store
            .compare_and_transition(&ShareId::from_bytes([9; 32]), t)
            .await
            .unwrap();
        assert_eq!(result, TransitionResult::NotFound);
    }

    #[tokio::test]
    async fn test_list_active_and_reap() {
        let store = MemoryStore::new();
        let a = make_test_record(1, 2_000);
        let b = make_test_record(2, 1_000);
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        let active = store.list_active().await.unwrap();
        assert_eq!(active, vec![(b.share_id, 48_000), (a.share_id, 49_000)]);

        let expire = Transition::new(ShareStatus::Active, ShareStatus::Expired, 100);
        store.compare_and_transition(&a.share_id, expire).await.unwrap();
        assert_eq!(store.list_active().await.unwrap().len(), 1);

        assert_eq!(store.reap_tombstones(100).await.unwrap(), 0);
        assert_eq!(store.reap_tombstones(101).await.unwrap(), 1);
        assert!(store.get(&a.share_id).await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryStore::new();
        let record = make_test_record(1, 0);
        store.insert(&record).await.unwrap();

        assert_eq!(
            store.remove(&record.share_id).await.unwrap(),
            RemoveResult::Removed {
                released: Some(ContentHandle::new("blob-1"))
            }
        );
        assert_eq!(
            store.remove(&record.share_id).await.unwrap(),
            RemoveResult::NotFound
        );
    }
}
