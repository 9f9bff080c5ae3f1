//! Create, access and delete through the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use vanish::core::ShareRecord;
use vanish::store::{
    InsertResult, MemoryStore, RemoveResult, ShareStore, StoreError, Transition, TransitionResult,
};
use vanish::{
    ContentHandle, ContentStore, ManualClock, MemoryContentStore, ShareEngine, ShareError,
    ShareId, ShareStatus,
};
use vanish_testkit::{init_tracing, test_config, TestEngine, START_MILLIS};

const PASSWORD: &str = "correcthorse1";

#[tokio::test]
async fn test_create_then_access_returns_plaintext_once() {
    init_tracing();
    let t = TestEngine::new();

    let share = t.share(b"the file", PASSWORD, None).await.unwrap();
    assert_eq!(share.expires_at, START_MILLIS + 47_000);

    let opened = t.engine.access_share(&share.share_id, PASSWORD).await.unwrap();
    assert_eq!(&opened.plaintext[..], b"the file");

    let again = t.engine.access_share(&share.share_id, PASSWORD).await.unwrap_err();
    assert!(matches!(again, ShareError::NotFound));
}

#[tokio::test]
async fn test_staged_content_is_encrypted_in_place() {
    let t = TestEngine::new();
    let handle = t.stage(b"plaintext bytes").await.unwrap();

    let share = t
        .engine
        .create_share(handle.clone(), PASSWORD, None)
        .await
        .unwrap();

    let stored = t.content.get(&handle).await.unwrap().unwrap();
    assert_ne!(&stored[..], b"plaintext bytes");
    assert!(!stored
        .windows(b"plaintext".len())
        .any(|w| w == b"plaintext"));

    let opened = t.engine.access_share(&share.share_id, PASSWORD).await.unwrap();
    assert_eq!(opened.content_handle, handle);
    assert!(!t.content.contains(&handle));
}

#[tokio::test]
async fn test_create_validates_input() {
    let t = TestEngine::new();
    let handle = t.stage(b"data").await.unwrap();

    let err = t
        .engine
        .create_share(handle.clone(), "short", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ShareError::WeakPassword { min_chars: 8 }));
    assert_eq!(err.code(), "weak_password");

    let err = t
        .engine
        .create_share(handle.clone(), PASSWORD, Some(Duration::ZERO))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_ttl");

    let err = t
        .engine
        .create_share(handle, PASSWORD, Some(Duration::from_secs(25 * 60 * 60)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_ttl");

    let err = t
        .engine
        .create_share(ContentHandle::new("never-staged"), PASSWORD, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ShareError::ContentNotFound(_)));

    // Nothing was created along the way.
    assert!(t.engine.store().is_empty());
}

#[tokio::test]
async fn test_share_ids_are_distinct() {
    let t = TestEngine::new();
    let a = t.share(b"same", PASSWORD, None).await.unwrap();
    let b = t.share(b"same", PASSWORD, None).await.unwrap();
    assert_ne!(a.share_id, b.share_id);
    assert_eq!(a.share_id.to_hex().len(), 64);
}

#[tokio::test]
async fn test_unknown_and_malformed_ids_are_not_found() {
    let t = TestEngine::new();

    let err = t
        .engine
        .access_share(&ShareId::from_bytes([7; 32]), PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");

    let err = t
        .engine
        .access_share_hex("not-a-share-id", PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn test_access_by_hex_id() {
    let t = TestEngine::new();
    let share = t.share(b"via hex", PASSWORD, None).await.unwrap();

    let opened = t
        .engine
        .access_share_hex(&share.share_id.to_hex(), PASSWORD)
        .await
        .unwrap();
    assert_eq!(&opened.plaintext[..], b"via hex");
}

#[tokio::test]
async fn test_consumed_share_is_purged() {
    let t = TestEngine::new();
    let share = t.share(b"data", PASSWORD, None).await.unwrap();

    t.engine.access_share(&share.share_id, PASSWORD).await.unwrap();

    let record = t.engine.store().get(&share.share_id).await.unwrap().unwrap();
    assert_eq!(record.status, ShareStatus::Consumed);
    assert!(record.sealed.is_none());
    assert!(record.content_handle.is_none());
    assert_eq!(record.failed_attempts, 0);
    assert_eq!(record.lock_cycles, 0);
    assert!(t.content.is_empty());
    assert_eq!(t.engine.scheduler().pending(), 0);
}

#[tokio::test]
async fn test_force_delete() {
    let t = TestEngine::new();
    let share = t.share(b"data", PASSWORD, None).await.unwrap();

    assert!(t.engine.force_delete(&share.share_id).await.unwrap());
    assert!(t.content.is_empty());
    assert_eq!(t.engine.scheduler().pending(), 0);
    assert_eq!(t.status(&share.share_id).await.unwrap(), None);

    assert!(!t.engine.force_delete(&share.share_id).await.unwrap());

    let err = t
        .engine
        .access_share(&share.share_id, PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn test_force_delete_removes_tombstone() {
    let t = TestEngine::new();
    let share = t.share(b"data", PASSWORD, None).await.unwrap();
    t.engine.access_share(&share.share_id, PASSWORD).await.unwrap();

    assert!(t.engine.force_delete(&share.share_id).await.unwrap());
    assert!(t.engine.store().is_empty());
}

#[tokio::test]
async fn test_share_status_is_secret_free() {
    let t = TestEngine::new();
    let share = t
        .share(b"data", PASSWORD, Some(Duration::from_secs(10)))
        .await
        .unwrap();

    t.advance(Duration::from_secs(4));
    let info = t.engine.share_status(&share.share_id).await.unwrap().unwrap();
    assert_eq!(info.status, ShareStatus::Active);
    assert_eq!(info.expires_at, share.expires_at);
    assert_eq!(info.remaining_ms, 6_000);
    assert_eq!(info.locked_until, None);

    // Deadline passed but the scheduler has not run yet.
    t.advance(Duration::from_secs(7));
    let info = t.engine.share_status(&share.share_id).await.unwrap().unwrap();
    assert_eq!(info.status, ShareStatus::Expired);
    assert_eq!(info.remaining_ms, 0);

    assert!(t
        .engine
        .share_status(&ShareId::from_bytes([1; 32]))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_tampered_content_fails_integrity() {
    let t = TestEngine::new();
    let handle = t.stage(b"data").await.unwrap();
    let share = t
        .engine
        .create_share(handle.clone(), PASSWORD, None)
        .await
        .unwrap();

    let mut blob = t.content.get(&handle).await.unwrap().unwrap().to_vec();
    let last = blob.len() - 1;
    blob[last] ^= 0x01;
    t.content.put(&handle, Bytes::from(blob)).await.unwrap();

    let err = t
        .engine
        .access_share(&share.share_id, PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, ShareError::IntegrityFailed));
    assert_eq!(err.code(), "internal");

    // The share is spent and its content removed regardless.
    assert_eq!(
        t.status(&share.share_id).await.unwrap(),
        Some(ShareStatus::Consumed)
    );
    assert!(t.content.is_empty());
}

#[tokio::test]
async fn test_expired_can_alias_not_found() {
    let mut config = test_config();
    config.share.alias_expired_as_not_found = true;
    let t = TestEngine::with_config(config);

    let share = t
        .share(b"data", PASSWORD, Some(Duration::from_secs(1)))
        .await
        .unwrap();
    t.advance(Duration::from_secs(2));

    let err = t
        .engine
        .access_share(&share.share_id, PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
    assert_eq!(
        t.status(&share.share_id).await.unwrap(),
        Some(ShareStatus::Expired)
    );
}

#[tokio::test]
async fn test_handle_backs_one_live_share() {
    let t = TestEngine::new();
    let handle = t.stage(b"first upload").await.unwrap();
    let first = t
        .engine
        .create_share(handle.clone(), PASSWORD, None)
        .await
        .unwrap();
    let sealed_blob = t.content.get(&handle).await.unwrap().unwrap();

    let err = t
        .engine
        .create_share(handle.clone(), "another-password", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ShareError::ContentInUse(ref h) if *h == handle));
    assert_eq!(err.code(), "content_in_use");
    assert_eq!(t.content.get(&handle).await.unwrap().unwrap(), sealed_blob);

    let opened = t.engine.access_share(&first.share_id, PASSWORD).await.unwrap();
    assert_eq!(&opened.plaintext[..], b"first upload");

    // Once that share is over, the handle can carry a new upload.
    t.content
        .put(&handle, Bytes::from_static(b"second upload"))
        .await
        .unwrap();
    let second = t
        .engine
        .create_share(handle.clone(), PASSWORD, None)
        .await
        .unwrap();
    let opened = t.engine.access_share(&second.share_id, PASSWORD).await.unwrap();
    assert_eq!(&opened.plaintext[..], b"second upload");
}

/// Share store that is down for writes.
struct ReadOnlyStore;

#[async_trait]
impl ShareStore for ReadOnlyStore {
    async fn insert(&self, _record: &ShareRecord) -> vanish::store::Result<InsertResult> {
        Err(StoreError::Unavailable("read-only".into()))
    }

    async fn get(&self, _id: &ShareId) -> vanish::store::Result<Option<ShareRecord>> {
        Ok(None)
    }

    async fn compare_and_transition(
        &self,
        _id: &ShareId,
        _transition: Transition,
    ) -> vanish::store::Result<TransitionResult> {
        Ok(TransitionResult::NotFound)
    }

    async fn remove(&self, _id: &ShareId) -> vanish::store::Result<RemoveResult> {
        Ok(RemoveResult::NotFound)
    }

    async fn list_active(&self) -> vanish::store::Result<Vec<(ShareId, i64)>> {
        Ok(Vec::new())
    }

    async fn reap_tombstones(&self, _closed_before: i64) -> vanish::store::Result<usize> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_failed_insert_keeps_staged_plaintext() {
    let t = TestEngine::with_store(ReadOnlyStore, test_config());
    let handle = t.stage(b"precious upload").await.unwrap();

    let err = t
        .engine
        .create_share(handle.clone(), PASSWORD, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unavailable");

    let blob = t.content.get(&handle).await.unwrap().unwrap();
    assert_eq!(&blob[..], b"precious upload");
    assert_eq!(t.engine.scheduler().pending(), 0);
}

/// Content store whose writes can be switched off.
#[derive(Default)]
struct FlakyContent {
    inner: MemoryContentStore,
    refuse_puts: AtomicBool,
}

#[async_trait]
impl ContentStore for FlakyContent {
    async fn get(&self, handle: &ContentHandle) -> vanish::Result<Option<Bytes>> {
        self.inner.get(handle).await
    }

    async fn put(&self, handle: &ContentHandle, data: Bytes) -> vanish::Result<()> {
        if self.refuse_puts.load(Ordering::SeqCst) {
            return Err(ShareError::Content("disk full".into()));
        }
        self.inner.put(handle, data).await
    }

    async fn delete(&self, handle: &ContentHandle) -> vanish::Result<bool> {
        self.inner.delete(handle).await
    }
}

#[tokio::test]
async fn test_failed_content_write_rolls_back_record() {
    let content = Arc::new(FlakyContent::default());
    let engine = ShareEngine::with_clock(
        MemoryStore::new(),
        content.clone(),
        test_config(),
        Arc::new(ManualClock::new(START_MILLIS)),
    )
    .unwrap();

    let handle = ContentHandle::new("upload");
    content
        .put(&handle, Bytes::from_static(b"precious upload"))
        .await
        .unwrap();
    content.refuse_puts.store(true, Ordering::SeqCst);

    let err = engine
        .create_share(handle.clone(), PASSWORD, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ShareError::Content(_)));

    assert!(engine.store().is_empty());
    assert_eq!(engine.scheduler().pending(), 0);
    let blob = content.get(&handle).await.unwrap().unwrap();
    assert_eq!(&blob[..], b"precious upload");

    // The handle was released with the record.
    content.refuse_puts.store(false, Ordering::SeqCst);
    let share = engine.create_share(handle, PASSWORD, None).await.unwrap();
    let opened = engine.access_share(&share.share_id, PASSWORD).await.unwrap();
    assert_eq!(&opened.plaintext[..], b"precious upload");
}
