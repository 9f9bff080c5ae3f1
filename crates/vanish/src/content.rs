//! Content store: where the (encrypted) file bytes live.
//!
//! The engine only ever holds a [`ContentHandle`]. An upload layer stages the
//! plaintext under a handle, create-share replaces it with the encrypted
//! envelope, and a terminal transition deletes it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use vanish_core::ContentHandle;

use crate::error::{Result, ShareError};

/// Async blob storage keyed by content handle.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read the blob under `handle`, if any.
    async fn get(&self, handle: &ContentHandle) -> Result<Option<Bytes>>;

    /// Write `data` under `handle`, replacing what was there.
    async fn put(&self, handle: &ContentHandle, data: Bytes) -> Result<()>;

    /// Delete the blob. Returns whether anything was there.
    async fn delete(&self, handle: &ContentHandle) -> Result<bool>;
}

#[async_trait]
impl<C: ContentStore + ?Sized> ContentStore for Arc<C> {
    async fn get(&self, handle: &ContentHandle) -> Result<Option<Bytes>> {
        (**self).get(handle).await
    }

    async fn put(&self, handle: &ContentHandle, data: Bytes) -> Result<()> {
        (**self).put(handle, data).await
    }

    async fn delete(&self, handle: &ContentHandle) -> Result<bool> {
        (**self).delete(handle).await
    }
}

/// In-memory content store.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<ContentHandle, Bytes>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs held.
    pub fn len(&self) -> usize {
        self.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a blob exists under `handle`.
    pub fn contains(&self, handle: &ContentHandle) -> bool {
        self.read().map(|b| b.contains_key(handle)).unwrap_or(false)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ContentHandle, Bytes>>> {
        self.blobs
            .read()
            .map_err(|e| ShareError::Content(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ContentHandle, Bytes>>> {
        self.blobs
            .write()
            .map_err(|e| ShareError::Content(format!("lock poisoned: {}", e)))
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get(&self, handle: &ContentHandle) -> Result<Option<Bytes>> {
        Ok(self.read()?.get(handle).cloned())
    }

    async fn put(&self, handle: &ContentHandle, data: Bytes) -> Result<()> {
        self.write()?.insert(handle.clone(), data);
        Ok(())
    }

    async fn delete(&self, handle: &ContentHandle) -> Result<bool> {
        Ok(self.write()?.remove(handle).is_some())
    }
}
