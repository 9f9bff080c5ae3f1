//! Bounded pool for key derivations.
//!
//! Argon2id is deliberately slow and memory hungry. Derivations run on
//! tokio's blocking threads, at most `size` at a time, so a burst of access
//! attempts queues here instead of starving the runtime.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{Result, ShareError};

/// A semaphore-gated front for `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct KdfPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl KdfPool {
    /// Create a pool running at most `size` jobs at once (minimum 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a blocking thread once a permit is free.
    ///
    /// The permit moves into the blocking task, so it stays held until the
    /// job finishes even if the caller stops waiting.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ShareError::Unavailable("kdf pool closed".into()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| ShareError::Internal(format!("kdf worker failed: {}", e)))
    }
}
