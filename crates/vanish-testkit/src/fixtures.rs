//! Test fixtures and helpers.
//!
//! Common setup code for engine tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use rand::RngCore;
use vanish::{
    ContentStore, CreatedShare, EngineConfig, MemoryContentStore, ShareEngine, SharedContent,
};
use vanish_core::{Clock, ContentHandle, KdfParams, ManualClock, ShareId, ShareStatus};
use vanish_store::{MemoryStore, ShareStore};

/// Fixed start time for manual clocks (2023-11-14T22:13:20Z).
pub const START_MILLIS: i64 = 1_700_000_000_000;

/// Argon2id parameters cheap enough to run hundreds of times per test.
pub fn cheap_kdf() -> KdfParams {
    KdfParams {
        m_cost_kib: 64,
        t_cost: 1,
        p_cost: 1,
    }
}

/// Default engine config with cheap derivation and a fixed worker count.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        kdf: cheap_kdf(),
        workers: 4,
        ..EngineConfig::default()
    }
}

/// Install a fmt subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// An engine on a manual clock with an in-memory content store.
///
/// The clock and content store are shared handles so a test can restart the
/// engine on a new share store and keep both.
pub struct TestEngine<S = MemoryStore> {
    pub engine: ShareEngine<S, Arc<MemoryContentStore>>,
    pub clock: Arc<ManualClock>,
    pub content: Arc<MemoryContentStore>,
}

impl TestEngine<MemoryStore> {
    /// Memory-backed engine with [`test_config`].
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }
}

impl Default for TestEngine<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ShareStore + 'static> TestEngine<S> {
    /// Engine over `store`, starting at [`START_MILLIS`].
    ///
    /// Panics if `config` does not validate.
    pub fn with_store(store: S, config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let content = Arc::new(MemoryContentStore::new());
        Self::assemble(store, config, clock, content)
    }

    fn assemble(
        store: S,
        config: EngineConfig,
        clock: Arc<ManualClock>,
        content: Arc<MemoryContentStore>,
    ) -> Self {
        let engine = ShareEngine::with_clock(store, content.clone(), config, clock.clone())
            .expect("test config must validate");
        Self {
            engine,
            clock,
            content,
        }
    }

    /// Build a fresh engine over `store` with the same clock, content and
    /// config, as after a process restart. The old engine is dropped first.
    pub fn restart<T: ShareStore + 'static>(self, store: T) -> TestEngine<T> {
        let config = self.engine.config().clone();
        let clock = self.clock.clone();
        let content = self.content.clone();
        drop(self);
        TestEngine::assemble(store, config, clock, content)
    }

    /// Current manual time.
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Move the clock to `START_MILLIS + offset`.
    pub fn set_elapsed(&self, offset: Duration) {
        let offset = i64::try_from(offset.as_millis()).unwrap_or(i64::MAX);
        self.clock.set(START_MILLIS + offset);
    }

    /// Run one scheduler pass. Returns how many shares expired.
    pub async fn tick(&self) -> usize {
        self.engine.scheduler().fire_due().await
    }

    /// Stage `data` in the content store under a fresh handle.
    pub async fn stage(&self, data: &[u8]) -> anyhow::Result<ContentHandle> {
        let mut suffix = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut suffix);
        let handle = ContentHandle::new(format!("upload-{}", hex::encode(suffix)));

        self.content
            .put(&handle, Bytes::copy_from_slice(data))
            .await
            .context("staging content")?;
        Ok(handle)
    }

    /// Stage `data` and create a share for it.
    pub async fn share(
        &self,
        data: &[u8],
        password: &str,
        ttl: Option<Duration>,
    ) -> anyhow::Result<CreatedShare> {
        let handle = self.stage(data).await?;
        self.engine
            .create_share(handle, password, ttl)
            .await
            .context("creating share")
    }

    /// Access a share, returning the error code on failure.
    pub async fn open(&self, id: &ShareId, password: &str) -> Result<SharedContent, &'static str> {
        self.engine
            .access_share(id, password)
            .await
            .map_err(|e| e.code())
    }

    /// Stored status of a share, `None` once the record is gone.
    pub async fn status(&self, id: &ShareId) -> anyhow::Result<Option<ShareStatus>> {
        Ok(self
            .engine
            .store()
            .get(id)
            .await
            .context("reading share record")?
            .map(|r| r.status))
    }

    /// Whether the stored record still carries a key or content handle.
    pub async fn holds_secrets(&self, id: &ShareId) -> anyhow::Result<bool> {
        Ok(self
            .engine
            .store()
            .get(id)
            .await
            .context("reading share record")?
            .is_some_and(|r| r.holds_secrets()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_share_roundtrip() {
        let t = TestEngine::new();
        let share = t.share(b"hello", "correcthorse1", None).await.unwrap();

        assert_eq!(share.expires_at, START_MILLIS + 47_000);
        assert_eq!(t.status(&share.share_id).await.unwrap(), Some(ShareStatus::Active));

        let opened = t.open(&share.share_id, "correcthorse1").await.unwrap();
        assert_eq!(&opened.plaintext[..], b"hello");
        assert!(!t.holds_secrets(&share.share_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_fixture_clock() {
        let t = TestEngine::new();
        t.advance(Duration::from_secs(3));
        assert_eq!(t.now(), START_MILLIS + 3_000);
        t.set_elapsed(Duration::from_secs(1));
        assert_eq!(t.now(), START_MILLIS + 1_000);
    }

    #[tokio::test]
    async fn test_staged_handles_are_distinct() {
        let t = TestEngine::new();
        let a = t.stage(b"a").await.unwrap();
        let b = t.stage(b"b").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(t.content.len(), 2);
    }
}
