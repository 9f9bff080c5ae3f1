//! # Vanish
//!
//! The share engine: password-protected, single-use, self-expiring file
//! shares.
//!
//! ## Overview
//!
//! A share is created from content already staged in a [`ContentStore`].
//! The engine encrypts it under a fresh content key, wraps that key under
//! the share password and schedules the share's expiry. The first access
//! with the right password before the deadline gets the plaintext exactly
//! once; everything else gets one of a small set of outcomes:
//!
//! - **not_found**: no such share, or it was already consumed
//! - **expired**: the deadline passed first
//! - **locked**: too many wrong passwords
//! - **auth_failed**: wrong password, budget not yet spent
//!
//! Every terminal transition purges the wrapped key and deletes the content,
//! and all of them go through one compare-and-transition per share, so the
//! expiry timer and concurrent access attempts cannot double-process a
//! share.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use vanish::{EngineConfig, MemoryContentStore, ShareEngine};
//! use vanish::content::ContentStore;
//! use vanish::core::ContentHandle;
//! use vanish::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("shares.db").unwrap();
//!     let content = MemoryContentStore::new();
//!     let engine = ShareEngine::new(store, content, EngineConfig::default()).unwrap();
//!     engine.recover().await.unwrap();
//!     engine.spawn_scheduler();
//!
//!     let handle = ContentHandle::new("upload-1");
//!     engine.content().put(&handle, Bytes::from_static(b"secret")).await.unwrap();
//!     let share = engine.create_share(handle, "correcthorse1", None).await.unwrap();
//!
//!     let opened = engine
//!         .access_share(&share.share_id, "correcthorse1")
//!         .await
//!         .unwrap();
//!     assert_eq!(&opened.plaintext[..], b"secret");
//!
//!     engine.shutdown().await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vanish::core` - Ids, records, policies, clocks
//! - `vanish::crypto` - Key wrapping and content envelopes
//! - `vanish::store` - Share record storage (memory and SQLite)

pub mod access;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod pool;
pub mod scheduler;

pub use vanish_core as core;
pub use vanish_crypto as crypto;
pub use vanish_store as store;

pub use access::{AccessController, SharedContent};
pub use config::{EngineConfig, SchedulerConfig, ShutdownPolicy};
pub use content::{ContentStore, MemoryContentStore};
pub use engine::{CreatedShare, ShareEngine, ShareInfo};
pub use error::{Result, ShareError};
pub use pool::KdfPool;
pub use scheduler::ExpiryScheduler;

pub use vanish_core::{
    Clock, ContentHandle, KdfParams, LockoutPolicy, ManualClock, ShareId, ShareStatus,
    SharePolicy, SystemClock,
};
