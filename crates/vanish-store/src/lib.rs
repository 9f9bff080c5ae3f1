//! # Vanish Store
//!
//! Storage abstraction for share records. Provides a trait-based interface
//! with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store is the single point of truth for share state and the only
//! place mutations happen. Every change to an existing record goes through
//! [`ShareStore::compare_and_transition`], which is atomic per share, so the
//! access path and the expiry scheduler can race on the same record without
//! double-processing it.
//!
//! ## Key Types
//!
//! - [`ShareStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage
//! - [`Transition`] - An expected status, a next status and a mutation
//! - [`TransitionResult`] - `Applied`, `Conflict` or `NotFound`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vanish_core::{ShareId, ShareStatus};
//! use vanish_store::{SqliteStore, ShareStore, Transition, TransitionResult};
//!
//! async fn example(id: ShareId, now: i64) {
//!     let store = SqliteStore::open("shares.db").unwrap();
//!
//!     let expire = Transition::new(ShareStatus::Active, ShareStatus::Expired, now);
//!     match store.compare_and_transition(&id, expire).await.unwrap() {
//!         TransitionResult::Applied { .. } => { /* we expired it */ }
//!         TransitionResult::Conflict { .. } | TransitionResult::NotFound => { /* lost the race */ }
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Unique ids**: inserting an id that exists returns `AlreadyExists`
//! - **Atomic purge**: a transition into a terminal status strips the sealed
//!   key, content handle and counters in the same step
//! - **Tombstones**: terminal records stay (without secrets) until reaped, so
//!   late actors see `Conflict`

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, Mutator, RemoveResult, ShareStore, Transition, TransitionResult};
