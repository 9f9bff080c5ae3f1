//! # Vanish Testkit
//!
//! Testing utilities for the Vanish share engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an engine on a manual clock with in-memory stores and
//!   cheap key derivation, plus helpers to stage content and move time
//! - **Generators**: proptest strategies for passwords, TTLs and content
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use vanish_testkit::TestEngine;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let t = TestEngine::new();
//!     let share = t.share(b"hello", "correcthorse1", None).await?;
//!
//!     t.advance(Duration::from_secs(47));
//!     t.tick().await;
//!
//!     let err = t.engine.access_share(&share.share_id, "correcthorse1").await.unwrap_err();
//!     assert_eq!(err.code(), "expired");
//!     Ok(())
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vanish_testkit::generators::{password, weak_password};
//!
//! proptest! {
//!     #[test]
//!     fn weak_passwords_are_rejected(pw in weak_password()) {
//!         prop_assert!(vanish::SharePolicy::default().check_password(&pw).is_err());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{cheap_kdf, init_tracing, test_config, TestEngine, START_MILLIS};
