//! Proptest generators for property-based testing.

use std::time::Duration;

use proptest::prelude::*;
use vanish_core::{KdfParams, ShareId};

/// Generate a random ShareId.
pub fn share_id() -> impl Strategy<Value = ShareId> {
    any::<[u8; 32]>().prop_map(ShareId::from_bytes)
}

/// Generate a password that meets the default 8 character minimum.
pub fn password() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 !#%&*+.:;=?@^_~-]{8,32}".prop_map(String::from)
}

/// Generate a password below the default minimum.
pub fn weak_password() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{0,7}".prop_map(String::from)
}

/// Generate two distinct valid passwords.
pub fn password_pair() -> impl Strategy<Value = (String, String)> {
    (password(), password()).prop_filter("passwords must differ", |(a, b)| a != b)
}

/// Generate a TTL within the default bounds (1 ms to 24 h).
pub fn ttl() -> impl Strategy<Value = Duration> {
    (1u64..=24 * 60 * 60 * 1000).prop_map(Duration::from_millis)
}

/// Generate content bytes of at most `max_len`.
pub fn content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate Argon2id parameters that are valid but cheap.
pub fn cheap_kdf_params() -> impl Strategy<Value = KdfParams> {
    (8u32..=128, 1u32..=2).prop_map(|(m_cost_kib, t_cost)| KdfParams {
        m_cost_kib,
        t_cost,
        p_cost: 1,
    })
}
