//! Password-based key derivation (Argon2id).
//!
//! Every share gets its own random 16-byte salt, stored next to the wrapped
//! key. The cost parameters travel with the share as [`KdfParams`].

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use vanish_core::KdfParams;

use crate::error::{CryptoError, Result};
use crate::key::{WrappingKey, KEY_LEN};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Fixed salt for decoy derivations. Never used for a real share.
const DECOY_SALT: [u8; SALT_LEN] = *b"vanish-decoy-slt";

fn argon2(params: &KdfParams) -> Result<Argon2<'static>> {
    let params = Params::new(params.m_cost_kib, params.t_cost, params.p_cost, Some(KEY_LEN))
        .map_err(|e| CryptoError::InvalidKdfParams(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Check that Argon2 accepts these parameters.
pub fn validate_params(params: &KdfParams) -> Result<()> {
    argon2(params).map(|_| ())
}

/// Derive the wrapping key for a share from its password and salt.
pub fn derive_wrapping_key(
    password: &[u8],
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<WrappingKey> {
    let mut key = WrappingKey([0u8; KEY_LEN]);
    argon2(params)?
        .hash_password_into(password, salt, &mut key.0)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

/// Run a derivation of the same cost as a real unwrap and discard it.
///
/// Used on paths that have no record to check so that their latency matches
/// a wrong-password response.
pub fn decoy_derive(password: &[u8], params: &KdfParams) {
    // The result is dropped (and zeroized); errors are irrelevant here.
    let _ = derive_wrapping_key(password, &DECOY_SALT, params);
}

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}
