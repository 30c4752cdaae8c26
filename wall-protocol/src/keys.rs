//! Key derivation from the pre-shared secret
//!
//! Both endpoints stretch the same 32-byte secret with PBKDF2-HMAC-SHA256
//! into a 64-byte master key: the first half keys the cipher, the second
//! half keys the HMAC. Salt and iteration count must match on both sides;
//! a mismatch makes every frame fail authentication with no diagnostic.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::{Error, Result};

/// Required length of the pre-shared secret
pub const SECRET_LEN: usize = 32;

/// Length of each derived key
pub const KEY_LEN: usize = 32;

/// Derived key material, immutable for the process lifetime.
///
/// Constructed once at startup via [`derive_keys`] and passed explicitly
/// into the codec; never stored in process-wide mutable state, so tests can
/// hold several key sets at once.
#[derive(Clone)]
pub struct KeyMaterial {
    pub(crate) encryption_key: [u8; KEY_LEN],
    pub(crate) auth_key: [u8; KEY_LEN],
}

impl KeyMaterial {
    /// The AES-256 encryption key (first 32 bytes of the master key)
    pub fn encryption_key(&self) -> &[u8; KEY_LEN] {
        &self.encryption_key
    }

    /// The HMAC-SHA256 authentication key (last 32 bytes of the master key)
    pub fn auth_key(&self) -> &[u8; KEY_LEN] {
        &self.auth_key
    }
}

impl std::fmt::Debug for KeyMaterial {
    // Never print key bytes
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

/// Derive encryption and authentication keys from a pre-shared secret.
///
/// Fails with [`Error::SecretLength`] unless the secret is exactly 32
/// bytes; callers treat that as fatal and abort startup. Deterministic:
/// identical inputs always produce identical key material.
pub fn derive_keys(secret: &[u8], salt: &[u8], iterations: u32) -> Result<KeyMaterial> {
    if secret.len() != SECRET_LEN {
        return Err(Error::SecretLength {
            actual: secret.len(),
        });
    }

    let mut master = [0u8; KEY_LEN * 2];
    pbkdf2_hmac::<Sha256>(secret, salt, iterations, &mut master);

    let mut encryption_key = [0u8; KEY_LEN];
    let mut auth_key = [0u8; KEY_LEN];
    encryption_key.copy_from_slice(&master[..KEY_LEN]);
    auth_key.copy_from_slice(&master[KEY_LEN..]);

    Ok(KeyMaterial {
        encryption_key,
        auth_key,
    })
}
