//! PBKDF2-HMAC-SHA256 key derivation.

use crate::error::{CryptoError, CryptoResult};
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// KDF salt length in bytes.
pub const SALT_SIZE: usize = 16;
/// Derived key length in bytes (AES-256).
pub const KEY_SIZE: usize = 32;
/// Iteration floor. [`KdfParams`] may raise this, never lower it.
pub const MIN_ITERATIONS: u32 = 120_000;

/// Tunable KDF parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: MIN_ITERATIONS,
        }
    }
}

/// A 16-byte KDF salt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    /// Draws a fresh random salt from the OS-seeded CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rng().fill(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SALT_SIZE {
            return Err(CryptoError::DecryptionFailed(format!(
                "salt must be {SALT_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; SALT_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// A derived AES-256 key. Zeroized on drop.
#[derive(Clone, Debug, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Derives an AES-256 key from a passphrase and salt.
///
/// Deterministic for a given `(passphrase, salt)` pair; different salts for
/// the same passphrase derive independent keys. The iteration count is
/// clamped to [`MIN_ITERATIONS`] so callers cannot weaken the KDF.
pub fn derive_key(passphrase: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<DerivedKey> {
    if passphrase.is_empty() {
        return Err(CryptoError::InvalidPassphrase);
    }
    let iterations = params.iterations.max(MIN_ITERATIONS);
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt.as_bytes(), iterations, &mut key);
    Ok(DerivedKey(key))
}
