//! Passphrase verification tokens.
//!
//! A token is an encrypted well-known constant. Decrypting it successfully
//! proves a candidate passphrase is correct without the passphrase (or any
//! hash of it) ever being persisted. The token must be regenerated whenever
//! the passphrase changes; a token from a previous passphrase simply fails
//! to verify.

use crate::cipher::{decrypt_encoded, encrypt_encoded};
use crate::error::CryptoResult;
use crate::util::constant_time_eq;

const VERIFICATION_MARKER: &str = "pgpvault-passphrase-verification-v1";

/// Creates a verification token for a passphrase, in the compact
/// `version:salt:iv:ciphertext` form.
pub fn generate_token(passphrase: &str) -> CryptoResult<String> {
    encrypt_encoded(VERIFICATION_MARKER, passphrase)
}

/// Returns true iff `token` decrypts under `passphrase` to the exact marker.
///
/// Never errors: malformed tokens, unsupported versions and wrong
/// passphrases all yield `false`. The marker comparison is constant-time.
pub fn verify_token(token: &str, passphrase: &str) -> bool {
    match decrypt_encoded(token, passphrase) {
        Ok(plaintext) => constant_time_eq(&plaintext, VERIFICATION_MARKER),
        Err(_) => false,
    }
}
