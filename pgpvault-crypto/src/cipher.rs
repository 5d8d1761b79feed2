//! AES-256-GCM authenticated encryption under a passphrase-derived key.

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_key, KdfParams, Salt};
use crate::secret::{EncryptedSecret, SECRET_VERSION};
use crate::util::{from_base64, to_base64};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::Rng;
use zeroize::Zeroizing;

/// GCM nonce length in bytes (96 bits).
pub const IV_SIZE: usize = 12;
/// GCM authentication tag length in bytes (128 bits).
pub const TAG_SIZE: usize = 16;

/// Encrypts a UTF-8 plaintext under a passphrase.
///
/// Every call draws a fresh random salt and IV, so encrypting the same
/// plaintext twice never yields the same ciphertext and no two secrets share
/// a derived key.
pub fn encrypt(plaintext: &str, passphrase: &str) -> CryptoResult<EncryptedSecret> {
    let salt = Salt::random();
    let key = derive_key(passphrase, &salt, &KdfParams::default())?;

    let mut iv = [0u8; IV_SIZE];
    rand::rng().fill(&mut iv);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedSecret {
        version: SECRET_VERSION,
        salt: to_base64(salt.as_bytes()),
        iv: to_base64(&iv),
        ciphertext: to_base64(&ciphertext),
    })
}

/// Encrypts and returns the compact string form directly.
pub fn encrypt_encoded(plaintext: &str, passphrase: &str) -> CryptoResult<String> {
    Ok(encrypt(plaintext, passphrase)?.encode())
}

/// Decrypts an [`EncryptedSecret`] with a passphrase.
///
/// Structural faults (bad base64, wrong salt or IV length) surface as
/// [`CryptoError::DecryptionFailed`] before any key derivation runs. An
/// authentication-tag mismatch (wrong passphrase or tampered ciphertext;
/// GCM cannot tell them apart) surfaces as
/// [`CryptoError::InvalidPassphrase`].
pub fn decrypt(secret: &EncryptedSecret, passphrase: &str) -> CryptoResult<Zeroizing<String>> {
    if secret.version != SECRET_VERSION {
        return Err(CryptoError::DecryptionFailed(format!(
            "unsupported secret version {}",
            secret.version
        )));
    }

    let salt = Salt::from_slice(&from_base64(&secret.salt)?)?;
    let iv = from_base64(&secret.iv)?;
    if iv.len() != IV_SIZE {
        return Err(CryptoError::DecryptionFailed(format!(
            "IV must be {IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    let ciphertext = from_base64(&secret.ciphertext)?;
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::DecryptionFailed(
            "ciphertext shorter than the auth tag".into(),
        ));
    }

    let key = derive_key(passphrase, &salt, &KdfParams::default())?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| CryptoError::InvalidPassphrase)?;

    String::from_utf8(plaintext)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::DecryptionFailed("plaintext is not valid UTF-8".into()))
}

/// Decrypts the compact string form directly.
pub fn decrypt_encoded(encoded: &str, passphrase: &str) -> CryptoResult<Zeroizing<String>> {
    let secret = EncryptedSecret::decode(encoded)?;
    decrypt(&secret, passphrase)
}
