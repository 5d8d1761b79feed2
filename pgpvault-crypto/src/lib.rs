//! Passphrase-derived encryption for pgpvault.
//!
//! Provides the primitive layer the keyring builds on:
//! - PBKDF2-HMAC-SHA256 key derivation from the master passphrase
//! - AES-256-GCM authenticated encryption
//! - the compact `version:salt:iv:ciphertext` secret format
//! - passphrase verification tokens
//!
//! Every encryption call draws a fresh random salt and IV, so no two
//! secrets share a derived key even under the same passphrase. Nothing in
//! this crate knows about keyring entries or storage.

mod cipher;
mod error;
mod kdf;
mod secret;
mod util;
pub mod verify;

pub use cipher::{decrypt, decrypt_encoded, encrypt, encrypt_encoded, IV_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, DerivedKey, KdfParams, Salt, KEY_SIZE, MIN_ITERATIONS, SALT_SIZE};
pub use secret::{looks_encrypted, looks_plaintext_private_key, EncryptedSecret, SECRET_VERSION};
pub use util::{constant_time_eq, wipe};
pub use verify::{generate_token, verify_token};
