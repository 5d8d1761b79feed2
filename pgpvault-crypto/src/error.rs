//! Crypto layer error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors from key derivation, encryption and decryption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Authentication failure on decrypt (GCM cannot tell a wrong
    /// passphrase from tampered ciphertext), or an empty passphrase
    /// supplied where one is required.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    /// Structurally malformed or unsupported encrypted payload. Distinct
    /// from [`CryptoError::InvalidPassphrase`]: the data could not even be
    /// handed to the cipher.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("encryption failed: {0}")]
    Encryption(String),
}
