//! Keyring error types.

use pgpvault_crypto::CryptoError;
use pgpvault_storage::StorageError;
use thiserror::Error;

/// Result type for keyring operations.
pub type KeyringResult<T> = Result<T, KeyringError>;

/// Errors from keyring operations.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// An operation needing the master passphrase ran while the keyring was
    /// encrypted and locked.
    #[error("keyring is locked")]
    Locked,

    /// Passphrase rotation was attempted on a keyring that was never
    /// encrypted.
    #[error("keyring is not encrypted")]
    NotEncrypted,

    /// Wrong passphrase, or an empty passphrase where one is required.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    #[error("passphrase too short (min {min} characters)")]
    PassphraseTooShort { min: usize },

    /// Structurally bad encrypted data, an unsupported format version, or a
    /// non-passphrase decryption fault.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The key-material collaborator rejected the input.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// A key lookup that must succeed found nothing.
    #[error("no key matches {0:?}")]
    KeyNotFound(String),

    /// The persisted document (or a backup blob) has an unrecognized shape.
    #[error("malformed keyring document: {0}")]
    Document(String),

    #[error("encryption failed: {0}")]
    Crypto(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CryptoError> for KeyringError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidPassphrase => Self::InvalidPassphrase,
            CryptoError::DecryptionFailed(msg) => Self::DecryptionFailed(msg),
            CryptoError::Encryption(msg) => Self::Crypto(msg),
        }
    }
}
