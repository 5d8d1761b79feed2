//! Encrypted full-keyring backup format.
//!
//! A backup is a JSON wrapper carrying a format tag and one encoded
//! `EncryptedSecret` whose plaintext is the JSON entry snapshot. The backup
//! passphrase is independent of the master passphrase, so a backup can be
//! restored into a keyring protected by a different (or no) passphrase.

use crate::error::{KeyringError, KeyringResult};
use crate::types::KeyringEntry;
use chrono::{DateTime, Utc};
use pgpvault_crypto as crypto;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Format tag written into every backup wrapper.
pub const BACKUP_FORMAT: &str = "pgpvault-encrypted-backup";
/// Current backup wrapper version.
pub const BACKUP_VERSION: u32 = 1;

/// The outer, unencrypted wrapper of an encrypted backup.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBackup {
    pub format: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Encoded `EncryptedSecret` holding the JSON entry snapshot.
    pub data: String,
}

/// Serializes a decrypted entry snapshot as a `fingerprint -> entry` map —
/// the same shape the plain export uses, so both import paths share a codec.
pub(crate) fn snapshot_to_json(entries: &[KeyringEntry]) -> KeyringResult<String> {
    let mut map = Map::new();
    for entry in entries {
        map.insert(entry.fingerprint.clone(), serde_json::to_value(entry)?);
    }
    Ok(serde_json::to_string(&Value::Object(map))?)
}

pub(crate) fn snapshot_from_json(raw: &str) -> KeyringResult<Vec<KeyringEntry>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|_| KeyringError::Document("backup payload is not valid JSON".into()))?;
    let Value::Object(map) = value else {
        return Err(KeyringError::Document(
            "backup payload is not an entry map".into(),
        ));
    };
    let mut entries = Vec::with_capacity(map.len());
    for (fingerprint, value) in map {
        let entry: KeyringEntry = serde_json::from_value(value).map_err(|e| {
            KeyringError::Document(format!("backup entry {fingerprint} does not parse: {e}"))
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Encrypts a snapshot under the backup passphrase and wraps it.
pub(crate) fn seal(entries: &[KeyringEntry], backup_passphrase: &str) -> KeyringResult<String> {
    let payload = snapshot_to_json(entries)?;
    let backup = EncryptedBackup {
        format: BACKUP_FORMAT.into(),
        version: BACKUP_VERSION,
        created_at: Utc::now(),
        data: crypto::encrypt_encoded(&payload, backup_passphrase)?,
    };
    Ok(serde_json::to_string(&backup)?)
}

/// Recognizes the wrapper, decrypts the envelope and parses the snapshot.
///
/// A wrong backup passphrase is fatal here ([`KeyringError::InvalidPassphrase`]);
/// per-entry problems are the caller's to skip and count.
pub(crate) fn open(blob: &str, backup_passphrase: &str) -> KeyringResult<Vec<KeyringEntry>> {
    let backup: EncryptedBackup = serde_json::from_str(blob)
        .map_err(|_| KeyringError::Document("not an encrypted keyring backup".into()))?;
    if backup.format != BACKUP_FORMAT {
        return Err(KeyringError::Document(format!(
            "unrecognized backup format {:?}",
            backup.format
        )));
    }
    if backup.version != BACKUP_VERSION {
        return Err(KeyringError::Document(format!(
            "unsupported backup version {}",
            backup.version
        )));
    }
    let payload = crypto::decrypt_encoded(&backup.data, backup_passphrase)?;
    snapshot_from_json(&payload)
}
