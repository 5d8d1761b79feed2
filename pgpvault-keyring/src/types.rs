//! Keyring data model.
//!
//! Field names serialize in camelCase because the persisted document format
//! predates this implementation and must stay wire-compatible.

use chrono::{DateTime, Utc};
use pgpvault_crypto::looks_encrypted;
use serde::{Deserialize, Serialize};

/// One user identity attached to a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Descriptive key metadata. Informational, never secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub algorithm: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_ids: Vec<UserIdentity>,
    #[serde(default)]
    pub revoked: bool,
}

/// One logical key-pair record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringEntry {
    /// Short identifier: the last 8 hex chars of the fingerprint.
    pub key_id: String,
    /// Canonical unique identifier: uppercase hex, no whitespace.
    pub fingerprint: String,
    /// Exported public-key material, always plaintext.
    pub public_key: String,
    /// Exported private-key material: plaintext (legacy/unprotected) or an
    /// encoded `EncryptedSecret`. Presence, not encryption state, determines
    /// "has private key".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    pub key_info: KeyInfo,
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl KeyringEntry {
    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Whether the stored private key is in the encrypted wire form.
    pub fn has_encrypted_private_key(&self) -> bool {
        self.private_key.as_deref().is_some_and(looks_encrypted)
    }
}

/// What the key-material collaborator extracts from an exported key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedKeyMaterial {
    pub key_id: String,
    pub fingerprint: String,
    pub key_info: KeyInfo,
}

/// External collaborator that understands the PGP key format. The keyring
/// itself never parses key material.
pub trait KeyMaterialParser {
    /// Extracts identifiers and metadata from exported key text. The error
    /// string is surfaced as [`KeyringError::InvalidKey`].
    ///
    /// [`KeyringError::InvalidKey`]: crate::KeyringError::InvalidKey
    fn parse(&self, key_material: &str) -> Result<ParsedKeyMaterial, String>;
}

/// Aggregate counts over the keyring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringStats {
    pub total: usize,
    pub with_private_key: usize,
    pub expired: usize,
    pub revoked: usize,
}

/// Canonicalizes a fingerprint (or fragment of one): uppercase hex with all
/// whitespace stripped.
pub fn normalize_fingerprint(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Derives the short key ID from a canonical fingerprint.
pub fn key_id_from_fingerprint(fingerprint: &str) -> String {
    let normalized = normalize_fingerprint(fingerprint);
    let skip = normalized.chars().count().saturating_sub(8);
    normalized.chars().skip(skip).collect()
}
