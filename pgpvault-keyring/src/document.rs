//! Persisted document shapes and format sniffing.
//!
//! Three shapes have existed on disk, all resolved once at load time:
//!
//! - **Legacy**: a raw `fingerprint -> entry` mapping with no wrapper,
//!   written before encryption support existed. Implicitly unencrypted.
//! - **Plain**: `{ "entries": { ... } }` — wrapped, no master passphrase.
//! - **Encrypted**: `{ "encrypted": true, "version": 1,
//!   "verificationToken": "...", "entries": { ... } }`.
//!
//! Sniffing prefers the oldest compatible reading, so a document whose
//! top-level values all parse as entries stays legacy even if one of its
//! fingerprints looked odd. Legacy documents are rewritten in the wrapped
//! shape on the next persist.

use crate::error::{KeyringError, KeyringResult};
use crate::types::KeyringEntry;
use serde_json::{Map, Value};

/// Version written into the encrypted document wrapper.
pub const DOCUMENT_VERSION: u32 = 1;

/// The persisted keyring document, resolved to one of its historical shapes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyringDocument {
    Legacy(Vec<KeyringEntry>),
    Plain(Vec<KeyringEntry>),
    Encrypted {
        version: u32,
        /// Absent only in documents written by buggy or foreign tools; the
        /// keyring refuses to unlock such a document.
        verification_token: Option<String>,
        entries: Vec<KeyringEntry>,
    },
}

impl KeyringDocument {
    /// Classifies and parses a raw JSON document.
    pub fn sniff(raw: &str) -> KeyringResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| KeyringError::Document(format!("not valid JSON: {e}")))?;
        let Value::Object(obj) = value else {
            return Err(KeyringError::Document(
                "top level is not a JSON object".into(),
            ));
        };

        if obj.get("encrypted").and_then(Value::as_bool) == Some(true) {
            let version = obj
                .get("version")
                .and_then(Value::as_u64)
                .unwrap_or(u64::from(DOCUMENT_VERSION)) as u32;
            if version != DOCUMENT_VERSION {
                return Err(KeyringError::Document(format!(
                    "unsupported document version {version}"
                )));
            }
            let verification_token = obj
                .get("verificationToken")
                .and_then(Value::as_str)
                .map(str::to_string);
            let entries = match obj.get("entries") {
                Some(Value::Object(map)) => parse_entries(map)?,
                Some(_) => {
                    return Err(KeyringError::Document("\"entries\" is not an object".into()))
                }
                None => Vec::new(),
            };
            return Ok(Self::Encrypted {
                version,
                verification_token,
                entries,
            });
        }

        // Oldest-compatible wins: a raw entry map stays legacy.
        if let Ok(entries) = parse_entries(&obj) {
            return Ok(Self::Legacy(entries));
        }

        match obj.get("entries") {
            Some(Value::Object(map)) => Ok(Self::Plain(parse_entries(map)?)),
            Some(_) => Err(KeyringError::Document("\"entries\" is not an object".into())),
            None => Err(KeyringError::Document(
                "neither a legacy entry map nor a wrapped document".into(),
            )),
        }
    }

    pub fn entries(&self) -> &[KeyringEntry] {
        match self {
            Self::Legacy(entries) | Self::Plain(entries) => entries,
            Self::Encrypted { entries, .. } => entries,
        }
    }

    /// Serializes to the persisted JSON form. Legacy is write-once history:
    /// encoding it produces the wrapped plain shape.
    pub fn to_json(&self) -> KeyringResult<String> {
        let value = match self {
            Self::Legacy(entries) | Self::Plain(entries) => {
                let mut obj = Map::new();
                obj.insert("entries".into(), entries_to_value(entries)?);
                Value::Object(obj)
            }
            Self::Encrypted {
                version,
                verification_token,
                entries,
            } => {
                let mut obj = Map::new();
                obj.insert("encrypted".into(), Value::Bool(true));
                obj.insert("version".into(), Value::from(*version));
                if let Some(token) = verification_token {
                    obj.insert("verificationToken".into(), Value::String(token.clone()));
                }
                obj.insert("entries".into(), entries_to_value(entries)?);
                Value::Object(obj)
            }
        };
        Ok(serde_json::to_string(&value)?)
    }
}

fn parse_entries(map: &Map<String, Value>) -> KeyringResult<Vec<KeyringEntry>> {
    let mut entries = Vec::with_capacity(map.len());
    for (fingerprint, value) in map {
        let entry: KeyringEntry = serde_json::from_value(value.clone()).map_err(|e| {
            KeyringError::Document(format!("entry {fingerprint} does not parse: {e}"))
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Serializes entries as a `fingerprint -> entry` map, preserving insertion
/// order (serde_json's `preserve_order` feature keeps map order stable).
fn entries_to_value(entries: &[KeyringEntry]) -> KeyringResult<Value> {
    let mut map = Map::new();
    for entry in entries {
        map.insert(entry.fingerprint.clone(), serde_json::to_value(entry)?);
    }
    Ok(Value::Object(map))
}
