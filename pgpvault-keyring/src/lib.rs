//! Passphrase-protected local PGP keyring.
//!
//! Holds key-pair entries (public key always, private key optionally) in one
//! JSON document behind a [`KeyValueStore`]. Private-key material at rest is
//! protected by AES-256-GCM under a key derived from a single master
//! passphrase; see `pgpvault-crypto` for the primitives.
//!
//! # Lifecycle
//!
//! A keyring is constructed unloaded. The first operation triggers a lazy
//! [`Keyring::load`], which sniffs the persisted document shape (legacy raw
//! map, plain wrapper, or encrypted wrapper) and populates the in-memory
//! entry list. An encrypted keyring starts locked; [`Keyring::unlock`]
//! checks the candidate passphrase against the stored verification token
//! and, on success, holds the passphrase in memory until [`Keyring::lock`].
//! Every mutation persists the full document immediately.
//!
//! # Deliberate limits
//!
//! - One logical owner per keyring. Two instances over the same storage race
//!   with last-writer-wins semantics; nothing here merges concurrent edits.
//!   `&mut self` on every operation serializes calls within an instance, so
//!   passphrase rotation cannot interleave with other mutations.
//! - Secret clearing is best-effort (`Zeroizing` wrappers). Rust moves and
//!   allocator behavior can leave unreachable stale copies; no stronger
//!   guarantee is claimed.

mod backup;
mod document;
mod error;
mod types;

pub use backup::{EncryptedBackup, BACKUP_FORMAT, BACKUP_VERSION};
pub use document::{KeyringDocument, DOCUMENT_VERSION};
pub use error::{KeyringError, KeyringResult};
pub use types::{
    key_id_from_fingerprint, normalize_fingerprint, KeyInfo, KeyMaterialParser, KeyringEntry,
    KeyringStats, ParsedKeyMaterial, UserIdentity,
};

use chrono::Utc;
use pgpvault_crypto::{self as crypto, CryptoError};
use pgpvault_storage::KeyValueStore;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Storage key of the single persisted keyring document.
pub const STORAGE_KEY: &str = "keyring";
/// Minimum backup passphrase length.
pub const MIN_BACKUP_PASSPHRASE_LEN: usize = 8;

type WarningSink = Box<dyn Fn(&str) + Send>;

/// The stateful keyring store.
pub struct Keyring {
    store: Box<dyn KeyValueStore + Send>,
    parser: Box<dyn KeyMaterialParser + Send>,
    warning_sink: Option<WarningSink>,
    entries: Vec<KeyringEntry>,
    loaded: bool,
    encrypted: bool,
    verification_token: Option<String>,
    passphrase: Option<Zeroizing<String>>,
}

impl Keyring {
    pub fn new<S, P>(store: S, parser: P) -> Self
    where
        S: KeyValueStore + Send + 'static,
        P: KeyMaterialParser + Send + 'static,
    {
        Self {
            store: Box::new(store),
            parser: Box::new(parser),
            warning_sink: None,
            entries: Vec::new(),
            loaded: false,
            encrypted: false,
            verification_token: None,
            passphrase: None,
        }
    }

    /// Installs a sink for non-fatal security advisories (unencrypted
    /// private keys detected, plaintext export performed). Without one,
    /// advisories go to the log.
    pub fn set_warning_sink<F>(&mut self, sink: F)
    where
        F: Fn(&str) + Send + 'static,
    {
        self.warning_sink = Some(Box::new(sink));
    }

    fn emit_warning(&self, message: &str) {
        match &self.warning_sink {
            Some(sink) => sink(message),
            None => warn!("{message}"),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Reads and classifies the persisted document. An absent document
    /// initializes an empty unencrypted keyring. Loading always starts
    /// locked; a previously held passphrase is dropped.
    pub fn load(&mut self) -> KeyringResult<()> {
        match self.store.load(STORAGE_KEY)? {
            None => {
                self.entries = Vec::new();
                self.encrypted = false;
                self.verification_token = None;
            }
            Some(raw) => match KeyringDocument::sniff(&raw)? {
                KeyringDocument::Legacy(entries) => {
                    self.entries = entries;
                    self.encrypted = false;
                    self.verification_token = None;
                    self.emit_warning(
                        "legacy keyring format detected; it will be rewritten on the next change",
                    );
                }
                KeyringDocument::Plain(entries) => {
                    self.entries = entries;
                    self.encrypted = false;
                    self.verification_token = None;
                }
                KeyringDocument::Encrypted {
                    verification_token,
                    entries,
                    ..
                } => {
                    self.entries = entries;
                    self.encrypted = true;
                    self.verification_token = verification_token;
                }
            },
        }
        self.passphrase = None;
        self.loaded = true;

        if !self.encrypted
            && self
                .entries
                .iter()
                .any(|e| e.private_key.as_deref().is_some_and(crypto::looks_plaintext_private_key))
        {
            self.emit_warning(
                "keyring contains unencrypted private keys; set a master passphrase to protect them",
            );
        }

        debug!(
            entries = self.entries.len(),
            encrypted = self.encrypted,
            "loaded keyring document"
        );
        Ok(())
    }

    fn ensure_loaded(&mut self) -> KeyringResult<()> {
        if !self.loaded {
            self.load()?;
        }
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// An unencrypted keyring is never locked.
    pub fn is_locked(&self) -> bool {
        self.encrypted && self.passphrase.is_none()
    }

    /// Verifies the candidate passphrase against the stored token and, on
    /// success, holds it in memory. A no-op on a keyring that was never
    /// encrypted. An encrypted document without a verification token is
    /// treated as corrupt rather than accepting any passphrase.
    pub fn unlock(&mut self, passphrase: &str) -> KeyringResult<()> {
        self.ensure_loaded()?;
        if !self.encrypted {
            return Ok(());
        }
        let token = self.verification_token.as_deref().ok_or_else(|| {
            KeyringError::DecryptionFailed("encrypted keyring has no verification token".into())
        })?;
        if !crypto::verify_token(token, passphrase) {
            return Err(KeyringError::InvalidPassphrase);
        }
        self.passphrase = Some(Zeroizing::new(passphrase.to_string()));
        Ok(())
    }

    /// Drops the in-memory passphrase. Always succeeds.
    pub fn lock(&mut self) {
        self.passphrase = None;
    }

    // ── Passphrase management ────────────────────────────────────────

    /// Enables encryption, or rotates the master passphrase if encryption is
    /// already on. Requires the keyring to be unlocked in the latter case.
    ///
    /// Every stored private key is re-encrypted under the new passphrase and
    /// the verification token is regenerated. The work happens on a scratch
    /// copy of the entry list; the live list and storage are only touched
    /// once every entry has succeeded, so a single bad entry aborts the
    /// whole rotation with nothing half-written.
    pub fn set_master_passphrase(&mut self, new_passphrase: &str) -> KeyringResult<()> {
        self.ensure_loaded()?;
        if new_passphrase.is_empty() {
            return Err(KeyringError::InvalidPassphrase);
        }
        if self.encrypted && self.passphrase.is_none() {
            return Err(KeyringError::Locked);
        }

        let mut rekeyed = self.entries.clone();
        for entry in &mut rekeyed {
            let Some(stored) = entry.private_key.clone() else {
                continue;
            };
            let plaintext = if crypto::looks_encrypted(&stored) {
                let current = self.passphrase.as_ref().ok_or(KeyringError::Locked)?;
                crypto::decrypt_encoded(&stored, current).map_err(|e| match e {
                    CryptoError::InvalidPassphrase => KeyringError::DecryptionFailed(format!(
                        "entry {} does not decrypt under the current passphrase",
                        entry.fingerprint
                    )),
                    other => other.into(),
                })?
            } else {
                Zeroizing::new(stored)
            };
            entry.private_key = Some(crypto::encrypt_encoded(&plaintext, new_passphrase)?);
        }

        let token = crypto::generate_token(new_passphrase)?;
        self.entries = rekeyed;
        self.verification_token = Some(token);
        self.encrypted = true;
        self.passphrase = Some(Zeroizing::new(new_passphrase.to_string()));
        self.persist()?;
        debug!(entries = self.entries.len(), "master passphrase set");
        Ok(())
    }

    /// Verifies `current` against the token, then rotates to `new_passphrase`.
    pub fn change_passphrase(
        &mut self,
        current: &str,
        new_passphrase: &str,
    ) -> KeyringResult<()> {
        self.ensure_loaded()?;
        if !self.encrypted {
            return Err(KeyringError::NotEncrypted);
        }
        let token = self.verification_token.as_deref().ok_or_else(|| {
            KeyringError::DecryptionFailed("encrypted keyring has no verification token".into())
        })?;
        if !crypto::verify_token(token, current) {
            return Err(KeyringError::InvalidPassphrase);
        }
        self.passphrase = Some(Zeroizing::new(current.to_string()));
        self.set_master_passphrase(new_passphrase)
    }

    // ── Entry operations ─────────────────────────────────────────────

    /// Adds (or overwrites, by fingerprint) an entry. Identifiers and
    /// metadata come from the key-material collaborator; this code never
    /// interprets the key text itself. With a master passphrase set, the
    /// private key is encrypted before it touches the entry list; without
    /// one it is stored plaintext with a warning.
    pub fn add_key(
        &mut self,
        public_key: &str,
        private_key: Option<&str>,
    ) -> KeyringResult<KeyringEntry> {
        self.ensure_loaded()?;
        let parsed = self
            .parser
            .parse(public_key)
            .map_err(KeyringError::InvalidKey)?;
        let fingerprint = normalize_fingerprint(&parsed.fingerprint);
        if fingerprint.is_empty() {
            return Err(KeyringError::InvalidKey("empty fingerprint".into()));
        }
        let key_id = if parsed.key_id.is_empty() {
            key_id_from_fingerprint(&fingerprint)
        } else {
            normalize_fingerprint(&parsed.key_id)
        };

        let stored_private = match private_key {
            None => None,
            Some(material) => Some(self.protect_private_key(material)?),
        };

        let entry = KeyringEntry {
            key_id,
            fingerprint: fingerprint.clone(),
            public_key: public_key.to_string(),
            private_key: stored_private,
            key_info: parsed.key_info,
            added_at: Utc::now(),
            last_used: None,
        };

        match self.entries.iter().position(|e| e.fingerprint == fingerprint) {
            Some(i) => self.entries[i] = entry.clone(),
            None => self.entries.push(entry.clone()),
        }
        self.persist()?;
        Ok(entry)
    }

    fn protect_private_key(&mut self, material: &str) -> KeyringResult<String> {
        // Already in the encrypted wire form, e.g. re-imported from our own
        // document. Store as-is.
        if crypto::looks_encrypted(material) {
            return Ok(material.to_string());
        }
        if self.encrypted {
            let passphrase = self.passphrase.as_ref().ok_or(KeyringError::Locked)?;
            Ok(crypto::encrypt_encoded(material, passphrase)?)
        } else {
            self.emit_warning(
                "storing a private key unencrypted; set a master passphrase to protect it",
            );
            Ok(material.to_string())
        }
    }

    /// Looks up an entry by exact fingerprint, or by suffix match against
    /// the fingerprint or short key ID (case-insensitive, whitespace
    /// ignored). First match wins in insertion order. Returns a copy; the
    /// private key stays in whatever form it is stored.
    pub fn get_key(&mut self, identifier: &str) -> KeyringResult<Option<KeyringEntry>> {
        self.ensure_loaded()?;
        Ok(self.position_of(identifier).map(|i| self.entries[i].clone()))
    }

    /// Like [`Keyring::get_key`], but with the private key decrypted.
    /// Requires the keyring to be unlocked if the key is stored encrypted.
    /// The stored entry is never mutated by a read.
    pub fn get_key_decrypted(&mut self, identifier: &str) -> KeyringResult<Option<KeyringEntry>> {
        self.ensure_loaded()?;
        let Some(i) = self.position_of(identifier) else {
            return Ok(None);
        };
        let mut entry = self.entries[i].clone();
        if let Some(stored) = entry.private_key.as_deref() {
            if crypto::looks_encrypted(stored) {
                let passphrase = self.passphrase.as_ref().ok_or(KeyringError::Locked)?;
                let plaintext = crypto::decrypt_encoded(stored, passphrase)?;
                entry.private_key = Some(plaintext.to_string());
            }
        }
        Ok(Some(entry))
    }

    /// Removes an entry (same matching rules as [`Keyring::get_key`]).
    /// Returns whether anything was removed.
    pub fn delete_key(&mut self, identifier: &str) -> KeyringResult<bool> {
        self.ensure_loaded()?;
        match self.position_of(identifier) {
            Some(i) => {
                self.entries.remove(i);
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Case-insensitive substring search over user identity names and
    /// email addresses.
    pub fn search_keys(&mut self, query: &str) -> KeyringResult<Vec<KeyringEntry>> {
        self.ensure_loaded()?;
        let needle = query.to_lowercase();
        Ok(self
            .entries
            .iter()
            .filter(|e| {
                e.key_info.user_ids.iter().any(|uid| {
                    uid.name.to_lowercase().contains(&needle)
                        || uid
                            .email
                            .as_deref()
                            .is_some_and(|mail| mail.to_lowercase().contains(&needle))
                })
            })
            .cloned()
            .collect())
    }

    /// All entries, in insertion order, private keys as stored.
    pub fn list_keys(&mut self) -> KeyringResult<Vec<KeyringEntry>> {
        self.ensure_loaded()?;
        Ok(self.entries.clone())
    }

    pub fn get_stats(&mut self) -> KeyringResult<KeyringStats> {
        self.ensure_loaded()?;
        let now = Utc::now();
        Ok(KeyringStats {
            total: self.entries.len(),
            with_private_key: self.entries.iter().filter(|e| e.has_private_key()).count(),
            expired: self
                .entries
                .iter()
                .filter(|e| e.key_info.expires_at.is_some_and(|t| t < now))
                .count(),
            revoked: self.entries.iter().filter(|e| e.key_info.revoked).count(),
        })
    }

    /// Stamps an entry's `lastUsed` and persists. Reads never touch the
    /// timestamp; callers record use explicitly.
    pub fn mark_used(&mut self, identifier: &str) -> KeyringResult<()> {
        self.ensure_loaded()?;
        let i = self
            .position_of(identifier)
            .ok_or_else(|| KeyringError::KeyNotFound(identifier.to_string()))?;
        self.entries[i].last_used = Some(Utc::now());
        self.persist()
    }

    // ── Backup ───────────────────────────────────────────────────────

    /// Encrypts a full decrypted snapshot of the keyring under an
    /// independent backup passphrase (min [`MIN_BACKUP_PASSPHRASE_LEN`]
    /// chars). Requires the keyring to be unlocked if any private key is
    /// stored encrypted.
    pub fn export_encrypted(&mut self, backup_passphrase: &str) -> KeyringResult<String> {
        self.ensure_loaded()?;
        if backup_passphrase.len() < MIN_BACKUP_PASSPHRASE_LEN {
            return Err(KeyringError::PassphraseTooShort {
                min: MIN_BACKUP_PASSPHRASE_LEN,
            });
        }
        let snapshot = self.decrypted_snapshot()?;
        backup::seal(&snapshot, backup_passphrase)
    }

    /// Plaintext JSON export of all entries with private keys decrypted.
    /// Emits a security warning; the output protects nothing.
    pub fn export_plain(&mut self) -> KeyringResult<String> {
        self.ensure_loaded()?;
        let snapshot = self.decrypted_snapshot()?;
        self.emit_warning("plaintext keyring export performed; handle the output with care");
        backup::snapshot_to_json(&snapshot)
    }

    /// Restores entries from an encrypted backup. A wrong backup passphrase
    /// is fatal; individual entries that fail to parse or re-add are skipped
    /// and logged. Returns the number of entries imported.
    pub fn import_encrypted_backup(
        &mut self,
        blob: &str,
        backup_passphrase: &str,
    ) -> KeyringResult<usize> {
        self.ensure_loaded()?;
        let entries = backup::open(blob, backup_passphrase)?;
        Ok(self.import_entries(entries))
    }

    /// Restores entries from a plaintext export ([`Keyring::export_plain`]).
    pub fn import_backup(&mut self, json: &str) -> KeyringResult<usize> {
        self.ensure_loaded()?;
        let entries = backup::snapshot_from_json(json)?;
        Ok(self.import_entries(entries))
    }

    // ── Internals ────────────────────────────────────────────────────

    fn import_entries(&mut self, entries: Vec<KeyringEntry>) -> usize {
        let mut imported = 0;
        for entry in entries {
            match self.add_key(&entry.public_key, entry.private_key.as_deref()) {
                Ok(_) => imported += 1,
                Err(e) => {
                    warn!(fingerprint = %entry.fingerprint, "skipping backup entry: {e}");
                }
            }
        }
        imported
    }

    fn decrypted_snapshot(&self) -> KeyringResult<Vec<KeyringEntry>> {
        let mut snapshot = self.entries.clone();
        for entry in &mut snapshot {
            let Some(stored) = entry.private_key.clone() else {
                continue;
            };
            if crypto::looks_encrypted(&stored) {
                let passphrase = self.passphrase.as_ref().ok_or(KeyringError::Locked)?;
                let plaintext = crypto::decrypt_encoded(&stored, passphrase)?;
                entry.private_key = Some(plaintext.to_string());
            }
        }
        Ok(snapshot)
    }

    fn position_of(&self, identifier: &str) -> Option<usize> {
        let needle = normalize_fingerprint(identifier);
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .position(|e| e.fingerprint == needle)
            .or_else(|| {
                self.entries
                    .iter()
                    .position(|e| e.fingerprint.ends_with(&needle) || e.key_id.ends_with(&needle))
            })
    }

    /// Writes the full document. Once encryption is on, a plaintext private
    /// key in the entry list is an invariant violation and the write is
    /// refused — this backstops the per-mutation enforcement.
    fn persist(&mut self) -> KeyringResult<()> {
        let doc = if self.encrypted {
            if let Some(entry) = self
                .entries
                .iter()
                .find(|e| e.private_key.as_deref().is_some_and(|k| !crypto::looks_encrypted(k)))
            {
                return Err(KeyringError::Crypto(format!(
                    "refusing to persist plaintext private key for {}",
                    entry.fingerprint
                )));
            }
            let token = self.verification_token.clone().ok_or_else(|| {
                KeyringError::Crypto("encrypted keyring has no verification token".into())
            })?;
            KeyringDocument::Encrypted {
                version: DOCUMENT_VERSION,
                verification_token: Some(token),
                entries: self.entries.clone(),
            }
        } else {
            KeyringDocument::Plain(self.entries.clone())
        };
        let json = doc.to_json()?;
        self.store.save(STORAGE_KEY, &json)?;
        debug!(
            entries = self.entries.len(),
            encrypted = self.encrypted,
            "persisted keyring document"
        );
        Ok(())
    }
}
