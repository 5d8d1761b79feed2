mod common;

use common::{private_key, public_key, public_key_with_fingerprint, TestKeyParser};
use pgpvault_crypto::{encrypt_encoded, generate_token};
use pgpvault_keyring::{Keyring, KeyringError, STORAGE_KEY};
use pgpvault_storage::{FileStore, KeyValueStore, MemoryStore};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

fn keyring() -> Keyring {
    Keyring::new(MemoryStore::new(), TestKeyParser)
}

fn collect_warnings(kr: &mut Keyring) -> Arc<Mutex<Vec<String>>> {
    let warnings = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&warnings);
    kr.set_warning_sink(move |msg| sink.lock().unwrap().push(msg.to_string()));
    warnings
}

// ── Lookup ───────────────────────────────────────────────────────

#[test]
fn add_key_and_lookup_by_fingerprint() {
    let mut kr = keyring();
    let entry = kr
        .add_key(&public_key("Alice <alice@example.org>"), None)
        .unwrap();

    assert_eq!(entry.fingerprint.len(), 40);
    assert_eq!(entry.key_id, entry.fingerprint[32..]);
    assert!(!entry.has_private_key());

    let found = kr.get_key(&entry.fingerprint).unwrap().unwrap();
    assert_eq!(found, entry);
}

#[test]
fn lookup_by_suffix_key_id_and_sloppy_input() {
    let fp = "0123456789ABCDEF0123456789ABCDEF01234567";
    let mut kr = keyring();
    kr.add_key(&public_key_with_fingerprint("Bob", fp), None)
        .unwrap();

    // short key ID
    assert!(kr.get_key("01234567").unwrap().is_some());
    // longer fingerprint suffix, lowercase
    assert!(kr.get_key("ef01234567").unwrap().is_some());
    // whitespace-grouped fingerprint
    assert!(kr
        .get_key("0123 4567 89AB CDEF 0123 4567 89AB CDEF 0123 4567")
        .unwrap()
        .is_some());
    assert!(kr.get_key("DEADBEEF").unwrap().is_none());
    assert!(kr.get_key("").unwrap().is_none());
}

#[test]
fn suffix_lookup_first_match_wins_in_insertion_order() {
    let fp1 = "1111222233334444555566667777AAAA0000FFFF";
    let fp2 = "8888999900001111222233334444AAAA0000FFFF";
    let mut kr = keyring();
    kr.add_key(&public_key_with_fingerprint("First", fp1), None)
        .unwrap();
    kr.add_key(&public_key_with_fingerprint("Second", fp2), None)
        .unwrap();

    let hit = kr.get_key("AAAA0000FFFF").unwrap().unwrap();
    assert_eq!(hit.fingerprint, fp1);
}

#[test]
fn add_same_fingerprint_overwrites() {
    let fp = "0123456789ABCDEF0123456789ABCDEF01234567";
    let mut kr = keyring();
    kr.add_key(&public_key_with_fingerprint("Old Uid", fp), None)
        .unwrap();
    kr.add_key(&public_key_with_fingerprint("New Uid", fp), None)
        .unwrap();

    let all = kr.list_keys().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].key_info.user_ids[0].name, "New Uid");
}

#[test]
fn rejected_key_material_is_invalid_key() {
    let mut kr = keyring();
    let err = kr.add_key("certainly not armored", None).unwrap_err();
    assert!(matches!(err, KeyringError::InvalidKey(_)));
}

// ── Unencrypted storage ──────────────────────────────────────────

#[test]
fn private_key_stored_plaintext_without_passphrase_with_warning() {
    let mut kr = keyring();
    let warnings = collect_warnings(&mut kr);
    let secret = private_key("alice");

    let entry = kr
        .add_key(&public_key("Alice <alice@example.org>"), Some(&secret))
        .unwrap();

    assert_eq!(entry.private_key.as_deref(), Some(secret.as_str()));
    assert!(!entry.has_encrypted_private_key());
    assert!(warnings
        .lock()
        .unwrap()
        .iter()
        .any(|w| w.contains("unencrypted")));
}

#[test]
fn unlock_is_noop_on_unencrypted_keyring() {
    let mut kr = keyring();
    kr.add_key(&public_key("Alice"), None).unwrap();
    assert!(!kr.is_locked());
    kr.unlock("anything").unwrap();
    assert!(!kr.is_locked());
}

#[test]
fn change_passphrase_requires_encryption() {
    let mut kr = keyring();
    kr.add_key(&public_key("Alice"), None).unwrap();
    let err = kr.change_passphrase("a", "b").unwrap_err();
    assert!(matches!(err, KeyringError::NotEncrypted));
}

// ── Enabling encryption ──────────────────────────────────────────

#[test]
fn set_master_passphrase_encrypts_existing_plaintext_keys() {
    let mut kr = keyring();
    let secret = private_key("alice");
    let entry = kr
        .add_key(&public_key("Alice <alice@example.org>"), Some(&secret))
        .unwrap();

    kr.set_master_passphrase("correct-horse").unwrap();

    assert!(kr.is_encrypted());
    assert!(!kr.is_locked()); // setting the passphrase leaves it unlocked

    let stored = kr.get_key(&entry.fingerprint).unwrap().unwrap();
    assert!(stored.has_encrypted_private_key());
    assert_ne!(stored.private_key.as_deref(), Some(secret.as_str()));

    let decrypted = kr.get_key_decrypted(&entry.fingerprint).unwrap().unwrap();
    assert_eq!(decrypted.private_key.as_deref(), Some(secret.as_str()));
}

#[test]
fn new_keys_are_encrypted_once_passphrase_is_set() {
    let mut kr = keyring();
    kr.set_master_passphrase("correct-horse").unwrap();

    let secret = private_key("bob");
    let entry = kr.add_key(&public_key("Bob"), Some(&secret)).unwrap();
    assert!(entry.has_encrypted_private_key());
}

#[test]
fn empty_master_passphrase_rejected() {
    let mut kr = keyring();
    assert!(matches!(
        kr.set_master_passphrase("").unwrap_err(),
        KeyringError::InvalidPassphrase
    ));
}

#[test]
fn reads_never_mutate_stored_entries() {
    let mut kr = keyring();
    let secret = private_key("alice");
    let entry = kr.add_key(&public_key("Alice"), Some(&secret)).unwrap();
    kr.set_master_passphrase("correct-horse").unwrap();

    let before = kr.get_key(&entry.fingerprint).unwrap().unwrap();
    let _ = kr.get_key_decrypted(&entry.fingerprint).unwrap().unwrap();
    let after = kr.get_key(&entry.fingerprint).unwrap().unwrap();

    assert_eq!(before.private_key, after.private_key);
    assert!(after.has_encrypted_private_key());
}

// ── Lock gating across instances ─────────────────────────────────

#[test]
fn end_to_end_reload_lock_unlock() {
    let dir = tempfile::tempdir().unwrap();
    let secret = private_key("alice");
    let fingerprint;
    {
        let store = FileStore::open(dir.path()).unwrap();
        let mut kr = Keyring::new(store, TestKeyParser);
        let entry = kr
            .add_key(&public_key("Alice <alice@example.org>"), Some(&secret))
            .unwrap();
        kr.set_master_passphrase("correct-horse").unwrap();
        fingerprint = entry.fingerprint;
    }

    let store = FileStore::open(dir.path()).unwrap();
    let mut kr = Keyring::new(store, TestKeyParser);
    kr.load().unwrap();
    assert!(kr.is_encrypted());
    assert!(kr.is_locked());

    // Public material stays readable while locked
    let stored = kr.get_key(&fingerprint).unwrap().unwrap();
    assert!(stored.public_key.contains("PUBLIC KEY"));

    // Private material is gated
    assert!(matches!(
        kr.get_key_decrypted(&fingerprint).unwrap_err(),
        KeyringError::Locked
    ));

    assert!(matches!(
        kr.unlock("wrong").unwrap_err(),
        KeyringError::InvalidPassphrase
    ));
    assert!(kr.is_locked());

    kr.unlock("correct-horse").unwrap();
    assert!(!kr.is_locked());
    let decrypted = kr.get_key_decrypted(&fingerprint).unwrap().unwrap();
    assert_eq!(decrypted.private_key.as_deref(), Some(secret.as_str()));

    kr.lock();
    assert!(kr.is_locked());
    assert!(matches!(
        kr.get_key_decrypted(&fingerprint).unwrap_err(),
        KeyringError::Locked
    ));
}

#[test]
fn locked_keyring_rejects_private_key_writes_but_accepts_public() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut kr = Keyring::new(FileStore::open(dir.path()).unwrap(), TestKeyParser);
        kr.set_master_passphrase("correct-horse").unwrap();
    }

    let mut kr = Keyring::new(FileStore::open(dir.path()).unwrap(), TestKeyParser);
    let err = kr
        .add_key(&public_key("Alice"), Some(&private_key("alice")))
        .unwrap_err();
    assert!(matches!(err, KeyringError::Locked));

    // Public-only keys need no passphrase
    kr.add_key(&public_key("Bob"), None).unwrap();
    assert_eq!(kr.get_stats().unwrap().total, 1);
}

// ── Passphrase rotation ──────────────────────────────────────────

#[test]
fn change_passphrase_reencrypts_everything() {
    let dir = tempfile::tempdir().unwrap();
    let secrets: Vec<String> = ["alice", "bob", "carol"]
        .iter()
        .map(|n| private_key(n))
        .collect();
    let mut fingerprints = Vec::new();
    {
        let mut kr = Keyring::new(FileStore::open(dir.path()).unwrap(), TestKeyParser);
        kr.set_master_passphrase("first-pass").unwrap();
        for (name, secret) in ["alice", "bob", "carol"].iter().zip(&secrets) {
            let e = kr.add_key(&public_key(name), Some(secret)).unwrap();
            fingerprints.push(e.fingerprint);
        }
        kr.change_passphrase("first-pass", "second-pass").unwrap();
    }

    let mut kr = Keyring::new(FileStore::open(dir.path()).unwrap(), TestKeyParser);
    assert!(matches!(
        kr.unlock("first-pass").unwrap_err(),
        KeyringError::InvalidPassphrase
    ));
    kr.unlock("second-pass").unwrap();

    for (fp, secret) in fingerprints.iter().zip(&secrets) {
        let entry = kr.get_key_decrypted(fp).unwrap().unwrap();
        assert_eq!(entry.private_key.as_deref(), Some(secret.as_str()));
    }
}

#[test]
fn change_passphrase_with_wrong_current_fails() {
    let mut kr = keyring();
    kr.set_master_passphrase("first-pass").unwrap();
    assert!(matches!(
        kr.change_passphrase("not-the-pass", "second-pass").unwrap_err(),
        KeyringError::InvalidPassphrase
    ));
    // Old passphrase still valid
    kr.lock();
    kr.unlock("first-pass").unwrap();
}

#[test]
fn rotation_while_locked_fails() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut kr = Keyring::new(FileStore::open(dir.path()).unwrap(), TestKeyParser);
        kr.set_master_passphrase("first-pass").unwrap();
    }
    let mut kr = Keyring::new(FileStore::open(dir.path()).unwrap(), TestKeyParser);
    kr.load().unwrap();
    assert!(matches!(
        kr.set_master_passphrase("second-pass").unwrap_err(),
        KeyringError::Locked
    ));
}

#[test]
fn rotation_aborts_whole_operation_on_undecryptable_entry() {
    use chrono::Utc;
    use pgpvault_keyring::{KeyInfo, KeyringEntry};

    let fp_good = "AAAA111122223333444455556666777788889999";
    let fp_bad = "BBBB111122223333444455556666777788889999";
    let good_cipher = encrypt_encoded(&private_key("good"), "right-pass").unwrap();
    // Encrypted under a passphrase the keyring never had — undecryptable
    let bad_cipher = encrypt_encoded(&private_key("bad"), "other-pass").unwrap();

    let entry = |fp: &str, cipher: &str| KeyringEntry {
        key_id: fp[32..].to_string(),
        fingerprint: fp.to_string(),
        public_key: public_key("x"),
        private_key: Some(cipher.to_string()),
        key_info: KeyInfo {
            algorithm: "ed25519".into(),
            created_at: Utc::now(),
            expires_at: None,
            user_ids: vec![],
            revoked: false,
        },
        added_at: Utc::now(),
        last_used: None,
    };

    let doc = serde_json::json!({
        "encrypted": true,
        "version": 1,
        "verificationToken": generate_token("right-pass").unwrap(),
        "entries": {
            fp_good: serde_json::to_value(entry(fp_good, &good_cipher)).unwrap(),
            fp_bad: serde_json::to_value(entry(fp_bad, &bad_cipher)).unwrap(),
        },
    });

    let mut store = MemoryStore::new();
    store.save(STORAGE_KEY, &doc.to_string()).unwrap();
    let mut kr = Keyring::new(store, TestKeyParser);

    kr.unlock("right-pass").unwrap();
    let err = kr.change_passphrase("right-pass", "brand-new-pass").unwrap_err();
    assert!(matches!(err, KeyringError::DecryptionFailed(_)));

    // Nothing was re-encrypted: both ciphertexts are untouched
    assert_eq!(
        kr.get_key(fp_good).unwrap().unwrap().private_key.as_deref(),
        Some(good_cipher.as_str())
    );
    assert_eq!(
        kr.get_key(fp_bad).unwrap().unwrap().private_key.as_deref(),
        Some(bad_cipher.as_str())
    );
    // And the old passphrase still unlocks
    kr.lock();
    kr.unlock("right-pass").unwrap();
}

// ── Document formats ─────────────────────────────────────────────

#[test]
fn legacy_document_loads_and_migrates_on_next_persist() {
    let dir = tempfile::tempdir().unwrap();
    let secret = private_key("legacy-user");
    let fp = "CCCC111122223333444455556666777788889999";

    let legacy_doc = serde_json::json!({
        fp: {
            "keyId": &fp[32..],
            "fingerprint": fp,
            "publicKey": public_key("Legacy User"),
            "privateKey": secret,
            "keyInfo": {
                "algorithm": "rsa",
                "createdAt": "2020-01-01T00:00:00Z",
                "userIds": [{"name": "Legacy User"}],
                "revoked": false,
            },
            "addedAt": "2020-01-01T00:00:00Z",
        }
    });
    std::fs::write(dir.path().join(STORAGE_KEY), legacy_doc.to_string()).unwrap();

    let mut kr = Keyring::new(FileStore::open(dir.path()).unwrap(), TestKeyParser);
    let warnings = collect_warnings(&mut kr);
    kr.load().unwrap();

    assert!(!kr.is_encrypted());
    let entry = kr.get_key(fp).unwrap().unwrap();
    assert_eq!(entry.private_key.as_deref(), Some(secret.as_str()));
    {
        let warnings = warnings.lock().unwrap();
        assert!(warnings.iter().any(|w| w.contains("legacy")));
        assert!(warnings.iter().any(|w| w.contains("unencrypted private keys")));
    }

    // Any mutation rewrites the document in the wrapped shape
    kr.add_key(&public_key("New Key"), None).unwrap();
    let raw = std::fs::read_to_string(dir.path().join(STORAGE_KEY)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(value.get("entries").is_some());
    assert!(value.get(fp).is_none());
}

#[test]
fn encrypted_document_without_token_refuses_unlock() {
    let doc = r#"{"encrypted": true, "version": 1, "entries": {}}"#;
    let mut store = MemoryStore::new();
    store.save(STORAGE_KEY, doc).unwrap();
    let mut kr = Keyring::new(store, TestKeyParser);

    let err = kr.unlock("any-passphrase").unwrap_err();
    assert!(matches!(err, KeyringError::DecryptionFailed(_)));
}

#[test]
fn absent_document_initializes_empty_unencrypted() {
    let mut kr = keyring();
    assert_eq!(kr.list_keys().unwrap().len(), 0);
    assert!(!kr.is_encrypted());
    assert!(!kr.is_locked());
}

// ── Misc operations ──────────────────────────────────────────────

#[test]
fn delete_key_removes_and_persists() {
    let mut kr = keyring();
    let entry = kr.add_key(&public_key("Alice"), None).unwrap();
    assert!(kr.delete_key(&entry.fingerprint).unwrap());
    assert!(!kr.delete_key(&entry.fingerprint).unwrap());
    assert!(kr.get_key(&entry.fingerprint).unwrap().is_none());
}

#[test]
fn search_matches_names_and_emails_case_insensitively() {
    let mut kr = keyring();
    kr.add_key(&public_key("Alice Example <alice@example.org>"), None)
        .unwrap();
    kr.add_key(&public_key("Bob Builder <bob@buildit.net>"), None)
        .unwrap();

    assert_eq!(kr.search_keys("ALICE").unwrap().len(), 1);
    assert_eq!(kr.search_keys("buildit").unwrap().len(), 1);
    // "b" hits Bob's name and Alice is untouched
    assert_eq!(kr.search_keys("b").unwrap().len(), 1);
    assert_eq!(kr.search_keys("o").unwrap().len(), 2);
    assert_eq!(kr.search_keys("nobody").unwrap().len(), 0);
}

#[test]
fn stats_count_private_expired_and_revoked() {
    let mut kr = keyring();
    kr.add_key(&public_key("plain key"), None).unwrap();
    kr.add_key(&public_key("with secret"), Some(&private_key("s")))
        .unwrap();
    kr.add_key(&public_key("expired key"), None).unwrap();
    kr.add_key(&public_key("revoked key"), None).unwrap();

    let stats = kr.get_stats().unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.with_private_key, 1);
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.revoked, 1);
}

#[test]
fn mark_used_stamps_last_used() {
    let mut kr = keyring();
    let entry = kr.add_key(&public_key("Alice"), None).unwrap();
    assert!(entry.last_used.is_none());

    kr.mark_used(&entry.fingerprint).unwrap();
    let stamped = kr.get_key(&entry.fingerprint).unwrap().unwrap();
    assert!(stamped.last_used.is_some());

    assert!(matches!(
        kr.mark_used("DEADBEEF").unwrap_err(),
        KeyringError::KeyNotFound(_)
    ));
}
