use pgpvault_storage::{FileStore, KeyValueStore, MemoryStore, StorageError};

#[test]
fn file_store_save_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();

    store.save("keyring", r#"{"entries":{}}"#).unwrap();
    assert_eq!(
        store.load("keyring").unwrap().as_deref(),
        Some(r#"{"entries":{}}"#)
    );
}

#[test]
fn file_store_load_missing_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    assert_eq!(store.load("keyring").unwrap(), None);
}

#[test]
fn file_store_overwrite_replaces_value() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();

    store.save("keyring", "one").unwrap();
    store.save("keyring", "two").unwrap();
    assert_eq!(store.load("keyring").unwrap().as_deref(), Some("two"));
}

#[test]
fn file_store_delete_and_list() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();

    store.save("alpha", "1").unwrap();
    store.save("beta", "2").unwrap();
    assert_eq!(store.list().unwrap(), vec!["alpha", "beta"]);

    assert!(store.delete("alpha").unwrap());
    assert!(!store.delete("alpha").unwrap());
    assert_eq!(store.list().unwrap(), vec!["beta"]);
}

#[test]
fn file_store_clear_empties_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();

    store.save("alpha", "1").unwrap();
    store.save("beta", "2").unwrap();
    store.clear().unwrap();
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn file_store_rejects_path_traversal_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();

    for bad in ["../escape", "a/b", "", ".hidden", "x.tmp"] {
        assert!(
            matches!(store.save(bad, "v"), Err(StorageError::InvalidKey(_))),
            "key {bad:?} should be rejected"
        );
    }
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = FileStore::open(dir.path()).unwrap();
        store.save("keyring", "persisted").unwrap();
    }
    let store = FileStore::open(dir.path()).unwrap();
    assert_eq!(store.load("keyring").unwrap().as_deref(), Some("persisted"));
}

#[test]
fn memory_store_behaves_like_contract() {
    let mut store = MemoryStore::new();
    assert_eq!(store.load("keyring").unwrap(), None);
    store.save("keyring", "value").unwrap();
    assert_eq!(store.load("keyring").unwrap().as_deref(), Some("value"));
    assert_eq!(store.list().unwrap(), vec!["keyring"]);
    assert!(store.delete("keyring").unwrap());
    assert_eq!(store.load("keyring").unwrap(), None);
}
