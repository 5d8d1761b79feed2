//! Key-value persistence adapters for pgpvault.
//!
//! The keyring treats storage as a flat string-to-string map and writes its
//! entire state as one JSON document under a single key. Anything that can
//! satisfy [`KeyValueStore`] can back a keyring: the in-memory store here,
//! the file store here, or a host-provided adapter (browser storage, a
//! database, ...).

mod error;
mod file;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Minimal key-value persistence contract consumed by the keyring.
pub trait KeyValueStore {
    /// Stores `value` under `key`, overwriting any previous value.
    fn save(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Loads the value under `key`, or `None` if absent.
    fn load(&self, key: &str) -> StorageResult<Option<String>>;

    /// Removes `key`. Returns whether a value was present.
    fn delete(&mut self, key: &str) -> StorageResult<bool>;

    /// Lists all stored keys.
    fn list(&self) -> StorageResult<Vec<String>>;

    /// Removes everything.
    fn clear(&mut self) -> StorageResult<()>;
}
