//! In-memory store for tests and embedding hosts that persist elsewhere.

use crate::{KeyValueStore, StorageResult};
use std::collections::HashMap;

/// A [`KeyValueStore`] backed by a plain `HashMap`. Contents vanish with the
/// process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn save(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn delete(&mut self, key: &str) -> StorageResult<bool> {
        Ok(self.values.remove(key).is_some())
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        Ok(self.values.keys().cloned().collect())
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.values.clear();
        Ok(())
    }
}
