use std::{collections::BTreeMap, fs, path::Path};

use tracing::info;

use crate::database::{KeyValueStore, StoreError};

/// Key-value store held in memory, optionally snapshotted to a JSON file.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Loads a snapshot; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<MemoryStore, StoreError> {
        if !path.exists() {
            info!(path = %path.display(), "No store snapshot, starting empty");
            return Ok(MemoryStore::new());
        }

        let json = fs::read_to_string(path)?;
        let values: BTreeMap<String, String> = serde_json::from_str(&json)?;
        info!(path = %path.display(), keys = values.len(), "Loaded store snapshot");

        Ok(MemoryStore { values })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(path, json)?;
        info!(path = %path.display(), keys = self.values.len(), "Saved store snapshot");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn delete(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }
}
