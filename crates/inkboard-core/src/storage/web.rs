//! `localStorage`-backed cache for WASM.

use super::{LocalCache, StorageError, StorageResult};

/// Cache backed by the browser's `window.localStorage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebStorageCache;

impl WebStorageCache {
    pub fn new() -> Self {
        Self
    }

    fn storage(&self) -> StorageResult<web_sys::Storage> {
        web_sys::window()
            .ok_or_else(|| StorageError::Other("No window available".to_string()))?
            .local_storage()
            .map_err(|e| StorageError::Other(format!("localStorage unavailable: {:?}", e)))?
            .ok_or_else(|| StorageError::Other("localStorage disabled".to_string()))
    }
}

impl LocalCache for WebStorageCache {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage()?
            .get_item(key)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {:?}", key, e)))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage()?
            .set_item(key, value)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {:?}", key, e)))
    }
}
