//! File-based cache implementation for native platforms.

use super::{LocalCache, StorageError, StorageResult};
use std::fs;
use std::path::{Path, PathBuf};

/// File-based cache for native platforms.
///
/// Stores each entry as a `.json` file in a directory.
pub struct FileCache {
    /// Base directory for cache entries.
    base_path: PathBuf,
}

impl FileCache {
    /// Create a new file cache with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create cache directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create a file cache in the default location.
    ///
    /// On Unix: `~/.local/share/inkboard/cache/`
    /// On Windows: `%LOCALAPPDATA%\inkboard\cache\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("inkboard").join("cache"))
    }

    /// Get the file path for a key.
    fn entry_path(&self, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_key))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.entry_path(key);
        fs::write(&path, value)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }
}
