//! Local cache used when no remote document store is reachable.
//!
//! The cache is a plain string key/value store. The drawing log is stored
//! under [`cache_key`] for the current identity.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod web;

pub use memory::MemoryCache;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileCache;

#[cfg(target_arch = "wasm32")]
pub use web::WebStorageCache;

use thiserror::Error;

/// Prefix of the cache key holding a board's serialized drawing log.
pub const CACHE_KEY_PREFIX: &str = "whiteboard_lines_";

/// Cache key for the given identity id.
pub fn cache_key(identity_id: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, identity_id)
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for local cache backends.
///
/// Implementations keep values in memory, in files on disk, or in the
/// browser's `localStorage` (WASM). Reads and writes are synchronous, like
/// the web storage API they mirror.
pub trait LocalCache {
    /// Read a value. Absent keys yield `Ok(None)`.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
}
