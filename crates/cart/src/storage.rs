//! Durable client storage.
//!
//! A persisted string key/value surface with `get`/`set`/`remove` semantics
//! and no TTL of its own - expiry and version invalidation are layered on
//! top by [`crate::cache::VersionedCache`]. The trait mirrors what a web
//! client gets from `localStorage`: synchronous, side-effect-local calls
//! with enumerable keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

/// Errors from the durable storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted document could not be encoded.
    #[error("storage document could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A durable string key/value store.
///
/// Implementations must be cheap to call from the UI thread; anything slow
/// belongs behind the remote collaborators instead.
pub trait StorageBackend: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures; a missing key is `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be durably written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key unconditionally. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion cannot be durably recorded.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Enumerate all stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing document cannot be read.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory storage backend.
///
/// Nothing survives the process; used in tests and as the default when no
/// storage path is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read().keys().cloned().collect())
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// File-backed storage: one JSON document holding every key.
///
/// The document is read once at open and written through on every change.
/// A corrupt document is treated as empty rather than failing the boot -
/// the cache layer above re-validates everything it reads anyway.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read. A missing
    /// file starts empty; a corrupt one is discarded with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding corrupt storage document");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StorageError::Io(e)),
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let raw = serde_json::to_string(entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.write();
        entries.insert(key.to_owned(), value.to_owned());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.write();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read().keys().cloned().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pp-cart-{name}-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        // Removing a missing key is a no-op.
        store.remove("k").unwrap();
    }

    #[test]
    fn test_memory_store_keys() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let path = temp_path("reopen");
        {
            let store = FileStore::open(&path).unwrap();
            store.set("cart", "{}").unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("cart").unwrap().as_deref(), Some("{}"));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_store_corrupt_document_starts_empty() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "not json at all {{{").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("anything").unwrap(), None);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_store_missing_file_starts_empty() {
        let path = temp_path("missing");
        let store = FileStore::open(&path).unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
