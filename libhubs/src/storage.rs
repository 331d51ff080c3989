//! Durable key-value storage for client preferences and the session token
//!
//! The application store is the only writer. Values are plain strings so the
//! on-disk format stays trivially inspectable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StorageError};

/// Storage keys used by the client
pub mod keys {
    /// Bearer token of the current session
    pub const TOKEN: &str = "token";
    /// `"true"` when explicit content is shown
    pub const NSFW: &str = "nsfw";
    /// Feed view mode
    pub const VIEW: &str = "view";
    /// Feed sort mode
    pub const SORT: &str = "sort";
    /// Favorite hub names joined by a single space
    pub const FAVORITES: &str = "history";
}

/// String-keyed, string-valued storage that outlives the process
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Volatile storage, for tests and for sessions that should not persist
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with the given pairs
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }

    /// Copy of everything stored, for assertions
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        lock(&self.values).clone()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}

/// JSON-file backed storage
///
/// The whole map is rewritten on every change through a temporary file and
/// a rename, so a crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the storage file, creating parent directories as needed
    ///
    /// A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
            }
        }

        let values = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(StorageError::Serialization)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StorageError::Io(e).into()),
        };

        tracing::debug!("Opened storage at {} ({} keys)", path.display(), values.len());

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(values).map_err(StorageError::Serialization)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(StorageError::Io)?;
        std::fs::rename(&tmp, &self.path).map_err(StorageError::Io)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    // Changes reach memory only once they are on disk
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = lock(&self.values);
        if values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *values = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = lock(&self.values);
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.flush(&next)?;
        *values = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HubsError;
    use tempfile::TempDir;

    #[test]
    fn test_memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get(keys::TOKEN), None);

        storage.set(keys::TOKEN, "T1").unwrap();
        assert_eq!(storage.get(keys::TOKEN), Some("T1".to_string()));

        storage.remove(keys::TOKEN).unwrap();
        assert_eq!(storage.get(keys::TOKEN), None);
    }

    #[test]
    fn test_memory_storage_with_values() {
        let storage = MemoryStorage::with_values([(keys::SORT, "top"), (keys::VIEW, "image")]);
        assert_eq!(storage.get(keys::SORT), Some("top".to_string()));
        assert_eq!(storage.snapshot().len(), 2);
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage.set(keys::TOKEN, "T1").unwrap();
            storage.set(keys::FAVORITES, "rust gamedev").unwrap();
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(keys::TOKEN), Some("T1".to_string()));
        assert_eq!(reopened.get(keys::FAVORITES), Some("rust gamedev".to_string()));

        reopened.remove(keys::TOKEN).unwrap();
        let again = FileStorage::open(&path).unwrap();
        assert_eq!(again.get(keys::TOKEN), None);
    }

    #[test]
    fn test_file_storage_failed_write_keeps_memory_in_step() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        let storage = FileStorage::open(nested.join("state.json")).unwrap();
        storage.set(keys::TOKEN, "T1").unwrap();

        // Writes fail once the directory is gone
        std::fs::remove_dir_all(&nested).unwrap();

        assert!(storage.remove(keys::TOKEN).is_err());
        assert_eq!(storage.get(keys::TOKEN), Some("T1".to_string()));

        assert!(storage.set(keys::SORT, "top").is_err());
        assert_eq!(storage.get(keys::SORT), None);
    }

    #[test]
    fn test_file_storage_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path().join("absent.json")).unwrap();
        assert_eq!(storage.get(keys::NSFW), None);
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_file_storage_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = FileStorage::open(&path);
        assert!(matches!(
            result,
            Err(HubsError::Storage(StorageError::Serialization(_)))
        ));
    }
}
