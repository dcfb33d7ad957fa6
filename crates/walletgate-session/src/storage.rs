//! Key-value storage backends.
//!
//! The session store needs exactly what a browser's `localStorage` offers:
//! get, set, and remove a string under a string key. [`KeyValueStore`] is
//! that contract; [`MemoryStorage`] and [`FileStorage`] are the two media
//! we ship.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{SessionError, StorageError};

/// A synchronous string key-value store.
///
/// Synchronous on purpose: the backing media are local and fast, and the
/// session store calls these from inside state transitions that must not
/// yield.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Reads the value under `key`. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deletes `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Process-local storage backed by a `HashMap`.
///
/// Clones share the same map. It can be flipped into an "unavailable" mode
/// where every call fails, which is how tests simulate a full quota or
/// disabled storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true`, every operation fails with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Raw access for tests that want to plant or inspect a value without
    /// going through the session store.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory storage disabled".into()));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // Every critical section is a single map operation; a panic inside
        // one can't leave the map half-updated.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.lock().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStorage
// ---------------------------------------------------------------------------

/// One file per key under a directory: `<dir>/<key>.json`.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write leaves the previous value intact rather than a
/// truncated record.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (creating if needed) a storage directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SessionError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| SessionError::StorageDir {
            path: dir.clone(),
            source,
        })?;
        tracing::debug!(dir = %dir.display(), "file storage opened");
        Ok(Self { dir })
    }

    /// The directory this storage writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        // The directory may have been removed since `open`.
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("walletgate-test-{}", uuid::Uuid::new_v4()));
        path
    }

    // =====================================================================
    // MemoryStorage
    // =====================================================================

    #[test]
    fn test_memory_set_get_remove() {
        let storage = MemoryStorage::new();

        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));

        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_remove_missing_key_is_ok() {
        let storage = MemoryStorage::new();
        assert!(storage.remove("nothing-here").is_ok());
    }

    #[test]
    fn test_memory_unavailable_fails_every_call() {
        let storage = MemoryStorage::new();
        storage.set_unavailable(true);

        assert!(matches!(storage.get("k"), Err(StorageError::Unavailable(_))));
        assert!(matches!(storage.set("k", "v"), Err(StorageError::Unavailable(_))));
        assert!(matches!(storage.remove("k"), Err(StorageError::Unavailable(_))));
    }

    // =====================================================================
    // FileStorage
    // =====================================================================

    #[test]
    fn test_file_storage_round_trip() {
        let dir = temp_dir();
        let storage = FileStorage::open(&dir).unwrap();

        storage.set("midnight_session", "{\"a\":1}").unwrap();

        assert_eq!(
            storage.get("midnight_session").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert!(dir.join("midnight_session.json").exists());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_storage_missing_key_returns_none() {
        let dir = temp_dir();
        let storage = FileStorage::open(&dir).unwrap();

        assert_eq!(storage.get("absent").unwrap(), None);
        assert!(storage.remove("absent").is_ok());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_storage_recreates_deleted_directory_on_set() {
        let dir = temp_dir();
        let storage = FileStorage::open(&dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        storage.set("k", "v").unwrap();

        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_storage_rejects_path_like_keys() {
        let dir = temp_dir();
        let storage = FileStorage::open(&dir).unwrap();

        assert!(matches!(
            storage.set("../escape", "v"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(storage.get(""), Err(StorageError::InvalidKey(_))));

        fs::remove_dir_all(dir).unwrap();
    }
}
