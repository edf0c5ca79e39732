//! File-Backed Store
//!
//! The whole store is one JSON object (`{"key": "value", ...}`) on disk,
//! mirrored in memory. Every mutation rewrites the file through a temp file in
//! the same directory followed by a rename, so readers and restarts only ever
//! see a complete file.
//!
//! A mutation that cannot be written through is rolled back in memory, keeping
//! the in-memory view and the file in agreement.

use crate::error::{StoreError, StoreResult};
use crate::store::PersistentStore;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tempfile::NamedTempFile;
use tracing::debug;

/// Durable implementation of [`PersistentStore`] backed by a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`.
    ///
    /// A missing (or empty) file is an empty store; the file is created on the
    /// first write. A file that is not a JSON object of strings fails with
    /// [`StoreError::Corrupt`].
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = data.len(), "File store opened");

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically replaces the backing file with `data`.
    fn flush(&self, data: &BTreeMap<String, String>) -> StoreResult<()> {
        let encoded = serde_json::to_vec_pretty(data)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl PersistentStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut data = self.write();
        let previous = data.insert(key.to_string(), value.to_string());

        if let Err(e) = self.flush(&data) {
            match previous {
                Some(old) => data.insert(key.to_string(), old),
                None => data.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut data = self.write();
        let Some(previous) = data.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.flush(&data) {
            data.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.read().len())
    }

    fn key_at(&self, index: usize) -> StoreResult<Option<String>> {
        Ok(self.read().keys().nth(index).cloned())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = assert_ok!(FileStore::open(dir.path().join("store.json")));

        assert!(store.is_empty().unwrap());
        // Nothing is written until the first mutation
        assert!(!store.path().exists());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("formSubmissionData", "{\"name\":\"Ariz\"}").unwrap();
            store.set("other", "1").unwrap();
            store.remove("other").unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
        assert_eq!(
            reopened.get("formSubmissionData").unwrap(),
            Some("{\"name\":\"Ariz\"}".to_string())
        );
        assert_eq!(reopened.get("other").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json at all").unwrap();

        let err = assert_err!(FileStore::open(&path));
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();
        store.set("kept", "1").unwrap();

        // Pull the directory out from under the store so the temp file can't be created
        drop(dir);

        assert_err!(store.set("lost", "2"));
        assert_eq!(store.get("lost").unwrap(), None);

        assert_err!(store.remove("kept"));
        assert_eq!(store.get("kept").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_enumeration() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();

        assert_eq!(store.key_at(0).unwrap(), Some("a".to_string()));
        assert_eq!(store.key_at(5).unwrap(), None);
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
    }
}
