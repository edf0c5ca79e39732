//! In-Memory Store
//!
//! An ordered map behind a `RwLock`. Keys enumerate in sorted order, so
//! `key_at` is stable between calls as long as the store is not mutated.
//!
//! Two switches make it behave like a constrained browser store:
//!
//! - a byte quota (`with_quota`): a write that would push the total size of
//!   keys plus values past the limit fails with `QuotaExceeded`
//! - a read-only flag (`set_read_only`): every write fails with `ReadOnly`

use crate::error::{StoreError, StoreResult};
use crate::store::PersistentStore;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe in-memory implementation of [`PersistentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
    read_only: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty, unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that holds at most `limit` bytes of keys and values.
    pub fn with_quota(limit: usize) -> Self {
        Self {
            quota: Some(limit),
            ..Self::default()
        }
    }

    /// Makes every subsequent write (set and remove) fail, or lifts that restriction.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Relaxed);
    }

    /// Total bytes currently used by keys and values.
    pub fn used_bytes(&self) -> usize {
        self.read()
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<String, String>>> {
        if self.read_only.load(Ordering::Relaxed) {
            return Err(StoreError::ReadOnly);
        }
        Ok(self.data.write().unwrap_or_else(PoisonError::into_inner))
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut data = self.write()?;

        if let Some(limit) = self.quota {
            let used: usize = data.iter().map(|(k, v)| k.len() + v.len()).sum();
            let replaced = data.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
            let needed = used - replaced + key.len() + value.len();
            if needed > limit {
                return Err(StoreError::QuotaExceeded { needed, limit });
            }
        }

        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.write()?.remove(key);
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
