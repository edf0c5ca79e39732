//! Persistent Store Module
//!
//! The scheduler does not own the data it evicts. It works against a durable,
//! synchronous key-value string store that the rest of the application shares.
//! This module defines that contract and ships two implementations.
//!
//! ## Implementations
//!
//! - [`MemoryStore`]: ordered in-memory map with optional quota and read-only
//!   switches. Survives a scheduler restart as long as the value is kept alive,
//!   which is how tests model a page reload.
//! - [`FileStore`]: one JSON file, written through atomically on every mutation.
//!   Survives a process restart.
//!
//! ## Example
//!
//! ```
//! use keylapse::store::{MemoryStore, PersistentStore};
//!
//! let store = MemoryStore::new();
//! store.set("name", "Ariz").unwrap();
//! assert_eq!(store.get("name").unwrap(), Some("Ariz".to_string()));
//! assert_eq!(store.len().unwrap(), 1);
//! assert_eq!(store.key_at(0).unwrap(), Some("name".to_string()));
//! ```

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;

/// A durable, enumerable key-value string store.
///
/// All operations are synchronous. Removing a key that does not exist is not an
/// error.
pub trait PersistentStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key` from the store.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Number of entries in the store.
    fn len(&self) -> StoreResult<usize>;

    /// Returns the key at position `index`, or `None` past the end.
    fn key_at(&self, index: usize) -> StoreResult<Option<String>>;

    /// Returns `true` if the store holds no entries.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of every key currently in the store.
    ///
    /// The default walks `len`/`key_at`; implementations with direct access to
    /// their key set should override it.
    fn keys(&self) -> StoreResult<Vec<String>> {
        let len = self.len()?;
        let mut keys = Vec::with_capacity(len);
        for index in 0..len {
            if let Some(key) = self.key_at(index)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
