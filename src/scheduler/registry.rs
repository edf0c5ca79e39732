//! Expiry Metadata Registry
//!
//! One [`ExpiryRecord`] per managed key, stored in the shared store under
//! `prefix + key`. The presence of a record is the only durable evidence that
//! a deletion is pending.
//!
//! ## Record Format
//!
//! ```text
//! __ls_delete__:formSubmissionData  ->  {"expiresAt":1767225600000}
//! ```
//!
//! Decoding is lenient about the number's shape (integer, float, numeric
//! string, or boolean read as 1/0) but anything without a usable non-zero
//! `expiresAt` is corrupt.

use crate::error::{SchedulerError, StoreError, StoreOp};
use crate::store::PersistentStore;
use serde::Serialize;
use serde_json::Value;

/// Persisted expiry metadata for one managed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpiryRecord {
    /// Absolute eviction time in epoch milliseconds
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

impl ExpiryRecord {
    pub fn new(expires_at: i64) -> Self {
        Self { expires_at }
    }

    /// Encodes the record as its JSON text.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes a record, returning the reason when it is unusable.
    pub fn decode(raw: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;

        let field = match &value {
            Value::Object(map) => map.get("expiresAt"),
            other => return Err(format!("expected an object, found {}", json_type(other))),
        };

        let expires_at = match field {
            None | Some(Value::Null) => return Err("missing expiresAt".to_string()),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
            Some(Value::String(s)) => parse_numeric(s),
            Some(Value::Bool(b)) => Some(i64::from(*b)),
            Some(other) => return Err(format!("expiresAt is {}", json_type(other))),
        };

        match expires_at {
            Some(0) => Err("expiresAt is zero".to_string()),
            Some(expires_at) => Ok(Self { expires_at }),
            None => Err("expiresAt is not a number".to_string()),
        }
    }
}

fn parse_numeric(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i64)
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Reads and writes expiry records under a reserved key prefix.
#[derive(Debug, Clone)]
pub struct ExpiryRegistry {
    prefix: String,
}

impl ExpiryRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Store key holding the record for `key`.
    pub fn meta_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Recovers the managed key from a record key, if it carries the prefix.
    pub fn managed_key<'a>(&self, meta_key: &'a str) -> Option<&'a str> {
        meta_key.strip_prefix(self.prefix.as_str())
    }

    /// Persists the record for `key`, replacing any existing one.
    pub fn save(
        &self,
        store: &dyn PersistentStore,
        key: &str,
        record: ExpiryRecord,
    ) -> Result<(), SchedulerError> {
        let meta_key = self.meta_key(key);
        let encoded = record.encode().map_err(|e| {
            SchedulerError::persistence(StoreOp::Set, meta_key.as_str(), StoreError::from(e))
        })?;
        store
            .set(&meta_key, &encoded)
            .map_err(|e| SchedulerError::persistence(StoreOp::Set, meta_key, e))
    }

    /// Drops the record for `key`. Missing records are fine.
    pub fn remove(&self, store: &dyn PersistentStore, key: &str) -> Result<(), SchedulerError> {
        let meta_key = self.meta_key(key);
        store
            .remove(&meta_key)
            .map_err(|e| SchedulerError::persistence(StoreOp::Remove, meta_key, e))
    }

    /// Loads the record for `key`.
    ///
    /// `Ok(None)` means no deletion is pending. An unreadable record is a
    /// `Corruption` error; the caller decides whether to drop it.
    pub fn load(
        &self,
        store: &dyn PersistentStore,
        key: &str,
    ) -> Result<Option<ExpiryRecord>, SchedulerError> {
        let meta_key = self.meta_key(key);
        let raw = store
            .get(&meta_key)
            .map_err(|e| SchedulerError::persistence(StoreOp::Get, meta_key.as_str(), e))?;

        match raw {
            None => Ok(None),
            Some(raw) => ExpiryRecord::decode(&raw)
                .map(Some)
                .map_err(|reason| SchedulerError::corruption(meta_key, reason)),
        }
    }

    /// Snapshot of every managed key that currently has a record.
    ///
    /// This walks every entry in the store.
    pub fn scan(&self, store: &dyn PersistentStore) -> Result<Vec<String>, SchedulerError> {
        let keys = store
            .keys()
            .map_err(|e| SchedulerError::persistence(StoreOp::Scan, self.prefix.as_str(), e))?;

        Ok(keys
            .iter()
            .filter_map(|meta_key| self.managed_key(meta_key))
            .map(str::to_string)
            .collect())
    }
}
