//! Error Types
//!
//! Two layers of errors live here:
//!
//! - [`StoreError`]: what a [`PersistentStore`](crate::store::PersistentStore)
//!   implementation reports when a read or write fails.
//! - [`SchedulerError`]: what the scheduler records when one of its own steps
//!   fails. These never reach the scheduler's callers; they are classified by
//!   [`ErrorKind`] and handed to the scheduler's reporting sink, which logs them
//!   and counts them.

use std::fmt;
use thiserror::Error;

/// Errors raised by a persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying file I/O failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The store contents could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing file exists but does not hold a valid store
    #[error("corrupt store file: {0}")]
    Corrupt(String),

    /// A write would push the store past its byte quota
    #[error("quota exceeded: {needed} bytes needed (limit: {limit})")]
    QuotaExceeded { needed: usize, limit: usize },

    /// The store refuses all writes
    #[error("store is read-only")]
    ReadOnly,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Set,
    Remove,
    Scan,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOp::Get => "get",
            StoreOp::Set => "set",
            StoreOp::Remove => "remove",
            StoreOp::Scan => "scan",
        };
        f.write_str(name)
    }
}

/// Classification of scheduler failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A store read or write failed
    Persistence,
    /// A persisted expiry record could not be understood
    Corruption,
    /// Durable storage or the timer runtime is missing
    Unavailable,
}

/// A failure inside the deletion scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store {op} failed for {key:?}: {source}")]
    Persistence {
        op: StoreOp,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("bad expiry record at {meta_key:?}: {reason}")]
    Corruption { meta_key: String, reason: String },

    #[error("scheduler unavailable: {reason}")]
    Unavailable { reason: String },
}

impl SchedulerError {
    pub(crate) fn persistence(op: StoreOp, key: impl Into<String>, source: StoreError) -> Self {
        SchedulerError::Persistence {
            op,
            key: key.into(),
            source,
        }
    }

    pub(crate) fn corruption(meta_key: impl Into<String>, reason: impl Into<String>) -> Self {
        SchedulerError::Corruption {
            meta_key: meta_key.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        SchedulerError::Unavailable {
            reason: reason.into(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Persistence { .. } => ErrorKind::Persistence,
            SchedulerError::Corruption { .. } => ErrorKind::Corruption,
            SchedulerError::Unavailable { .. } => ErrorKind::Unavailable,
        }
    }
}
