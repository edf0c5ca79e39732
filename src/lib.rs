//! # keylapse - Durable Key Eviction for Persistent Stores
//!
//! keylapse schedules the future deletion of values held in a persistent
//! key-value store. A schedule survives process restarts because its absolute
//! expiry is persisted next to the data, and it can span any length of time
//! because timers are re-armed in chunks no longer than a single timer can
//! represent.
//!
//! ## Features
//!
//! - **Durable**: expiry records live in the same store as the data
//! - **Chunked**: delays past ~24.8 days are split into successive timers
//!   without drift
//! - **Restartable**: `restore_scheduled_deletions` resumes or executes every
//!   pending deletion after a restart
//! - **Never throws**: failures are classified, logged, and counted
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              keylapse                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌───────────────────────────────────────────────┐   │
//! │  │ Application │───>│              DeletionScheduler                │   │
//! │  │  (caller)   │    │   schedule / cancel / restore                 │   │
//! │  └──────┬──────┘    └──────────┬─────────────────────────┬──────────┘   │
//! │         │                      │                         │              │
//! │         │                      ▼                         ▼              │
//! │         │           ┌─────────────────────┐   ┌─────────────────────┐   │
//! │         │           │   ExpiryRegistry    │   │  TimerMultiplexer   │   │
//! │         │           │  (durable records)  │   │  (tokio timers)     │   │
//! │         │           └──────────┬──────────┘   └─────────────────────┘   │
//! │         ▼                      ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          PersistentStore (MemoryStore / FileStore / yours)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use keylapse::store::{FileStore, PersistentStore};
//! use keylapse::{DeletionScheduler, SchedulerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(FileStore::open("data/store.json")?);
//!     let scheduler = DeletionScheduler::new(store.clone(), SchedulerConfig::default());
//!
//!     // Pick up whatever was pending before the last shutdown
//!     scheduler.restore_scheduled_deletions();
//!
//!     store.set("formSubmissionData", "{\"name\":\"Ariz\"}")?;
//!     scheduler.schedule_deletion_after_days("formSubmissionData", 30.0);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`scheduler`]: the deletion scheduler, expiry registry and timer multiplexer
//! - [`store`]: the persistent store contract and its implementations
//! - [`clock`]: wall-clock sources for epoch milliseconds
//! - [`config`]: scheduler configuration
//! - [`error`]: store and scheduler error types

pub mod clock;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod store;

// Re-export commonly used types for convenience
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{SchedulerConfig, DEFAULT_META_PREFIX, MAX_TIMEOUT};
pub use error::{ErrorKind, SchedulerError, StoreError};
pub use scheduler::{DeletionScheduler, ExpiryRecord, StatsSnapshot};
pub use store::{FileStore, MemoryStore, PersistentStore};

/// Version of keylapse
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
