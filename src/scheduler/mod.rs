//! Deletion Scheduler Module
//!
//! Durable, chunked eviction of keys from a shared persistent store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   DeletionScheduler                         │
//! │      schedule / cancel / restore / perform deletion         │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!                 │                             │
//!                 ▼                             ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │       ExpiryRegistry          │ │     TimerMultiplexer      │
//! │ prefix + key → {"expiresAt"}  │ │  key → live TimerHandle   │
//! │   (durable, in the store)     │ │   (memory only, tokio)    │
//! └───────────────┬───────────────┘ └───────────────────────────┘
//!                 │
//!                 ▼
//! ┌───────────────────────────────┐
//! │       PersistentStore         │
//! └───────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - A key has an expiry record exactly when a deletion is pending for it.
//! - A key has at most one live timer; arming always cancels the previous one.
//! - Deletion removes the key, then clears the timer and the record, even when
//!   removing the key failed.

pub mod engine;
pub mod registry;
pub mod timers;

pub use engine::{DeletionScheduler, SchedulerStats, StatsSnapshot};
pub use registry::{ExpiryRecord, ExpiryRegistry};
pub use timers::{TimerHandle, TimerMultiplexer};
