//! Deletion Scheduler
//!
//! Schedules the future removal of a key from a shared [`PersistentStore`] in a
//! way that outlives both a single timer and a single process.
//!
//! ## How a Deletion Runs
//!
//! ```text
//! schedule(key, ms)
//!     │
//!     ├── persist {"expiresAt": now + ms} under prefix + key
//!     │
//!     ▼
//! ┌──────────────────────────────────────────┐
//! │ advance(key, expiresAt)                  │◄─────┐
//! │   remaining = expiresAt - now            │      │
//! │   remaining <= 0  → delete + clean up    │      │ timer fires
//! │   otherwise       → arm min(remaining,   │──────┘
//! │                          max_timeout)    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Every chunk recomputes `remaining` against the same absolute expiry, so
//! chunking never accumulates drift, and `restore_scheduled_deletions` can
//! resume the exact same schedule after a restart.
//!
//! ## Failure Policy
//!
//! No entry point returns an error. Store failures, corrupt records and a
//! missing store or runtime are classified as [`SchedulerError`]s, logged, and
//! counted in [`SchedulerStats`]. A missed eviction only means data lives
//! longer; crashing the caller would be worse.

use crate::clock::{Clock, SystemClock, MS_PER_DAY};
use crate::config::SchedulerConfig;
use crate::error::{ErrorKind, SchedulerError, StoreOp};
use crate::scheduler::registry::{ExpiryRecord, ExpiryRegistry};
use crate::scheduler::timers::{TimerHandle, TimerMultiplexer};
use crate::store::PersistentStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Counters describing what the scheduler has done.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    /// Deletions scheduled
    pub scheduled: AtomicU64,
    /// Cancel calls
    pub canceled: AtomicU64,
    /// Timer chunks armed (initial, re-armed, and restored)
    pub chunks_armed: AtomicU64,
    /// Deletions executed
    pub deletions: AtomicU64,
    /// Valid records picked up by restore
    pub restored: AtomicU64,
    /// Store reads or writes that failed
    pub persistence_failures: AtomicU64,
    /// Corrupt records dropped
    pub corrupt_records: AtomicU64,
    /// Times the store or runtime was missing
    pub unavailable: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub scheduled: u64,
    pub canceled: u64,
    pub chunks_armed: u64,
    pub deletions: u64,
    pub restored: u64,
    pub persistence_failures: u64,
    pub corrupt_records: u64,
    pub unavailable: u64,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
            chunks_armed: self.chunks_armed.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
            restored: self.restored.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            corrupt_records: self.corrupt_records.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Schedules durable, chunked deletion of keys in a persistent store.
///
/// Cloning is cheap and every clone drives the same timers. When the last
/// clone is dropped, all live timers are canceled; persisted records stay
/// behind for the next [`restore_scheduled_deletions`](Self::restore_scheduled_deletions).
///
/// # Example
///
/// ```
/// use keylapse::store::{MemoryStore, PersistentStore};
/// use keylapse::{DeletionScheduler, SchedulerConfig};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = Arc::new(MemoryStore::new());
/// store.set("formSubmissionData", "{}").unwrap();
///
/// let scheduler = DeletionScheduler::new(store.clone(), SchedulerConfig::default());
/// scheduler.restore_scheduled_deletions();
///
/// scheduler.schedule_deletion_after_days("formSubmissionData", 30.0);
/// assert!(scheduler.is_armed("formSubmissionData"));
///
/// scheduler.cancel_scheduled_deletion("formSubmissionData");
/// assert!(store.get("formSubmissionData").unwrap().is_some());
/// # }
/// ```
#[derive(Clone)]
pub struct DeletionScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    store: Option<Arc<dyn PersistentStore>>,
    registry: ExpiryRegistry,
    timers: Mutex<TimerMultiplexer>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    stats: SchedulerStats,
}

impl std::fmt::Debug for DeletionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionScheduler")
            .field("has_store", &self.inner.store.is_some())
            .field("meta_prefix", &self.inner.config.meta_prefix)
            .field("armed", &self.inner.timers.try_lock().map(|t| t.len()).ok())
            .finish()
    }
}

impl DeletionScheduler {
    /// Creates a scheduler over `store` using the system clock.
    pub fn new(store: Arc<dyn PersistentStore>, config: SchedulerConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Creates a scheduler over `store` reading time from `clock`.
    pub fn with_clock(
        store: Arc<dyn PersistentStore>,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::build(Some(store), config, clock)
    }

    /// Creates a scheduler for a context with no durable storage.
    ///
    /// Every entry point is a no-op.
    pub fn unavailable(config: SchedulerConfig) -> Self {
        let scheduler = Self::build(None, config, Arc::new(SystemClock));
        scheduler
            .inner
            .report(SchedulerError::unavailable("no persistent store"));
        scheduler
    }

    fn build(
        store: Option<Arc<dyn PersistentStore>>,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                registry: ExpiryRegistry::new(config.meta_prefix.clone()),
                timers: Mutex::new(TimerMultiplexer::new()),
                clock,
                config,
                stats: SchedulerStats::new(),
            }),
        }
    }

    /// Schedules `key` for deletion `ms` milliseconds from now.
    ///
    /// Negative values mean "as soon as possible": the key is deleted before
    /// this call returns. Scheduling a key that is already scheduled replaces
    /// the earlier schedule.
    pub fn schedule_deletion_after_ms(&self, key: &str, ms: i64) {
        let inner = &self.inner;
        let Some(store) = inner.store.as_deref() else {
            return;
        };
        if key.is_empty() {
            return;
        }

        let mut timers = inner.lock_timers();
        let expires_at = inner.clock.now_ms().saturating_add(ms.max(0));

        if let Err(e) = inner.registry.save(store, key, ExpiryRecord::new(expires_at)) {
            inner.report(e);
        }
        SchedulerStats::bump(&inner.stats.scheduled);
        debug!(key = %key, delay_ms = ms.max(0), expires_at, "Deletion scheduled");

        inner.advance(&mut timers, store, key, expires_at);
    }

    /// Schedules `key` for deletion after `delay`.
    pub fn schedule_deletion_after(&self, key: &str, delay: Duration) {
        let ms = delay.as_millis().min(i64::MAX as u128) as i64;
        self.schedule_deletion_after_ms(key, ms);
    }

    /// Schedules `key` for deletion after `days` days, rounded to the nearest
    /// millisecond. Non-finite or negative day counts mean "as soon as possible".
    ///
    /// Always returns `true` to signal that a schedule call was issued.
    pub fn schedule_deletion_after_days(&self, key: &str, days: f64) -> bool {
        self.schedule_deletion_after_ms(key, days_to_ms(days));
        true
    }

    /// Schedules `key` for deletion after the configured default retention.
    pub fn schedule_default_deletion(&self, key: &str) -> bool {
        self.schedule_deletion_after_days(key, self.inner.config.default_retention_days)
    }

    /// Cancels any pending deletion of `key`.
    ///
    /// The current value of `key` is left untouched. Canceling a key with
    /// nothing pending is a no-op.
    pub fn cancel_scheduled_deletion(&self, key: &str) {
        let inner = &self.inner;
        let Some(store) = inner.store.as_deref() else {
            return;
        };
        if key.is_empty() {
            return;
        }

        let mut timers = inner.lock_timers();
        let had_timer = timers.cancel(key);

        if let Err(e) = inner.registry.remove(store, key) {
            inner.report(e);
        }
        SchedulerStats::bump(&inner.stats.canceled);
        debug!(key = %key, had_timer, "Scheduled deletion canceled");
    }

    /// Re-arms every pending deletion found in the store.
    ///
    /// Meant to run once at process start. Records that already expired are
    /// executed immediately, corrupt records are dropped, and the rest resume
    /// against their persisted expiry. Calling it again replaces timers rather
    /// than duplicating them.
    pub fn restore_scheduled_deletions(&self) {
        let inner = &self.inner;
        let Some(store) = inner.store.as_deref() else {
            return;
        };

        let mut timers = inner.lock_timers();
        let keys = match inner.registry.scan(store) {
            Ok(keys) => keys,
            Err(e) => {
                inner.report(e);
                return;
            }
        };

        let mut resumed = 0usize;
        let mut expired = 0usize;

        for key in keys {
            let record = match inner.registry.load(store, &key) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    let corrupt = e.kind() == ErrorKind::Corruption;
                    inner.report(e);
                    if corrupt {
                        if let Err(e) = inner.registry.remove(store, &key) {
                            inner.report(e);
                        }
                    }
                    continue;
                }
            };

            SchedulerStats::bump(&inner.stats.restored);
            if inner.clock.now_ms() >= record.expires_at {
                expired += 1;
                inner.perform_deletion(&mut timers, store, &key);
            } else {
                resumed += 1;
                inner.advance(&mut timers, store, &key, record.expires_at);
            }
        }

        info!(resumed, expired, "Scheduled deletions restored");
    }

    /// Persisted expiry of `key`, if a valid record exists.
    pub fn expires_at(&self, key: &str) -> Option<i64> {
        let store = self.inner.store.as_deref()?;
        match self.inner.registry.load(store, key) {
            Ok(record) => record.map(|r| r.expires_at),
            Err(e) => {
                self.inner.report(e);
                None
            }
        }
    }

    /// Every managed key with a valid record, paired with its expiry.
    pub fn pending(&self) -> Vec<(String, i64)> {
        let Some(store) = self.inner.store.as_deref() else {
            return Vec::new();
        };

        let keys = match self.inner.registry.scan(store) {
            Ok(keys) => keys,
            Err(e) => {
                self.inner.report(e);
                return Vec::new();
            }
        };

        keys.into_iter()
            .filter_map(|key| match self.inner.registry.load(store, &key) {
                Ok(record) => record.map(|r| (key, r.expires_at)),
                Err(e) => {
                    self.inner.report(e);
                    None
                }
            })
            .collect()
    }

    /// Returns `true` if a timer is currently armed for `key`.
    pub fn is_armed(&self, key: &str) -> bool {
        self.inner.lock_timers().contains(key)
    }

    /// Expiry the live timer for `key` is working towards, if one is armed.
    pub fn armed_expiry(&self, key: &str) -> Option<i64> {
        self.inner.lock_timers().get(key).map(TimerHandle::expires_at)
    }

    /// Number of keys with a live timer.
    pub fn armed_count(&self) -> usize {
        self.inner.lock_timers().len()
    }

    /// Cancels every live timer. Persisted records are kept.
    pub fn shutdown(&self) {
        let canceled = self.inner.lock_timers().cancel_all();
        info!(canceled, "Deletion scheduler shut down");
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }
}

impl Inner {
    fn lock_timers(&self) -> MutexGuard<'_, TimerMultiplexer> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves `key` one step towards its expiry: delete now, or arm the next chunk.
    fn advance(
        self: &Arc<Self>,
        timers: &mut TimerMultiplexer,
        store: &dyn PersistentStore,
        key: &str,
        expires_at: i64,
    ) {
        timers.cancel(key);

        let remaining = expires_at.saturating_sub(self.clock.now_ms());
        if remaining <= 0 {
            self.perform_deletion(timers, store, key);
            return;
        }

        let chunk = remaining.min(self.config.max_chunk_ms());
        let weak = Arc::downgrade(self);
        let owned_key = key.to_string();

        let armed = timers.arm(
            key,
            Duration::from_millis(chunk as u64),
            expires_at,
            move |id| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_fire(&owned_key, id, expires_at);
                }
            },
        );

        match armed {
            Ok(id) => {
                SchedulerStats::bump(&self.stats.chunks_armed);
                trace!(key = %key, timer = id, chunk_ms = chunk, remaining_ms = remaining, "Timer armed");
            }
            Err(e) => self.report(e),
        }
    }

    fn on_fire(self: &Arc<Self>, key: &str, id: u64, expires_at: i64) {
        let Some(store) = self.store.as_deref() else {
            return;
        };

        let mut timers = self.lock_timers();
        if !timers.detach(key, id) {
            trace!(key = %key, timer = id, "Ignoring stale timer");
            return;
        }

        trace!(key = %key, timer = id, "Timer fired");
        self.advance(&mut timers, store, key, expires_at);
    }

    /// Removes `key` from the store, then clears its timer and record even if
    /// the removal failed.
    fn perform_deletion(&self, timers: &mut TimerMultiplexer, store: &dyn PersistentStore, key: &str) {
        if let Err(e) = store.remove(key) {
            self.report(SchedulerError::persistence(StoreOp::Remove, key, e));
        }

        timers.cancel(key);
        if let Err(e) = self.registry.remove(store, key) {
            self.report(e);
        }

        SchedulerStats::bump(&self.stats.deletions);
        info!(key = %key, "Managed key deleted");
    }

    /// Logs a failure and counts it by kind.
    fn report(&self, err: SchedulerError) {
        match err.kind() {
            ErrorKind::Persistence => {
                SchedulerStats::bump(&self.stats.persistence_failures);
                warn!(error = %err, "Store operation failed");
            }
            ErrorKind::Corruption => {
                SchedulerStats::bump(&self.stats.corrupt_records);
                warn!(error = %err, "Dropping corrupt expiry record");
            }
            ErrorKind::Unavailable => {
                SchedulerStats::bump(&self.stats.unavailable);
                error!(error = %err, "Deletion scheduler degraded");
            }
        }
    }
}

/// Converts a day count to whole milliseconds.
fn days_to_ms(days: f64) -> i64 {
    if !days.is_finite() || days <= 0.0 {
        return 0;
    }
    // Float-to-int casts saturate
    (days * MS_PER_DAY).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::store::{FileStore, MemoryStore};
    use tokio::time::sleep;

    const EPOCH: i64 = 1_700_000_000_000;
    const DAY: Duration = Duration::from_secs(86_400);

    fn setup(config: SchedulerConfig) -> (Arc<MemoryStore>, Arc<TokioClock>, DeletionScheduler) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(TokioClock::starting_at(EPOCH));
        let scheduler = DeletionScheduler::with_clock(store.clone(), config, clock.clone());
        (store, clock, scheduler)
    }

    fn meta(key: &str) -> String {
        format!("__ls_delete__:{key}")
    }

    #[test]
    fn test_days_to_ms() {
        assert_eq!(days_to_ms(30.0), 2_592_000_000);
        assert_eq!(days_to_ms(0.5), 43_200_000);
        assert_eq!(days_to_ms(1.0 / 86_400_000.0 * 1.6), 2);
        assert_eq!(days_to_ms(-3.0), 0);
        assert_eq!(days_to_ms(f64::NAN), 0);
        assert_eq!(days_to_ms(f64::INFINITY), 0);
        assert_eq!(days_to_ms(1e300), i64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_key_is_deleted_on_time() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("k", "value").unwrap();

        scheduler.schedule_deletion_after_ms("k", 1_000);
        assert!(scheduler.is_armed("k"));
        assert_eq!(scheduler.expires_at("k"), Some(EPOCH + 1_000));
        assert_eq!(
            store.get(&meta("k")).unwrap(),
            Some(format!("{{\"expiresAt\":{}}}", EPOCH + 1_000))
        );

        sleep(Duration::from_millis(999)).await;
        assert!(store.get("k").unwrap().is_some());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(store.get(&meta("k")).unwrap(), None);
        assert!(!scheduler.is_armed("k"));
        assert_eq!(scheduler.stats().deletions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_and_negative_delays_delete_immediately() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        scheduler.schedule_deletion_after_ms("a", 0);
        scheduler.schedule_deletion_after_ms("b", -500);

        assert!(store.is_empty().unwrap());
        assert_eq!(scheduler.armed_count(), 0);
        assert_eq!(scheduler.stats().chunks_armed, 0);
        assert_eq!(scheduler.stats().deletions, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_without_schedule_is_noop() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("k", "value").unwrap();
        store.set("other", "x").unwrap();

        scheduler.cancel_scheduled_deletion("k");
        scheduler.cancel_scheduled_deletion("missing");

        assert_eq!(store.keys().unwrap(), vec!["k", "other"]);
        assert_eq!(scheduler.stats().persistence_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_deletion_and_keeps_value() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("k", "value").unwrap();

        scheduler.schedule_deletion_after_ms("k", 100);
        sleep(Duration::from_millis(50)).await;
        scheduler.cancel_scheduled_deletion("k");

        assert!(!scheduler.is_armed("k"));
        assert_eq!(store.get(&meta("k")).unwrap(), None);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(store.get("k").unwrap(), Some("value".to_string()));
        assert_eq!(scheduler.stats().deletions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_previous() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("k", "value").unwrap();

        scheduler.schedule_deletion_after_ms("k", 100);
        scheduler.schedule_deletion_after_ms("k", 500);

        assert_eq!(scheduler.armed_count(), 1);
        assert_eq!(scheduler.expires_at("k"), Some(EPOCH + 500));
        assert_eq!(scheduler.pending(), vec![("k".to_string(), EPOCH + 500)]);

        sleep(Duration::from_millis(200)).await;
        assert!(store.get("k").unwrap().is_some());

        sleep(Duration::from_millis(301)).await;
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(scheduler.stats().deletions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_delay_is_chunked_without_drift() {
        let config = SchedulerConfig::default().with_max_timeout(Duration::from_millis(100));
        let (store, clock, scheduler) = setup(config);
        store.set("k", "value").unwrap();

        scheduler.schedule_deletion_after_ms("k", 250);

        sleep(Duration::from_millis(249)).await;
        assert!(store.get("k").unwrap().is_some());
        // Chunks armed at 0, 100 and 200
        assert_eq!(scheduler.stats().chunks_armed, 3);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(scheduler.stats().deletions, 1);
        assert!(clock.now_ms() >= EPOCH + 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_expiry_tracks_absolute_deadline() {
        let config = SchedulerConfig::default().with_max_timeout(Duration::from_millis(100));
        let (store, _clock, scheduler) = setup(config);
        store.set("k", "value").unwrap();
        assert_eq!(scheduler.armed_expiry("k"), None);

        scheduler.schedule_deletion_after_ms("k", 250);
        assert_eq!(scheduler.armed_expiry("k"), Some(EPOCH + 250));

        // Re-armed chunks keep the original deadline
        sleep(Duration::from_millis(150)).await;
        assert_eq!(scheduler.armed_expiry("k"), Some(EPOCH + 250));

        scheduler.cancel_scheduled_deletion("k");
        assert_eq!(scheduler.armed_expiry("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_max_timeout_chunks_thirty_days() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("formSubmissionData", "{}").unwrap();

        assert!(scheduler.schedule_default_deletion("formSubmissionData"));

        sleep(DAY * 29).await;
        assert!(store.get("formSubmissionData").unwrap().is_some());

        sleep(DAY * 2).await;
        assert_eq!(store.get("formSubmissionData").unwrap(), None);
        // 30 days is longer than one 2^31 - 1 ms timer
        assert_eq!(scheduler.stats().chunks_armed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_then_cancel_round_trip() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());

        assert!(scheduler.schedule_deletion_after_days("k", 30.0));
        scheduler.cancel_scheduled_deletion("k");

        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(store.get(&meta("k")).unwrap(), None);
        assert!(store.is_empty().unwrap());

        sleep(DAY * 31).await;
        assert_eq!(scheduler.stats().deletions, 0);
        assert_eq!(scheduler.stats().chunks_armed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_resumes_pending_deletion() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(TokioClock::starting_at(EPOCH));
        store.set("k", "value").unwrap();

        let first = DeletionScheduler::with_clock(store.clone(), SchedulerConfig::default(), clock.clone());
        first.schedule_deletion_after_ms("k", 10);
        // Simulated restart: every in-memory timer is lost
        drop(first);

        let second = DeletionScheduler::with_clock(store.clone(), SchedulerConfig::default(), clock.clone());
        assert!(!second.is_armed("k"));
        second.restore_scheduled_deletions();
        assert!(second.is_armed("k"));
        assert_eq!(second.expires_at("k"), Some(EPOCH + 10));
        assert_eq!(second.armed_expiry("k"), Some(EPOCH + 10));

        sleep(Duration::from_millis(11)).await;
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(store.get(&meta("k")).unwrap(), None);
        assert_eq!(second.stats().restored, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_scheduler_does_not_delete() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("k", "value").unwrap();

        scheduler.schedule_deletion_after_ms("k", 10);
        drop(scheduler);

        sleep(Duration::from_millis(50)).await;
        assert!(store.get("k").unwrap().is_some());
        assert!(store.get(&meta("k")).unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_deletes_expired_records_synchronously() {
        let (store, clock, scheduler) = setup(SchedulerConfig::default());
        store.set("k", "value").unwrap();
        store
            .set(&meta("k"), &ExpiryRecord::new(clock.now_ms() - 1_000).encode().unwrap())
            .unwrap();

        scheduler.restore_scheduled_deletions();

        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(store.get(&meta("k")).unwrap(), None);
        assert_eq!(scheduler.armed_count(), 0);
        assert_eq!(scheduler.stats().deletions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_drops_corrupt_records() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("bad", "value").unwrap();
        store.set(&meta("bad"), "{not json").unwrap();
        store.set(&meta("nothing"), "{}").unwrap();
        store
            .set(&meta("good"), &ExpiryRecord::new(EPOCH + 60_000).encode().unwrap())
            .unwrap();

        scheduler.restore_scheduled_deletions();

        assert_eq!(store.get(&meta("bad")).unwrap(), None);
        assert_eq!(store.get(&meta("nothing")).unwrap(), None);
        // Dropping a bad record never touches the managed value
        assert_eq!(store.get("bad").unwrap(), Some("value".to_string()));
        assert!(scheduler.is_armed("good"));

        let stats = scheduler.stats();
        assert_eq!(stats.corrupt_records, 2);
        assert_eq!(stats.restored, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_twice_does_not_duplicate() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("k", "value").unwrap();
        store
            .set(&meta("k"), &ExpiryRecord::new(EPOCH + 100).encode().unwrap())
            .unwrap();
        store.set("unrelated", "stays").unwrap();

        scheduler.restore_scheduled_deletions();
        scheduler.restore_scheduled_deletions();
        assert_eq!(scheduler.armed_count(), 1);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(store.get("unrelated").unwrap(), Some("stays".to_string()));
        assert_eq!(scheduler.stats().deletions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_handles_many_records() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        for i in 0..20 {
            store.set(&format!("k{i}"), "v").unwrap();
            // Half are already expired, half are pending
            let expires_at = if i % 2 == 0 { EPOCH - 1 } else { EPOCH + 1_000 };
            store
                .set(&meta(&format!("k{i}")), &ExpiryRecord::new(expires_at).encode().unwrap())
                .unwrap();
        }

        scheduler.restore_scheduled_deletions();

        assert_eq!(scheduler.stats().deletions, 10);
        assert_eq!(scheduler.armed_count(), 10);
        assert_eq!(scheduler.pending().len(), 10);

        sleep(Duration::from_millis(1_001)).await;
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failures_do_not_stop_eviction_bookkeeping() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("k", "value").unwrap();
        store.set_read_only(true);

        scheduler.schedule_deletion_after_ms("k", 10);
        // Record could not be saved, but the timer is still armed
        assert!(scheduler.is_armed("k"));
        assert_eq!(scheduler.stats().persistence_failures, 1);

        sleep(Duration::from_millis(11)).await;
        // Removal failed, yet the timer is gone
        assert!(!scheduler.is_armed("k"));
        assert_eq!(store.get("k").unwrap(), Some("value".to_string()));

        let stats = scheduler.stats();
        assert_eq!(stats.deletions, 1);
        // save, remove key, remove record
        assert_eq!(stats.persistence_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_exceeded_still_arms_timer() {
        let store = Arc::new(MemoryStore::with_quota(8));
        let clock = Arc::new(TokioClock::starting_at(EPOCH));
        let scheduler = DeletionScheduler::with_clock(store.clone(), SchedulerConfig::default(), clock);
        store.set("k", "v").unwrap();

        scheduler.schedule_deletion_after_ms("k", 10);
        assert_eq!(scheduler.stats().persistence_failures, 1);
        assert_eq!(scheduler.expires_at("k"), None);

        sleep(Duration::from_millis(11)).await;
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_scheduler_is_noop() {
        let scheduler = DeletionScheduler::unavailable(SchedulerConfig::default());

        scheduler.schedule_deletion_after_ms("k", 10);
        assert!(scheduler.schedule_deletion_after_days("k", 1.0));
        scheduler.cancel_scheduled_deletion("k");
        scheduler.restore_scheduled_deletions();

        assert_eq!(scheduler.armed_count(), 0);
        assert_eq!(scheduler.expires_at("k"), None);
        assert!(scheduler.pending().is_empty());

        let stats = scheduler.stats();
        assert_eq!(stats.unavailable, 1);
        assert_eq!(stats.scheduled, 0);
    }

    #[test]
    fn test_without_runtime_record_is_kept_for_restore() {
        let store = Arc::new(MemoryStore::new());
        store.set("k", "value").unwrap();
        let scheduler = DeletionScheduler::new(store.clone(), SchedulerConfig::default());

        scheduler.schedule_deletion_after_days("k", 1.0);

        assert!(!scheduler.is_armed("k"));
        assert!(scheduler.expires_at("k").is_some());
        assert_eq!(scheduler.stats().unavailable, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_key_is_ignored() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("", "value").unwrap();

        scheduler.schedule_deletion_after_ms("", 0);
        scheduler.cancel_scheduled_deletion("");

        assert_eq!(store.get("").unwrap(), Some("value".to_string()));
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(scheduler.stats().scheduled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_keeps_records() {
        let (store, _clock, scheduler) = setup(SchedulerConfig::default());
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        scheduler.schedule_deletion_after("a", Duration::from_millis(10));
        scheduler.schedule_deletion_after("b", Duration::from_millis(10));
        scheduler.shutdown();
        assert_eq!(scheduler.armed_count(), 0);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(store.len().unwrap(), 4);

        // Picking the records back up deletes both at once
        scheduler.restore_scheduled_deletions();
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_prefix() {
        let config = SchedulerConfig::default().with_meta_prefix("ttl/");
        let (store, _clock, scheduler) = setup(config);
        store.set("k", "value").unwrap();
        store.set(&meta("other"), "{oops").unwrap();

        scheduler.schedule_deletion_after_ms("k", 10);
        assert!(store.get("ttl/k").unwrap().is_some());

        scheduler.restore_scheduled_deletions();
        // Records under a different prefix are not ours
        assert!(store.get(&meta("other")).unwrap().is_some());
        assert_eq!(scheduler.stats().corrupt_records, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let clock = Arc::new(TokioClock::starting_at(EPOCH));

        {
            let store = Arc::new(FileStore::open(&path).unwrap());
            store.set("formSubmissionData", "{\"name\":\"Ariz\"}").unwrap();
            let scheduler = DeletionScheduler::with_clock(store, SchedulerConfig::default(), clock.clone());
            scheduler.schedule_deletion_after("formSubmissionData", Duration::from_secs(5));
        }

        sleep(Duration::from_secs(2)).await;

        let store = Arc::new(FileStore::open(&path).unwrap());
        assert!(store.get("formSubmissionData").unwrap().is_some());
        let scheduler = DeletionScheduler::with_clock(store, SchedulerConfig::default(), clock);
        scheduler.restore_scheduled_deletions();
        assert_eq!(scheduler.expires_at("formSubmissionData"), Some(EPOCH + 5_000));

        sleep(Duration::from_secs(4)).await;

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.is_empty().unwrap());
    }
}
