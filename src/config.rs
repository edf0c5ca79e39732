//! Scheduler Configuration

use std::time::Duration;

/// Reserved key prefix under which expiry records are stored.
pub const DEFAULT_META_PREFIX: &str = "__ls_delete__:";

/// Longest delay a single timer is armed for: the largest 32-bit signed
/// millisecond count (about 24.8 days).
pub const MAX_TIMEOUT: Duration = Duration::from_millis(2_147_483_647);

/// Retention used by `schedule_default_deletion`.
pub const DEFAULT_RETENTION_DAYS: f64 = 30.0;

/// Configuration for the deletion scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Prefix prepended to a managed key to form its expiry record key
    pub meta_prefix: String,

    /// Longest single timer chunk (default: 2^31 - 1 ms)
    pub max_timeout: Duration,

    /// Retention in days for `schedule_default_deletion` (default: 30)
    pub default_retention_days: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            meta_prefix: DEFAULT_META_PREFIX.to_string(),
            max_timeout: MAX_TIMEOUT,
            default_retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl SchedulerConfig {
    pub fn with_meta_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.meta_prefix = prefix.into();
        self
    }

    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    pub fn with_default_retention_days(mut self, days: f64) -> Self {
        self.default_retention_days = days;
        self
    }

    /// Longest chunk in whole milliseconds, never less than 1.
    pub(crate) fn max_chunk_ms(&self) -> i64 {
        (self.max_timeout.as_millis().min(i64::MAX as u128) as i64).max(1)
    }
}
