//! Wall-Clock Sources
//!
//! Expiry records hold absolute epoch milliseconds, so they mean the same thing
//! after a restart. Timers, on the other hand, run on tokio's monotonic clock.
//! [`Clock`] is the seam between the two.
//!
//! - [`SystemClock`] reads the system wall clock. Use it in production.
//! - [`TokioClock`] pins an epoch value to a `tokio::time::Instant` and advances
//!   with tokio time. Under a paused test runtime its reading moves exactly in
//!   step with virtual time, which makes eviction timing deterministic.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Milliseconds in one day.
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// A source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_millis() as i64,
            // Clock set before 1970
            Err(e) => -(e.duration().as_millis() as i64),
        }
    }
}

/// An epoch clock driven by tokio time.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    epoch_ms: i64,
    origin: Instant,
}

impl TokioClock {
    /// Starts at the current system time.
    pub fn new() -> Self {
        Self::starting_at(SystemClock.now_ms())
    }

    /// Starts at `epoch_ms`.
    pub fn starting_at(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        self.epoch_ms + self.origin.elapsed().as_millis() as i64
    }
}
