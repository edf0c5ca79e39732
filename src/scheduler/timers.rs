//! Timer Multiplexer
//!
//! Maps each managed key to at most one live timer. A timer is a tokio task
//! that sleeps for one chunk and then runs its callback.
//!
//! Every armed timer gets a fresh id. Aborting a tokio task is not enough on
//! its own to make cancellation synchronous: on a multi-threaded runtime the
//! task may already be past its sleep. The owner therefore checks the id of a
//! firing timer against the live handle (see [`TimerMultiplexer::detach`])
//! before acting on it, and a fire whose handle was canceled or replaced is
//! ignored.
//!
//! The map lives only in memory. Dropping the multiplexer cancels every timer.

use crate::error::SchedulerError;
use std::collections::HashMap;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A live, cancelable timer for one key.
#[derive(Debug)]
pub struct TimerHandle {
    id: u64,
    expires_at: i64,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The absolute expiry this timer is working towards.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    fn cancel(self) {
        self.task.abort();
    }
}

/// In-memory mapping from key to its live [`TimerHandle`].
#[derive(Debug, Default)]
pub struct TimerMultiplexer {
    timers: HashMap<String, TimerHandle>,
    next_id: u64,
}

impl TimerMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a timer for `key` that calls `on_fire(id)` after `delay`.
    ///
    /// Any timer already armed for `key` is canceled first. Fails with
    /// `Unavailable` when called outside a tokio runtime.
    pub fn arm<F>(
        &mut self,
        key: &str,
        delay: Duration,
        expires_at: i64,
        on_fire: F,
    ) -> Result<u64, SchedulerError>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel(key);

        let runtime = Handle::try_current()
            .map_err(|e| SchedulerError::unavailable(format!("cannot arm timer: {e}")))?;

        self.next_id += 1;
        let id = self.next_id;

        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(id);
        });

        self.timers.insert(
            key.to_string(),
            TimerHandle {
                id,
                expires_at,
                task,
            },
        );
        Ok(id)
    }

    /// Cancels the timer for `key`. Returns `true` if one was live.
    pub fn cancel(&mut self, key: &str) -> bool {
        match self.timers.remove(key) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Claims the handle of a timer that is firing.
    ///
    /// Returns `true` and forgets the handle if `id` is still the live timer
    /// for `key`. Returns `false` for a stale fire, leaving the map untouched.
    pub fn detach(&mut self, key: &str, id: u64) -> bool {
        match self.timers.get(key) {
            Some(handle) if handle.id == id => {
                self.timers.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Cancels every live timer, returning how many there were.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        for (_, handle) in self.timers.drain() {
            handle.cancel();
        }
        count
    }

    pub fn get(&self, key: &str) -> Option<&TimerHandle> {
        self.timers.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.timers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for TimerMultiplexer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
