//! Wall-clock source for the scheduler.
//!
//! All scheduling arithmetic is done in whole seconds since the Unix epoch.
//! Production code uses [`SystemClock`]; tests and deterministic replay use
//! [`ManualClock`], which only moves when told to.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Absolute time in whole seconds since the Unix epoch.
pub type Timestamp = i64;

/// Source of "now" for the timer registry.
pub trait Clock: Send + Sync {
    /// Current time in whole seconds.
    fn now(&self) -> Timestamp;

    /// Name for debugging.
    fn name(&self) -> &str {
        "clock"
    }
}

/// Reads the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp()
    }

    fn name(&self) -> &str {
        "system"
    }
}

/// A clock that only advances when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward by `secs` and return the new time.
    pub fn advance(&self, secs: i64) -> Timestamp {
        self.now.fetch_add(secs, Ordering::SeqCst) + secs
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(100);
        let other = clock.clone();
        assert_eq!(clock.advance(5), 105);
        assert_eq!(other.now(), 105);
        other.set(7);
        assert_eq!(clock.now(), 7);
    }

    #[test]
    fn system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now() > 1_577_836_800);
        assert_eq!(SystemClock.name(), "system");
    }
}
