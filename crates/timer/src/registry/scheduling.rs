use tracing::trace;

use crate::clock::Timestamp;
use crate::timer::Timer;

use super::TimerRegistry;

impl TimerRegistry {
    /// When the event loop should next wake.
    ///
    /// The cached value is only refreshed once it lies in the past, so the
    /// answer is never later than one heartbeat after the refresh and never
    /// later than the earliest live due time.
    pub fn next_wake(&mut self) -> Timestamp {
        if self.next_call < self.clock.now() {
            self.recompute_next_wake();
        }
        self.next_call
    }

    /// The cached wake time, without refreshing it.
    pub fn cached_next_wake(&self) -> Timestamp {
        self.next_call
    }

    /// Reset the cache to the earliest live due time, capped at one heartbeat
    /// from now. Read-only over the handle list: dead handles are skipped
    /// here and only removed by the sweep.
    pub fn recompute_next_wake(&mut self) {
        let ceiling = self.clock.now().saturating_add(self.heartbeat_ceiling);
        self.next_call = self
            .timers
            .iter()
            .filter_map(|id| self.arena.get(*id))
            .map(Timer::next_fire)
            .fold(ceiling, Timestamp::min);
        trace!(next_call = self.next_call, entries = self.timers.len(), "recomputed next wake");
    }
}
