use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::arena::TimerId;
use crate::clock::Timestamp;
use crate::error::TimerError;
use crate::timer::{FireContext, TimerEvent};

use super::TimerRegistry;

/// What one expiry sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Timers fired.
    pub fired: usize,
    /// Dead handles removed.
    pub purged: usize,
    /// Subscriber callbacks that returned an error.
    pub callback_failures: usize,
    /// Stops of other timers requested from callbacks, applied after the pass.
    pub deferred_stops: usize,
}

/// Result of dispatching one timer.
struct Dispatch {
    failures: usize,
    stop_self: bool,
    deferred_stops: Vec<TimerId>,
}

impl TimerRegistry {
    /// Fire every started timer due at or before `now`, purging dead handles
    /// on the way.
    ///
    /// Each entry is visited once, however overdue, so a timer fires at most
    /// once per sweep. A fired timer is re-armed to `now + interval` (the
    /// interval as it stands after its callbacks ran) and the wake cache is
    /// recomputed. Stops of other timers requested by callbacks are applied
    /// after the pass, so a timer stopped that way still fires in this sweep
    /// if it is due.
    pub fn run_expiry_sweep(&mut self, now: Timestamp) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport::default();
        let mut deferred: Vec<TimerId> = Vec::new();

        let mut i = 0;
        while i < self.timers.len() {
            let id = self.timers[i];

            let due = match self.arena.get(id) {
                Some(timer) => timer.next_fire() <= now,
                None => {
                    // Dead handle: its owner destroyed the timer without stopping it.
                    // The swapped-in entry has not been visited yet.
                    self.timers.swap_remove(i);
                    report.purged += 1;
                    debug!(id = %id, "purged dead timer handle");
                    continue;
                }
            };

            if !due {
                i += 1;
                continue;
            }

            let Some(dispatch) = self.dispatch(id, now) else {
                i += 1;
                continue;
            };
            report.fired += 1;
            report.callback_failures += dispatch.failures;
            for other in dispatch.deferred_stops {
                if !deferred.contains(&other) {
                    deferred.push(other);
                }
            }

            if let Some(timer) = self.arena.get_mut(id) {
                let next = now.saturating_add(timer.interval());
                timer.reschedule(next);
                if dispatch.stop_self {
                    timer.set_registered(false);
                }
            }

            if dispatch.stop_self {
                self.timers.swap_remove(i);
                debug!(id = %id, "timer stopped itself");
            } else {
                i += 1;
            }

            self.recompute_next_wake();
        }

        report.deferred_stops = deferred.len();
        for id in deferred {
            debug!(id = %id, "applying deferred stop");
            self.stop(id);
        }

        if report.purged > 0 || report.deferred_stops > 0 {
            // Removed entries may have held the cached minimum.
            self.recompute_next_wake();
        }

        self.sync_registered_metric();
        if let Ok(mut m) = self.metrics.write() {
            m.record_sweep(now, &report, started.elapsed());
        }

        if report.fired > 0 || report.purged > 0 {
            debug!(
                fired = report.fired,
                purged = report.purged,
                failures = report.callback_failures,
                "expiry sweep complete"
            );
        }

        report
    }

    /// Invoke a timer's subscribers now, outside any sweep. Does not
    /// reschedule. A stop the callbacks request is applied before returning.
    pub fn fire(&mut self, id: TimerId) -> Result<(), TimerError> {
        let now = self.clock.now();
        let dispatch = self.dispatch(id, now).ok_or(TimerError::UnknownTimer(id))?;

        if dispatch.stop_self {
            self.stop(id);
        }
        for other in dispatch.deferred_stops {
            self.stop(other);
        }
        Ok(())
    }

    fn dispatch(&mut self, id: TimerId, now: Timestamp) -> Option<Dispatch> {
        let timer = self.arena.get_mut(id)?;

        let event = TimerEvent {
            source: id,
            user_args: timer.user_args().clone(),
            fired_at: now,
        };
        let mut ctx = FireContext::new(id, now);
        let failures = timer.fire(&event, &mut ctx);

        debug!(timer = %timer.label(), id = %id, failures, "timer fired");
        if let Ok(mut m) = self.metrics.write() {
            m.record_fire(timer.label(), failures);
        }

        Some(Dispatch {
            failures,
            stop_self: ctx.stop_requested(),
            deferred_stops: ctx.take_deferred_stops(),
        })
    }
}
