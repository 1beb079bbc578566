use std::sync::{Arc, RwLock};

use tracing::{debug, info};
use vigil_core::SchedulerConfig;

use crate::arena::{TimerArena, TimerId};
use crate::clock::{Clock, Timestamp};
use crate::error::TimerError;
use crate::metrics::RegistryMetrics;
use crate::timer::Timer;

/// The timer registry.
///
/// Owns the arena timers live in while their owners hold [`TimerId`]
/// handles, plus the unordered list of handles for started timers. The list
/// never keeps a timer alive: [`destroy`](Self::destroy) works whether or not
/// the timer is started, and any handle left behind is purged by the next
/// sweep.
///
/// Single-threaded by contract. All calls are expected from the event loop
/// thread; the type is `Send` so it can be moved onto that thread.
pub struct TimerRegistry {
    pub(super) clock: Arc<dyn Clock>,
    pub(super) heartbeat_ceiling: i64,
    pub(super) arena: TimerArena,
    /// Handles of started timers. May contain dead handles until the next sweep.
    pub(super) timers: Vec<TimerId>,
    /// Cached earliest wake time.
    pub(super) next_call: Timestamp,
    pub(super) metrics: Arc<RwLock<RegistryMetrics>>,
}

impl TimerRegistry {
    /// Create an empty registry whose cached wake time is one heartbeat away.
    pub fn new(config: &SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        let heartbeat_ceiling = config.heartbeat_ceiling();
        let next_call = clock.now().saturating_add(heartbeat_ceiling);
        Self {
            clock,
            heartbeat_ceiling,
            arena: TimerArena::default(),
            timers: Vec::new(),
            next_call,
            metrics: Arc::new(RwLock::new(RegistryMetrics::default())),
        }
    }

    /// Create a registry with the default 30 second heartbeat ceiling.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::new(&SchedulerConfig::default(), clock)
    }

    /// Take ownership of a configured timer and return its handle.
    /// The timer is not started.
    pub fn insert(&mut self, mut timer: Timer) -> TimerId {
        timer.set_registered(false);
        let id = self.arena.insert(timer);
        debug!(id = %id, "timer inserted");
        id
    }

    /// Hand a timer back to its owner. Any registry entry for it goes dead
    /// and is purged by the next sweep. Returns `None` for unknown handles.
    pub fn destroy(&mut self, id: TimerId) -> Option<Timer> {
        let mut timer = self.arena.remove(id)?;
        timer.set_registered(false);
        debug!(timer = %timer.label(), id = %id, "timer destroyed");
        Some(timer)
    }

    /// Register a timer and arm it to fire one interval from now.
    ///
    /// Idempotent: starting an already started timer re-arms its due time
    /// but never adds a second registry entry.
    pub fn start(&mut self, id: TimerId) -> Result<(), TimerError> {
        let now = self.clock.now();
        let timer = self.arena.get_mut(id).ok_or(TimerError::UnknownTimer(id))?;

        let next = now.saturating_add(timer.interval());
        timer.reschedule(next);

        if timer.is_started() {
            debug!(timer = %timer.label(), id = %id, next_fire = next, "timer re-armed");
        } else {
            timer.set_registered(true);
            debug!(timer = %timer.label(), id = %id, next_fire = next, "timer started");
            self.timers.push(id);
            self.sync_registered_metric();
        }

        self.recompute_next_wake();
        Ok(())
    }

    /// Remove every registry entry for `id`. A no-op for timers that are not
    /// started, already destroyed, or unknown.
    pub fn stop(&mut self, id: TimerId) {
        let before = self.timers.len();
        self.timers.retain(|t| *t != id);

        if let Some(timer) = self.arena.get_mut(id) {
            timer.set_registered(false);
        }

        if self.timers.len() != before {
            debug!(id = %id, "timer stopped");
            self.sync_registered_metric();
        }
    }

    /// Drop every registry entry and reset the wake cache. Timers stay in
    /// the arena for their owners.
    pub fn clear(&mut self) {
        let count = self.timers.len();
        for id in std::mem::take(&mut self.timers) {
            if let Some(timer) = self.arena.get_mut(id) {
                timer.set_registered(false);
            }
        }
        self.next_call = self.clock.now().saturating_add(self.heartbeat_ceiling);
        self.sync_registered_metric();
        info!(entries = count, "timer registry cleared");
    }

    /// Convenience for `timer_mut(id)?.set_interval(secs)`.
    pub fn set_interval(&mut self, id: TimerId, secs: i64) -> Result<(), TimerError> {
        self.arena
            .get_mut(id)
            .ok_or(TimerError::UnknownTimer(id))?
            .set_interval(secs)
    }

    pub fn timer(&self, id: TimerId) -> Option<&Timer> {
        self.arena.get(id)
    }

    pub fn timer_mut(&mut self, id: TimerId) -> Option<&mut Timer> {
        self.arena.get_mut(id)
    }

    /// Whether `id` still refers to a timer in the arena.
    pub fn contains(&self, id: TimerId) -> bool {
        self.arena.contains(id)
    }

    /// Whether the registry holds an entry for `id`. Stays true for a
    /// destroyed timer until the next sweep purges its handle.
    pub fn is_registered(&self, id: TimerId) -> bool {
        self.timers.contains(&id)
    }

    /// Due time of a live timer.
    pub fn next_fire(&self, id: TimerId) -> Option<Timestamp> {
        self.arena.get(id).map(Timer::next_fire)
    }

    /// Registry entries, including dead handles not yet purged.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Timers stored in the arena, started or not.
    pub fn timer_count(&self) -> usize {
        self.arena.len()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn heartbeat_ceiling(&self) -> i64 {
        self.heartbeat_ceiling
    }

    /// Get a snapshot of the current registry metrics.
    pub fn metrics(&self) -> RegistryMetrics {
        self.metrics
            .read()
            .map(|m| m.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Get an Arc to the metrics (for reads from timer callbacks or other threads).
    pub fn metrics_handle(&self) -> Arc<RwLock<RegistryMetrics>> {
        Arc::clone(&self.metrics)
    }

    pub(super) fn sync_registered_metric(&self) {
        if let Ok(mut m) = self.metrics.write() {
            m.registered = self.timers.len();
        }
    }
}
