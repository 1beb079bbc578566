use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Timestamp;
use crate::registry::SweepReport;

/// Registry operational metrics, shared with reporters via
/// [`TimerRegistry::metrics_handle`](crate::registry::TimerRegistry::metrics_handle).
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryMetrics {
    /// Expiry sweeps run.
    pub sweeps: u64,
    /// Timer firings across all timers, including direct fires.
    pub total_fires: u64,
    /// Firings by timer label.
    pub fires_by_timer: HashMap<String, u64>,
    /// Dead handles removed from the registry.
    pub dead_purged: u64,
    /// Subscriber callbacks that returned an error.
    pub callback_failures: u64,
    /// Stops of other timers requested from callbacks and applied afterwards.
    pub deferred_stops: u64,
    /// Registry entries after the last mutation.
    pub registered: usize,
    /// Logical time of the last sweep.
    pub last_sweep: Option<DateTime<Utc>>,
    /// Average wall time spent in a sweep.
    pub avg_sweep_duration: Duration,
}

impl RegistryMetrics {
    /// Record one firing of the timer labelled `label`.
    pub fn record_fire(&mut self, label: &str, failures: usize) {
        self.total_fires += 1;
        *self.fires_by_timer.entry(label.to_string()).or_default() += 1;
        self.callback_failures += failures as u64;
    }

    /// Record a completed sweep.
    pub fn record_sweep(&mut self, at: Timestamp, report: &SweepReport, duration: Duration) {
        self.sweeps += 1;
        self.dead_purged += report.purged as u64;
        self.deferred_stops += report.deferred_stops as u64;
        self.last_sweep = DateTime::<Utc>::from_timestamp(at, 0);

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_sweep_duration = if self.sweeps == 1 {
            duration
        } else {
            let prev_nanos = self.avg_sweep_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / self.sweeps as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }
}
