//! Blocking driver for a [`TimerRegistry`].
//!
//! Repeats `next_wake` → sleep until then → `run_expiry_sweep(now)` until
//! shutdown is signalled. Sleeps are sliced by the configured poll interval
//! so a shutdown request is noticed promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};
use vigil_core::SchedulerConfig;

use crate::clock::Timestamp;
use crate::registry::{SweepReport, TimerRegistry};

/// Outcome of a single [`EventLoop::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing due yet; the loop should sleep until `wake_at`.
    Idle { wake_at: Timestamp },
    /// A sweep ran.
    Swept(SweepReport),
}

/// Drives a registry from a single thread.
pub struct EventLoop {
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl EventLoop {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal the loop to stop after the current step.
    pub fn shutdown(&self) {
        info!("Event loop shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Get an Arc to the shutdown flag (for signalling from another thread).
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// One step without sleeping: sweep if the registry's wake time has
    /// arrived, otherwise report when it will.
    pub fn tick(&self, registry: &mut TimerRegistry) -> Tick {
        let wake_at = registry.next_wake();
        let now = registry.now();
        if wake_at > now {
            return Tick::Idle { wake_at };
        }
        Tick::Swept(registry.run_expiry_sweep(now))
    }

    /// Run until shutdown is signalled. Blocks the calling thread.
    pub fn run(&self, registry: &mut TimerRegistry) {
        info!(
            "Event loop starting with {} registered timers, heartbeat {}s",
            registry.len(),
            registry.heartbeat_ceiling()
        );

        while !self.is_shutdown() {
            match self.tick(registry) {
                Tick::Idle { wake_at } => self.sleep_until(registry, wake_at),
                Tick::Swept(report) => {
                    if report.fired > 0 || report.purged > 0 {
                        debug!(
                            fired = report.fired,
                            purged = report.purged,
                            "event loop tick"
                        );
                    }
                    // Zero-interval timers are due again immediately.
                    if registry.next_wake() <= registry.now() {
                        thread::sleep(self.poll_interval);
                    }
                }
            }
        }

        info!("Event loop stopped");
    }

    fn sleep_until(&self, registry: &TimerRegistry, wake_at: Timestamp) {
        while !self.is_shutdown() && registry.now() < wake_at {
            thread::sleep(self.poll_interval);
        }
    }
}
