//! Integration tests for vigil-timer.
//!
//! Drive the registry through its public API with a manual clock, the way
//! the scheduler daemon drives it with the system clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::json;
use vigil_core::SchedulerConfig;
use vigil_timer::*;

fn registry_at(start: Timestamp) -> (TimerRegistry, ManualClock) {
    let clock = ManualClock::new(start);
    let registry = TimerRegistry::with_clock(Arc::new(clock.clone()));
    (registry, clock)
}

fn recording_timer(label: &str, interval: i64, log: &Arc<Mutex<Vec<(String, Timestamp)>>>) -> Timer {
    let log = Arc::clone(log);
    let name = label.to_string();
    Timer::new(label)
        .with_interval(interval)
        .unwrap()
        .on_fire(move |event, _| {
            log.lock().unwrap().push((name.clone(), event.fired_at));
            Ok(())
        })
}

// ── Scheduling ───────────────────────────────────────────────────────

#[test]
fn fast_and_slow_timer_wake_sequence() {
    let (mut registry, clock) = registry_at(0);
    let log = Arc::new(Mutex::new(Vec::new()));

    let a = registry.insert(recording_timer("a", 5, &log));
    let b = registry.insert(recording_timer("b", 100, &log));
    registry.start(a).unwrap();
    registry.start(b).unwrap();

    assert_eq!(registry.next_wake(), 5);

    clock.set(5);
    let report = registry.run_expiry_sweep(5);
    assert_eq!(report.fired, 1);
    assert_eq!(registry.next_fire(a), Some(10));
    assert_eq!(registry.next_fire(b), Some(100));
    assert_eq!(registry.next_wake(), 10);

    // No sweeps between t=10 and t=40: the stale cache is refreshed on read
    // and never skips past the true earliest due time.
    clock.set(40);
    let wake = registry.next_wake();
    assert!(wake <= 10, "wake {wake} later than A's due time");

    let report = registry.run_expiry_sweep(40);
    assert_eq!(report.fired, 1);
    assert_eq!(registry.next_fire(a), Some(45));
    assert_eq!(*log.lock().unwrap(), vec![("a".to_string(), 5), ("a".to_string(), 40)]);
}

#[test]
fn idle_registry_wakes_on_heartbeat() {
    let (mut registry, clock) = registry_at(1_000);
    assert_eq!(registry.next_wake(), 1_030);

    clock.set(1_031);
    assert_eq!(registry.next_wake(), 1_061);
    assert_eq!(registry.run_expiry_sweep(1_031), SweepReport::default());
}

#[test]
fn user_args_reach_every_subscriber() {
    let (mut registry, clock) = registry_at(0);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut timer = Timer::new("ping")
        .with_interval(10)
        .unwrap()
        .with_user_args(json!({ "host": "db-1", "port": 5432 }));
    for _ in 0..2 {
        let seen = Arc::clone(&seen);
        timer.subscribe(move |event, _| {
            seen.lock().unwrap().push(event.user_args.clone());
            Ok(())
        });
    }
    let id = registry.insert(timer);
    registry.start(id).unwrap();

    clock.set(10);
    registry.run_expiry_sweep(10);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|v| v["host"] == "db-1"));
}

// ── Lifetimes ────────────────────────────────────────────────────────

#[test]
fn destroyed_started_timer_is_purged_without_firing() {
    let (mut registry, clock) = registry_at(0);
    let log = Arc::new(Mutex::new(Vec::new()));

    let doomed = registry.insert(recording_timer("doomed", 5, &log));
    let keeper = registry.insert(recording_timer("keeper", 5, &log));
    registry.start(doomed).unwrap();
    registry.start(keeper).unwrap();

    let timer = registry.destroy(doomed).expect("timer was live");
    assert_eq!(timer.label(), "doomed");
    assert!(registry.is_registered(doomed));

    clock.set(5);
    let report = registry.run_expiry_sweep(5);
    assert_eq!(report.purged, 1);
    assert_eq!(report.fired, 1);
    assert!(!registry.is_registered(doomed));
    assert_eq!(registry.len(), 1);
    assert_eq!(*log.lock().unwrap(), vec![("keeper".to_string(), 5)]);
    assert_eq!(registry.metrics().dead_purged, 1);
}

#[test]
fn one_shot_timer_stops_itself() {
    let (mut registry, clock) = registry_at(0);
    let fired = Arc::new(AtomicBool::new(false));
    let f = Arc::clone(&fired);

    let id = registry.insert(Timer::new("once").with_interval(3).unwrap().on_fire(
        move |_, ctx| {
            f.store(true, Ordering::SeqCst);
            ctx.stop();
            Ok(())
        },
    ));
    registry.start(id).unwrap();

    clock.set(3);
    registry.run_expiry_sweep(3);
    assert!(fired.load(Ordering::SeqCst));
    assert!(registry.is_empty());
    assert!(registry.contains(id));
    assert!(!registry.timer(id).unwrap().is_started());

    // Restartable afterwards.
    registry.start(id).unwrap();
    assert_eq!(registry.next_fire(id), Some(6));
}

// ── Event loop ───────────────────────────────────────────────────────

#[test]
fn event_loop_drives_registry_until_shutdown() {
    let config = SchedulerConfig {
        heartbeat_ceiling_secs: 30,
        poll_interval_ms: 2,
    };
    let clock = ManualClock::new(0);
    let mut registry = TimerRegistry::new(&config, Arc::new(clock.clone()));
    let log = Arc::new(Mutex::new(Vec::new()));
    let id = registry.insert(recording_timer("tick", 5, &log));
    registry.start(id).unwrap();

    let event_loop = EventLoop::new(&config);
    let shutdown = event_loop.shutdown_signal();
    let driver = thread::spawn(move || {
        for t in [5, 10, 15] {
            thread::sleep(Duration::from_millis(40));
            clock.set(t);
        }
        thread::sleep(Duration::from_millis(40));
        shutdown.store(true, Ordering::Relaxed);
    });

    event_loop.run(&mut registry);
    driver.join().unwrap();

    let fired: Vec<Timestamp> = log.lock().unwrap().iter().map(|(_, t)| *t).collect();
    assert_eq!(fired, vec![5, 10, 15]);
    assert_eq!(registry.next_fire(id), Some(20));
}
