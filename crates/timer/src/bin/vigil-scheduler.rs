//! vigil-scheduler: runs the timer registry's event loop as a daemon.
//!
//! Registers a stats-reporter timer that logs registry metrics every
//! `--stats-interval` seconds, then drives the registry until SIGINT or
//! SIGTERM.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use vigil_core::{Config, VigilError};
use vigil_timer::{EventLoop, SystemClock, Timer, TimerRegistry};

// ── CLI ─────────────────────────────────────────────────────────────

/// Vigil scheduler daemon: periodic timer event loop.
#[derive(Parser, Debug)]
#[command(name = "vigil-scheduler", version, about)]
struct Cli {
    /// Config profile (e.g. PROD). Keys are looked up as {PROFILE}_{KEY} first.
    #[arg(long, env = "VIGIL_PROFILE", default_value = "")]
    profile: String,

    /// Override the stats report interval in seconds.
    #[arg(long)]
    stats_interval: Option<u64>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vigil_core::config::load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::for_profile(&cli.profile);
    if let Some(secs) = cli.stats_interval {
        config.daemon.stats_interval_secs = secs;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.daemon.log_filter)),
        )
        .init();

    config.validate()?;
    config.log_summary();

    let mut registry = TimerRegistry::new(&config.scheduler, Arc::new(SystemClock));

    let metrics = registry.metrics_handle();
    let stats_interval = i64::try_from(config.daemon.stats_interval_secs)?;
    let stats = Timer::new("stats-reporter")
        .with_interval(stats_interval)?
        .on_fire(move |_, _| {
            let m = metrics
                .read()
                .map_err(|_| anyhow::anyhow!("registry metrics lock poisoned"))?;
            info!(
                sweeps = m.sweeps,
                fires = m.total_fires,
                registered = m.registered,
                purged = m.dead_purged,
                failures = m.callback_failures,
                avg_sweep_us = m.avg_sweep_duration.as_micros() as u64,
                "scheduler stats"
            );
            Ok(())
        });
    let stats_id = registry.insert(stats);
    registry.start(stats_id)?;

    let event_loop = EventLoop::new(&config.scheduler);
    let shutdown = event_loop.shutdown_signal();

    info!("vigil-scheduler starting");

    let mut handle = tokio::task::spawn_blocking(move || {
        event_loop.run(&mut registry);
        registry
    });

    let joined = tokio::select! {
        signal = os_signal() => {
            signal?;
            info!("shutdown signal received");
            shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
            (&mut handle).await
        }
        joined = &mut handle => {
            warn!("event loop exited without a shutdown signal");
            joined
        }
    };

    let mut registry = joined.map_err(|e| VigilError::EventLoop(e.to_string()))?;
    registry.clear();

    info!("vigil-scheduler exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
async fn os_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
