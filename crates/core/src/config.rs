use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::VigilError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub scheduler: SchedulerConfig,
    pub daemon: DaemonConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `VIGIL_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("VIGIL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            scheduler: SchedulerConfig::from_env_profiled(p),
            daemon: DaemonConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject values that would stall or spin the event loop.
    pub fn validate(&self) -> Result<(), VigilError> {
        self.scheduler.validate()?;
        if self.daemon.stats_interval_secs == 0 {
            return Err(VigilError::Config(
                "DAEMON_STATS_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  scheduler:   heartbeat_ceiling={}s, poll_interval={}ms",
            self.scheduler.heartbeat_ceiling_secs,
            self.scheduler.poll_interval_ms
        );
        tracing::info!(
            "  daemon:      stats_interval={}s, log_filter={}",
            self.daemon.stats_interval_secs,
            self.daemon.log_filter
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            scheduler: SchedulerConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

/// Timer registry and event loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Longest the event loop sleeps when no timer is due sooner.
    #[serde(default = "default_heartbeat_ceiling")]
    pub heartbeat_ceiling_secs: u64,
    /// Sleep slice used while waiting, so shutdown is noticed promptly.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_heartbeat_ceiling() -> u64 { 30 }
fn default_poll_interval() -> u64 { 250 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_ceiling_secs: default_heartbeat_ceiling(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            heartbeat_ceiling_secs: profiled_env_u64(
                p,
                "SCHEDULER_HEARTBEAT_SECS",
                default_heartbeat_ceiling(),
            ),
            poll_interval_ms: profiled_env_u64(
                p,
                "SCHEDULER_POLL_INTERVAL_MS",
                default_poll_interval(),
            ),
        }
    }

    /// Heartbeat ceiling in whole seconds, as used by timestamp arithmetic.
    pub fn heartbeat_ceiling(&self) -> i64 {
        i64::try_from(self.heartbeat_ceiling_secs).unwrap_or(i64::MAX)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), VigilError> {
        if self.heartbeat_ceiling_secs == 0 {
            return Err(VigilError::Config(
                "SCHEDULER_HEARTBEAT_SECS must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(VigilError::Config(
                "SCHEDULER_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Daemon ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// How often the built-in stats reporter logs registry metrics.
    pub stats_interval_secs: u64,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: 60,
            log_filter: "info".to_string(),
        }
    }
}

impl DaemonConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            stats_interval_secs: profiled_env_u64(p, "DAEMON_STATS_INTERVAL_SECS", 60),
            log_filter: profiled_env_or(p, "DAEMON_LOG_FILTER", "info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.heartbeat_ceiling_secs, 30);
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.heartbeat_ceiling(), 30);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.profile_label(), "default");
    }

    #[test]
    fn zero_heartbeat_is_rejected() {
        let mut config = Config::default();
        config.scheduler.heartbeat_ceiling_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SCHEDULER_HEARTBEAT_SECS"));
    }

    #[test]
    fn zero_stats_interval_is_rejected() {
        let mut config = Config::default();
        config.daemon.stats_interval_secs = 0;
        assert!(matches!(config.validate(), Err(VigilError::Config(_))));
    }

    #[test]
    fn profiled_key_overrides_plain_key() {
        // Unique profile name so parallel tests never observe these vars.
        env::set_var("VIGILCFGTEST_SCHEDULER_HEARTBEAT_SECS", "45");
        env::set_var("VIGILCFGTEST_DAEMON_LOG_FILTER", "debug");

        let config = Config::for_profile("vigilcfgtest");
        assert_eq!(config.profile, "VIGILCFGTEST");
        assert_eq!(config.scheduler.heartbeat_ceiling_secs, 45);
        assert_eq!(config.daemon.log_filter, "debug");

        env::remove_var("VIGILCFGTEST_SCHEDULER_HEARTBEAT_SECS");
        env::remove_var("VIGILCFGTEST_DAEMON_LOG_FILTER");
    }

    #[test]
    fn unparseable_value_falls_back_to_default() {
        env::set_var("VIGILBADTEST_SCHEDULER_POLL_INTERVAL_MS", "soon");
        let config = Config::for_profile("VIGILBADTEST");
        assert_eq!(config.scheduler.poll_interval_ms, 250);
        env::remove_var("VIGILBADTEST_SCHEDULER_POLL_INTERVAL_MS");
    }
}
