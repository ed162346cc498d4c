/*!
 * Bus Configuration
 *
 * Runtime configuration for the background tasks, read from code or the
 * environment
 */

use super::limits::{
    BUS_DRAIN_INTERVAL, BUS_DRAIN_INTERVAL_MIN, ENV_PROFILE_INTERVAL, ENV_PROFILE_RETENTION,
    PERF_SAMPLE_CAPACITY,
};
use std::time::Duration;
use tracing::warn;

/// Drain interval override in milliseconds
pub const DRAIN_INTERVAL_ENV: &str = "CONTEXT_BUS_DRAIN_INTERVAL_MS";
/// Profiler interval override in milliseconds
pub const PROFILE_INTERVAL_ENV: &str = "CONTEXT_BUS_PROFILE_INTERVAL_MS";
/// Enables the bus self-latency recorder when `1`/`true`
pub const PERF_METRIC_ENV: &str = "CB_PERF_METRIC";

/// Bus and background task configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Fallback drain period of the dispatch loop
    pub drain_interval: Duration,
    /// Period of the environment profiler
    pub profile_interval: Duration,
    /// Past profiles kept addressable by timestamp
    pub profile_retention: usize,
    /// Record enqueue/dequeue/finish latencies of the bus itself
    pub perf_metrics: bool,
    /// Samples kept by the latency recorder
    pub perf_capacity: usize,
    /// Spawn the dispatch loop on start
    pub observation_bus: bool,
    /// Spawn the environment profiler on start
    pub environment_profiler: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            drain_interval: BUS_DRAIN_INTERVAL,
            profile_interval: ENV_PROFILE_INTERVAL,
            profile_retention: ENV_PROFILE_RETENTION,
            perf_metrics: false,
            perf_capacity: PERF_SAMPLE_CAPACITY,
            observation_bus: true,
            environment_profiler: true,
        }
    }
}

impl BusConfig {
    /// Bus loop only; no host profiling
    pub const fn bus_only() -> Self {
        Self {
            drain_interval: BUS_DRAIN_INTERVAL,
            profile_interval: ENV_PROFILE_INTERVAL,
            profile_retention: ENV_PROFILE_RETENTION,
            perf_metrics: false,
            perf_capacity: PERF_SAMPLE_CAPACITY,
            observation_bus: true,
            environment_profiler: false,
        }
    }

    /// Defaults overridden by the environment
    ///
    /// Environment variables:
    /// - CONTEXT_BUS_DRAIN_INTERVAL_MS
    /// - CONTEXT_BUS_PROFILE_INTERVAL_MS
    /// - CB_PERF_METRIC (`1`/`true`)
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str| {
            let value = lookup(key)?;
            match value.trim().parse::<u64>() {
                Ok(ms) => Some(Duration::from_millis(ms)),
                Err(e) => {
                    warn!(key, value = %value, error = %e, "Ignoring unparsable interval override");
                    None
                }
            }
        };

        if let Some(interval) = millis(DRAIN_INTERVAL_ENV) {
            self = self.with_drain_interval(interval);
        }
        if let Some(interval) = millis(PROFILE_INTERVAL_ENV) {
            self.profile_interval = interval.max(BUS_DRAIN_INTERVAL_MIN);
        }
        if let Some(flag) = lookup(PERF_METRIC_ENV) {
            self.perf_metrics = flag == "1" || flag.eq_ignore_ascii_case("true");
        }
        self
    }

    /// Clamped to [`BUS_DRAIN_INTERVAL_MIN`]
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval.max(BUS_DRAIN_INTERVAL_MIN);
        self
    }

    pub fn with_profile_interval(mut self, interval: Duration) -> Self {
        self.profile_interval = interval.max(BUS_DRAIN_INTERVAL_MIN);
        self
    }

    pub fn with_profile_retention(mut self, retention: usize) -> Self {
        self.profile_retention = retention.max(1);
        self
    }

    pub fn with_perf_metrics(mut self, capacity: usize) -> Self {
        self.perf_metrics = true;
        self.perf_capacity = capacity.max(1);
        self
    }

    pub fn with_observation_bus(mut self, enabled: bool) -> Self {
        self.observation_bus = enabled;
        self
    }

    pub fn with_environment_profiler(mut self, enabled: bool) -> Self {
        self.environment_profiler = enabled;
        self
    }
}
