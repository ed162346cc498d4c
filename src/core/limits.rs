/*!
 * Limits and Constants
 *
 * Centralized location for intervals, capacities and defaults used by the bus,
 * the profiler and the renderers.
 *
 * - Performance-critical constants are marked with [PERF]
 */

use std::time::Duration;

// =============================================================================
// OBSERVATION BUS
// =============================================================================

/// Fallback drain interval of the bus loop (10ms)
/// Backstop for dropped doorbell notifications
pub const BUS_DRAIN_INTERVAL: Duration = Duration::from_millis(10);

/// Lower bound accepted for a configured drain interval
/// [PERF] Anything tighter turns the loop into a busy poll
pub const BUS_DRAIN_INTERVAL_MIN: Duration = Duration::from_millis(1);

/// Doorbell capacity; a pending notification coalesces later ones
pub const DOORBELL_CAPACITY: usize = 1;

/// Default number of latency samples kept by the perf recorder
pub const PERF_SAMPLE_CAPACITY: usize = 8192;

// =============================================================================
// ENVIRONMENT PROFILER
// =============================================================================

/// Interval between two environment profiles (10s)
pub const ENV_PROFILE_INTERVAL: Duration = Duration::from_secs(10);

/// Number of past profiles addressable by timestamp
pub const ENV_PROFILE_RETENTION: usize = 64;

// =============================================================================
// RENDERING
// =============================================================================

/// Histogram buckets for chain latencies, in milliseconds
pub const LATENCY_BUCKETS_MS: [f64; 10] =
    [1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0];

/// Caller reported by log lines when no call site is given
pub const UNKNOWN_CALLER: &str = "unknown";
