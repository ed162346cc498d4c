/*!
 * Monitoring
 * Structured logging setup and the in-process metric store
 */

mod metrics;
mod tracer;

pub use metrics::{series_key, HistogramStats, Labels, MetricsCollector, MetricsSnapshot};
pub use tracer::{init_tracing, TRACE_JSON_ENV};
