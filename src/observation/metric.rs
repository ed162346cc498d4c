/*!
 * Metric Renderer
 * Counter, gauge and latency entries in the in-process collector
 */

use super::{EventView, Renderer};
use crate::configure::{MetricKind, MetricsRule};
use crate::monitoring::{Labels, MetricsCollector, MetricsSnapshot};
use tracing::debug;

/// Destination of flushed metric snapshots
pub trait MetricsSink: Send + Sync {
    fn push(&self, snapshot: &MetricsSnapshot);
}

/// Sink that logs a summary of every flush
#[derive(Debug, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn push(&self, snapshot: &MetricsSnapshot) {
        debug!(
            counters = snapshot.counters.len(),
            gauges = snapshot.gauges.len(),
            histograms = snapshot.histograms.len(),
            "Metrics flushed"
        );
    }
}

pub struct MetricRenderer<'r> {
    rule: &'r MetricsRule,
    metrics: &'r MetricsCollector,
}

impl<'r> MetricRenderer<'r> {
    pub fn new(rule: &'r MetricsRule, metrics: &'r MetricsCollector) -> Self {
        Self { rule, metrics }
    }

    /// Labels from the rule's attributes; unresolvable ones are left out
    fn labels(&self, view: &EventView<'_>) -> Labels {
        self.rule
            .attrs
            .iter()
            .filter_map(|attr| {
                let value = view.what().get_value(&attr.path).ok()?;
                Some((attr.name.clone(), value.to_string()))
            })
            .collect()
    }

    /// Milliseconds since the rule's reference event
    fn latency_ms(&self, view: &EventView<'_>) -> Option<f64> {
        let prev_name = self.rule.prev_name.as_deref()?;
        match view.previous_named(prev_name) {
            Some(prev) => Some(view.data.when().saturating_sub(prev.when()) as f64 / 1_000_000.0),
            None => {
                debug!(metric = %self.rule.name, prev = prev_name, "Reference event not found in chain");
                None
            }
        }
    }
}

impl Renderer for MetricRenderer<'_> {
    fn render(&self, view: &EventView<'_>) -> usize {
        let labels = self.labels(view);
        let name = &self.rule.name;

        match self.rule.kind {
            MetricKind::Counter => {
                self.metrics.inc_counter(name, &labels, 1.0);
            }
            MetricKind::Gauge => {
                let Some(value) = self
                    .rule
                    .value
                    .as_ref()
                    .and_then(|path| view.what().get_value(path).ok())
                    .and_then(|value| value.as_f64())
                else {
                    debug!(metric = %name, "Gauge value not numeric or missing");
                    return 0;
                };
                self.metrics.set_gauge(name, &labels, value);
            }
            MetricKind::Histogram | MetricKind::Summary => {
                let Some(ms) = self.latency_ms(view) else {
                    return 0;
                };
                self.metrics.observe_histogram(name, &labels, ms);
            }
        }
        1
    }
}
