/*!
 * Observation Rendering
 * Turns drained events into log lines, finished spans and metric entries
 *
 * Renderers only read the event and its chain. Attribute lookups that fail
 * degrade to `!error(...)` markers instead of aborting the render.
 */

mod logging;
mod metric;
mod span;

pub use logging::LogRenderer;
pub use metric::{LogSink, MetricRenderer, MetricsSink};
pub use span::{FinishedSpan, LogTracer, SpanRenderer, Tracer};

use crate::configure::ObservationConfigure;
use crate::core::errors::PathError;
use crate::event::{EventChain, EventData, EventWhat, Path};
use crate::monitoring::MetricsCollector;
use std::ops::AddAssign;
use std::sync::Arc;

/// An event together with the chain it belongs to
#[derive(Clone, Copy)]
pub struct EventView<'a> {
    pub data: &'a EventData,
    pub chain: &'a EventChain,
}

impl<'a> EventView<'a> {
    pub fn new(data: &'a EventData, chain: &'a EventChain) -> Self {
        Self { data, chain }
    }

    pub fn what(&self) -> &'a EventWhat {
        &self.data.event.what
    }

    /// Nearest earlier chain event named `name`
    pub fn previous_named(&self, name: &str) -> Option<Arc<EventData>> {
        self.chain.find_previous(self.data, name)
    }

    /// Path value as text, or the inline error marker
    pub fn value_or_marker(&self, path: &Path) -> String {
        render_value(self.what().get_value(path).map(|v| v.to_string()))
    }
}

#[inline]
pub(crate) fn render_value(value: Result<String, PathError>) -> String {
    value.unwrap_or_else(|e| format!("!error({e})"))
}

/// Renderer contract: emit what the rule asks for, return the entry count
pub trait Renderer {
    fn render(&self, view: &EventView<'_>) -> usize;
}

/// Entries emitted for one or more events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservationCounts {
    pub logs: usize,
    pub spans: usize,
    pub metrics: usize,
}

impl ObservationCounts {
    /// Renderer kinds that fired
    pub const LOGGING: u8 = 1;
    pub const TRACING: u8 = 2;
    pub const METRICS: u8 = 4;

    pub fn total(&self) -> usize {
        self.logs + self.spans + self.metrics
    }

    /// Bitmask of [`LOGGING`](Self::LOGGING), [`TRACING`](Self::TRACING) and
    /// [`METRICS`](Self::METRICS)
    pub fn kinds(&self) -> u8 {
        let mut kinds = 0;
        if self.logs > 0 {
            kinds |= Self::LOGGING;
        }
        if self.spans > 0 {
            kinds |= Self::TRACING;
        }
        if self.metrics > 0 {
            kinds |= Self::METRICS;
        }
        kinds
    }
}

impl AddAssign for ObservationCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.logs += rhs.logs;
        self.spans += rhs.spans;
        self.metrics += rhs.metrics;
    }
}

/// Run every renderer `rule` declares against `view`
pub fn observe(
    rule: &ObservationConfigure,
    view: &EventView<'_>,
    tracer: &dyn Tracer,
    metrics: &MetricsCollector,
) -> ObservationCounts {
    let logs = rule
        .logging
        .as_ref()
        .map_or(0, |logging| LogRenderer::new(logging).render(view));
    let spans = rule
        .tracing
        .as_ref()
        .map_or(0, |tracing| SpanRenderer::new(tracing, tracer).render(view));
    let metrics = rule
        .metrics
        .iter()
        .map(|m| MetricRenderer::new(m, metrics).render(view))
        .sum();

    ObservationCounts {
        logs,
        spans,
        metrics,
    }
}
