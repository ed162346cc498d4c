/*!
 * Span Renderer
 * Closes spans opened by an earlier chain event and reports them
 */

use super::{EventView, Renderer};
use crate::configure::TracingRule;
use crate::core::errors::BusError;
use crate::core::types::Nanos;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

/// Span ready for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedSpan {
    pub operation: String,
    pub trace_id_high: u64,
    pub trace_id_low: u64,
    pub span_id: u64,
    pub parent_id: u64,
    pub start: Nanos,
    pub finish: Nanos,
    /// Events that opened and closed the span
    pub from: String,
    pub to: String,
    pub tags: BTreeMap<String, String>,
}

impl FinishedSpan {
    pub fn duration_nanos(&self) -> Nanos {
        self.finish.saturating_sub(self.start)
    }
}

/// Tracing backend
pub trait Tracer: Send + Sync {
    /// Called once when the bus starts; failure aborts the start
    fn init(&self) -> Result<(), BusError> {
        Ok(())
    }

    /// Fresh non-zero span id
    fn random_id(&self) -> u64;

    fn report(&self, span: FinishedSpan);

    /// Flush and release backend resources
    fn close(&self) {}
}

/// Tracer reporting spans as structured log records
#[derive(Debug, Default)]
pub struct LogTracer {
    reported: AtomicU64,
    closed: AtomicBool,
}

impl LogTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Tracer for LogTracer {
    fn random_id(&self) -> u64 {
        // zero means "no span"
        (Uuid::new_v4().as_u128() as u64).max(1)
    }

    fn report(&self, span: FinishedSpan) {
        self.reported.fetch_add(1, Ordering::Relaxed);
        info!(
            target: "context_bus::span",
            operation = %span.operation,
            trace_id = %format!("{:016x}{:016x}", span.trace_id_high, span.trace_id_low),
            span_id = %format!("{:016x}", span.span_id),
            parent_id = %format!("{:016x}", span.parent_id),
            duration_ns = span.duration_nanos(),
            from = %span.from,
            to = %span.to,
            tags = ?span.tags,
            "Span finished"
        );
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(reported = self.reported(), "Log tracer closed");
        }
    }
}

pub struct SpanRenderer<'r> {
    rule: &'r TracingRule,
    tracer: &'r dyn Tracer,
}

impl<'r> SpanRenderer<'r> {
    pub fn new(rule: &'r TracingRule, tracer: &'r dyn Tracer) -> Self {
        Self { rule, tracer }
    }

    /// Span closed by this event, if its opener carries span metadata
    pub fn finish(&self, view: &EventView<'_>) -> Option<FinishedSpan> {
        let prev_name = self.rule.prev_name.as_deref().filter(|n| !n.is_empty())?;

        let Some(prev) = view.previous_named(prev_name) else {
            debug!(event = view.data.name(), prev = prev_name, "Span opener not found in chain");
            return None;
        };
        let Some(opened) = prev.span else {
            debug!(event = view.data.name(), prev = prev_name, "Span opener carries no span");
            return None;
        };

        let tags = self
            .rule
            .attrs
            .iter()
            .map(|attr| (attr.name.clone(), view.value_or_marker(&attr.path)))
            .collect();

        Some(FinishedSpan {
            operation: self.rule.name.clone(),
            trace_id_high: opened.trace_id_high,
            trace_id_low: opened.trace_id_low,
            span_id: opened.span_id,
            parent_id: opened.parent_id,
            start: prev.when(),
            finish: view.data.when(),
            from: prev.name().to_string(),
            to: view.data.name().to_string(),
            tags,
        })
    }
}

impl Renderer for SpanRenderer<'_> {
    fn render(&self, view: &EventView<'_>) -> usize {
        match self.finish(view) {
            Some(span) => {
                self.tracer.report(span);
                1
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configure::AttributeRule;
    use crate::event::{EventChain, Path, SpanMetadata};
    use crate::observation::testing;

    fn rule(prev_name: Option<&str>) -> TracingRule {
        TracingRule {
            name: "checkout".into(),
            prev_name: prev_name.map(str::to_string),
            attrs: vec![AttributeRule::new("text", Path::app_message())],
            stacktrace: false,
        }
    }

    #[test]
    fn test_closes_span_from_opener() {
        let chain = EventChain::new();
        let mut opener = testing::event("CartOpened", 100, testing::plain(""), None);
        opener.span = Some(SpanMetadata {
            sampled: true,
            trace_id_high: 1,
            trace_id_low: 2,
            span_id: 30,
            parent_id: 20,
        });
        let (handle, _) = chain.push(opener).unwrap();
        let closer = testing::event("CartPaid", 350, testing::plain("paid"), Some(handle));

        let tracer = LogTracer::new();
        let rule = rule(Some("CartOpened"));
        let renderer = SpanRenderer::new(&rule, &tracer);
        let view = EventView::new(&closer, &chain);

        let span = renderer.finish(&view).unwrap();
        assert_eq!((span.span_id, span.parent_id), (30, 20));
        assert_eq!((span.start, span.finish), (100, 350));
        assert_eq!(span.duration_nanos(), 250);
        assert_eq!(span.tags["text"], "paid");

        assert_eq!(renderer.render(&view), 1);
        assert_eq!(tracer.reported(), 1);
    }

    #[test]
    fn test_skips_without_opener_span() {
        let chain = EventChain::new();
        let (handle, _) = chain
            .push(testing::event("CartOpened", 100, testing::plain(""), None))
            .unwrap();
        let closer = testing::event("CartPaid", 350, testing::plain(""), Some(handle));
        let tracer = LogTracer::new();

        for prev in [Some("CartOpened"), Some("Unknown"), Some(""), None] {
            let rule = rule(prev);
            assert_eq!(SpanRenderer::new(&rule, &tracer).render(&EventView::new(&closer, &chain)), 0);
        }
        assert_eq!(tracer.reported(), 0);
    }

    #[test]
    fn test_random_ids_and_close() {
        let tracer = LogTracer::new();
        let a = tracer.random_id();
        assert_ne!(a, 0);
        assert_ne!(a, tracer.random_id());

        tracer.close();
        tracer.close();
        assert!(tracer.is_closed());
    }
}
