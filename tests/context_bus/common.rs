/*!
 * Shared fixtures
 */

use context_bus::configure::{LogOut, LoggingRule};
use context_bus::monitoring::MetricsSnapshot;
use context_bus::observation::{FinishedSpan, MetricsSink, Tracer};
use context_bus::{
    BusConfig, Context, ContextBus, ConfigureId, EventMessage, EventRecorder, EventWhere,
    ObservationConfigure, ObservationType, RawConfigure, RequestContext, Submitted,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tracer keeping every finished span
#[derive(Default)]
pub struct RecordingTracer {
    next_id: AtomicU64,
    pub spans: Mutex<Vec<FinishedSpan>>,
}

impl Tracer for RecordingTracer {
    fn random_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 100
    }

    fn report(&self, span: FinishedSpan) {
        self.spans.lock().push(span);
    }
}

/// Sink keeping the last pushed snapshot
#[derive(Default)]
pub struct RecordingSink {
    pub pushes: AtomicU64,
    pub last: Mutex<Option<MetricsSnapshot>>,
}

impl MetricsSink for RecordingSink {
    fn push(&self, snapshot: &MetricsSnapshot) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
        *self.last.lock() = Some(snapshot.clone());
    }
}

/// Rule rendering a silent log line
pub fn quiet(kind: ObservationType) -> ObservationConfigure {
    ObservationConfigure {
        kind,
        logging: Some(LoggingRule {
            out: LogOut::Omit,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn bus_with(raw: &RawConfigure) -> ContextBus {
    let bus = ContextBus::new(BusConfig::bus_only());
    bus.store().set_default(raw).unwrap();
    bus
}

pub fn context(bus: &ContextBus, request_id: u64) -> Context {
    bus.context(RequestContext::new("rest", request_id, ConfigureId::DEFAULT))
        .unwrap()
}

pub async fn submit(bus: &ContextBus, ctx: &mut Context, name: &str) -> Submitted {
    bus.on_submission(
        ctx,
        EventWhere::new("tests/context_bus.rs", 1),
        EventRecorder::new(name),
        EventMessage::new(format!("{name} happened")),
    )
    .await
}
