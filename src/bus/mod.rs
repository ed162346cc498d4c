/*!
 * Observation Bus
 * Asynchronous handoff between submitters and the renderers
 *
 * Submitters enqueue into a lock-free queue and ring a capacity-1 doorbell.
 * A single dispatch task (see [`BusTask`]) drains the queue whenever the
 * doorbell rings or the drain interval elapses, whichever comes first. A
 * notification dropped because the doorbell was already full is harmless:
 * the pending one, or the next tick, drains everything.
 */

mod perf;
mod queue;
mod task;

pub use perf::{LatencySummary, PerfRecorder, PerfSample, PerfStats};
pub use queue::{IngestQueue, QueueStats};
pub use task::{BusCommand, BusTask};

use crate::configure::ConfigureStore;
use crate::core::limits::DOORBELL_CAPACITY;
use crate::core::types::{ConfigureId, EventId};
use crate::event::{EventChain, EventData};
use crate::monitoring::MetricsCollector;
use crate::observation::{observe, EventView, LogSink, LogTracer, MetricsSink, ObservationCounts, Tracer};
use crate::reaction::Reaction;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

/// One submitted event on its way to the renderers
#[derive(Debug, Clone)]
pub struct BusItem {
    pub configure_id: ConfigureId,
    pub data: Arc<EventData>,
    /// Chain of the submitting request, for backward lookups
    pub chain: Arc<EventChain>,
    /// Satisfied reactions with asynchronous actions
    pub fired: Vec<Arc<Reaction>>,
    pub enqueued_at: Instant,
}

impl BusItem {
    pub fn new(configure_id: ConfigureId, data: Arc<EventData>, chain: Arc<EventChain>) -> Self {
        Self {
            configure_id,
            data,
            chain,
            fired: Vec::new(),
            enqueued_at: Instant::now(),
        }
    }

    pub fn with_fired(mut self, fired: Vec<Arc<Reaction>>) -> Self {
        self.fired = fired;
        self
    }
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub items: usize,
    pub counts: ObservationCounts,
    /// Crash diagnostics emitted
    pub crashes: usize,
}

pub struct ObservationBus {
    queue: IngestQueue<BusItem>,
    doorbell: mpsc::Sender<()>,
    /// Held by the running dispatch task, parked here otherwise
    doorbell_rx: Mutex<Option<mpsc::Receiver<()>>>,
    event_id: AtomicU64,

    store: ConfigureStore,
    tracer: Arc<dyn Tracer>,
    metrics: MetricsCollector,
    sink: Arc<dyn MetricsSink>,
    perf: Option<PerfRecorder>,
}

impl ObservationBus {
    /// Bus over `store`, reporting spans and metrics to the log
    pub fn new(store: ConfigureStore) -> Self {
        let (doorbell, doorbell_rx) = mpsc::channel(DOORBELL_CAPACITY);
        Self {
            queue: IngestQueue::new(),
            doorbell,
            doorbell_rx: Mutex::new(Some(doorbell_rx)),
            event_id: AtomicU64::new(0),
            store,
            tracer: Arc::new(LogTracer::new()),
            metrics: MetricsCollector::new(),
            sink: Arc::new(LogSink),
            perf: None,
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Record channel and processing latencies, keeping `capacity` samples
    pub fn with_perf(mut self, capacity: usize) -> Self {
        self.perf = Some(PerfRecorder::new(capacity));
        self
    }

    /// Next event id: unique and strictly increasing, starting at 1
    #[inline]
    pub fn new_event_id(&self) -> EventId {
        self.event_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Enqueue and ring the doorbell; never blocks
    pub fn on_submit(&self, item: BusItem) {
        self.queue.enqueue(item);
        // Full means a drain is already pending
        let _ = self.doorbell.try_send(());
    }

    /// Process every queued item
    pub fn drain(&self) -> DrainStats {
        let mut stats = DrainStats::default();

        while let Some(item) = self.queue.dequeue() {
            let dequeued_at = Instant::now();
            let (counts, crashes) = self.process(&item);

            stats.items += 1;
            stats.counts += counts;
            stats.crashes += crashes;

            if let Some(perf) = &self.perf {
                perf.record(PerfSample {
                    kinds: counts.kinds(),
                    channel: dequeued_at.saturating_duration_since(item.enqueued_at),
                    process: dequeued_at.elapsed(),
                });
            }
        }

        if stats.items > 0 {
            trace!(
                items = stats.items,
                logs = stats.counts.logs,
                spans = stats.counts.spans,
                metrics = stats.counts.metrics,
                "Bus drained"
            );
        }
        if stats.counts.metrics > 0 {
            self.flush_metrics();
        }
        stats
    }

    fn process(&self, item: &BusItem) -> (ObservationCounts, usize) {
        let configure = self.store.get_configure(item.configure_id);
        let view = EventView::new(&item.data, &item.chain);

        let counts = if item.configure_id.skips_observation() {
            ObservationCounts::default()
        } else {
            match configure.observation(item.data.name()) {
                Some(rule) => observe(rule, &view, self.tracer.as_ref(), &self.metrics),
                None => {
                    debug!(
                        event = item.data.name(),
                        configure = %item.configure_id,
                        "No observation rule, skipping"
                    );
                    ObservationCounts::default()
                }
            }
        };

        let crashes = item
            .fired
            .iter()
            .filter(|reaction| !reaction.action().is_synchronous())
            .inspect(|reaction| self.crash_diagnostic(reaction, &view))
            .count();

        (counts, crashes)
    }

    fn crash_diagnostic(&self, reaction: &Reaction, view: &EventView<'_>) {
        let history: Vec<String> = std::iter::once(view.data.name().to_string())
            .chain(view.chain.ancestors(view.data).map(|prev| prev.name().to_string()))
            .collect();

        error!(
            reaction = reaction.name(),
            event = view.data.name(),
            event_id = view.data.metadata.event_id,
            request_id = view.data.metadata.request_id,
            history = %history.join(" <- "),
            "Fault crash triggered"
        );
    }

    /// Push a metrics snapshot if anything was written since the last push
    pub fn flush_metrics(&self) -> bool {
        if self.metrics.take_pending() == 0 {
            return false;
        }
        self.sink.push(&self.metrics.snapshot());
        true
    }

    /// Claim the doorbell receiver for a dispatch loop
    pub(crate) fn take_doorbell(&self) -> Option<mpsc::Receiver<()>> {
        self.doorbell_rx.lock().take()
    }

    pub(crate) fn restore_doorbell(&self, rx: mpsc::Receiver<()>) {
        *self.doorbell_rx.lock() = Some(rx);
    }

    pub fn is_running(&self) -> bool {
        self.doorbell_rx.lock().is_none()
    }

    pub fn store(&self) -> &ConfigureStore {
        &self.store
    }

    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn perf(&self) -> Option<&PerfRecorder> {
        self.perf.as_ref()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl fmt::Debug for ObservationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationBus")
            .field("queue", &self.queue.stats())
            .field("event_id", &self.event_id.load(Ordering::Relaxed))
            .field("running", &self.is_running())
            .field("perf", &self.perf.is_some())
            .finish()
    }
}
