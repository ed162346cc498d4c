/*!
 * Context Bus
 * Front end used by application code: context extraction, event submission
 * and the background tasks behind them
 *
 * A submission runs synchronously up to reaction dispatch, including any
 * injected delay. Rendering happens later on the bus.
 */

use crate::background::{Background, EnvironmentProfiler, ProfileSource, ProfilerTask};
use crate::bus::{BusItem, BusTask, ObservationBus};
use crate::configure::{ConfigureStore, ObservationType};
use crate::context::{Context, ContextBag, EventContext, Payload, RequestContext};
use crate::core::config::BusConfig;
use crate::core::errors::{ChainError, Result};
use crate::core::types::EventId;
use crate::event::{
    EventData, EventMessage, EventMetadata, EventRecorder, EventRepresentation, EventWhat, EventWhere,
};
use crate::observation::{LogSink, LogTracer, MetricsSink, Tracer};
use crate::reaction::Reaction;
use std::backtrace::Backtrace;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one submission
#[derive(Debug, Clone)]
pub struct Submitted {
    pub event_id: EventId,
    pub observation: ObservationType,
    /// Reactions satisfied by this submission
    pub fired: Vec<Arc<Reaction>>,
}

pub struct ContextBus {
    config: BusConfig,
    store: ConfigureStore,
    bus: Arc<ObservationBus>,
    profiler: Arc<EnvironmentProfiler>,
}

impl ContextBus {
    /// Spans and metrics reported to the log
    pub fn new(config: BusConfig) -> Self {
        Self::with_backends(config, Arc::new(LogTracer::new()), Arc::new(LogSink))
    }

    pub fn with_backends(config: BusConfig, tracer: Arc<dyn Tracer>, sink: Arc<dyn MetricsSink>) -> Self {
        let store = ConfigureStore::new();
        let mut bus = ObservationBus::new(store.clone())
            .with_tracer(tracer)
            .with_sink(sink);
        if config.perf_metrics {
            bus = bus.with_perf(config.perf_capacity);
        }

        Self {
            profiler: Arc::new(EnvironmentProfiler::new(config.profile_retention)),
            bus: Arc::new(bus),
            store,
            config,
        }
    }

    /// Spawn the background tasks switched on in the config
    ///
    /// Must be called within a tokio runtime. Fails when the tracer does not
    /// initialize or the bus loop is already running.
    pub fn start(&self) -> Result<Background> {
        let bus = if self.config.observation_bus {
            Some(BusTask::spawn(Arc::clone(&self.bus), self.config.drain_interval)?)
        } else {
            None
        };
        let profiler = self
            .config
            .environment_profiler
            .then(|| ProfilerTask::spawn(Arc::clone(&self.profiler), self.config.profile_interval));

        info!(
            observation_bus = bus.is_some(),
            environment_profiler = profiler.is_some(),
            "Context bus started"
        );
        Ok(Background::new(bus, profiler))
    }

    /// Context for a new inbound request; `None` for bypassed tenants
    pub fn context(&self, request: RequestContext) -> Option<Context> {
        if request.configure_id().is_bypass() {
            return None;
        }
        Some(Context::new(request, EventContext::default()))
    }

    /// Resume a chain propagated by an upstream service
    pub fn from_payload(&self, payload: &Payload) -> Option<Context> {
        Context::from_payload(payload)
    }

    /// Context a framework attached to the current call
    pub fn from_bag<'b>(&self, bag: &'b mut ContextBag) -> Option<&'b mut Context> {
        bag.get_mut::<Context>()
            .filter(|ctx| !ctx.configure_id().is_bypass())
    }

    /// Submit an event observed by application code
    pub async fn on_submission(
        &self,
        ctx: &mut Context,
        where_: EventWhere,
        who: EventRecorder,
        message: EventMessage,
    ) -> Submitted {
        let when = ctx.touch();
        let mut what = EventWhat::new(message);
        if let Some(library) = ctx.request().message() {
            what = what.with_library(ctx.request().lib(), library.clone());
        }
        let event = EventRepresentation {
            when,
            where_,
            who,
            what,
        };
        let name = event.name().to_string();

        let configure_id = ctx.configure_id();
        let configure = self.store.get_configure(configure_id);

        let (snapshots, offset) = ctx.event_mut().snapshots_mut();
        match offset {
            Some(offset) => configure.update_both_snapshots(&name, when, &event.what, snapshots, offset),
            None => configure.update_snapshots(&name, when, &event.what, snapshots),
        };

        let rule = configure.observation_or_default(&name);
        let observation = rule.map(|r| r.kind).unwrap_or_default();

        let mut metadata = EventMetadata {
            event_id: self.bus.new_event_id(),
            request_id: ctx.request_id(),
            profile: self.profiler.latest().timestamp,
            prev_event: None,
        };

        if observation.closes() {
            match ctx.event().prev_event() {
                Some(prev) => metadata.prev_event = Some(prev),
                None => warn!(
                    error = %ChainError::MissingPrevious(name.clone()),
                    request_id = metadata.request_id,
                    "Chain link missing, continuing unlinked"
                ),
            }
        }

        let mut data = EventData::new(event, metadata);

        if rule.is_some_and(|r| r.opens_span()) && !configure_id.skips_tracing() {
            if let Some(parent) = ctx.request().span().filter(|span| span.sampled).copied() {
                let span = parent.child(self.bus.tracer().random_id());
                data.span = Some(span);
                ctx.set_span(span);
            }
        }

        if rule.is_some_and(|r| r.wants_stacktrace()) {
            data.stacktrace = Some(Backtrace::force_capture().to_string());
        }

        let event_id = data.metadata.event_id;
        let data = if observation.opens() {
            match ctx.chain().push(data) {
                Ok((handle, data)) => {
                    ctx.open_link(handle);
                    Some(data)
                }
                Err(e) => {
                    warn!(event = %name, error = %e, "Chain rejected event");
                    None
                }
            }
        } else {
            Some(Arc::new(data))
        };

        let fired = configure.satisfied(&name, ctx.event().snapshots());
        let (inline, deferred): (Vec<_>, Vec<_>) = fired
            .iter()
            .cloned()
            .partition(|reaction| reaction.action().is_synchronous());
        for reaction in &inline {
            if let Some(delay) = reaction.action().delay() {
                debug!(reaction = reaction.name(), delay_ms = delay.as_millis() as u64, "Injecting delay");
                tokio::time::sleep(delay).await;
            }
        }

        if let Some(data) = data {
            let item = BusItem::new(configure_id, data, Arc::clone(ctx.chain())).with_fired(deferred);
            self.bus.on_submit(item);
        }

        Submitted {
            event_id,
            observation,
            fired,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn store(&self) -> &ConfigureStore {
        &self.store
    }

    pub fn bus(&self) -> &Arc<ObservationBus> {
        &self.bus
    }

    pub fn profiler(&self) -> &Arc<EnvironmentProfiler> {
        &self.profiler
    }
}

impl Default for ContextBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}
