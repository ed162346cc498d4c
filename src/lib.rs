/*!
 * Context Bus
 * In-process observability and fault-injection fabric
 *
 * Application code submits semantic events; the bus turns them into logs,
 * spans and metrics per tenant configuration, and injects faults when a
 * configured pattern of earlier events has occurred.
 */

pub mod api;
pub mod background;
pub mod bus;
pub mod configure;
pub mod context;
pub mod core;
pub mod event;
pub mod monitoring;
pub mod observation;
pub mod reaction;

// Re-exports
pub use api::{ContextBus, Submitted};
pub use background::{Background, EnvironmentProfiler, EnvironmentalProfile, ProfileSource};
pub use bus::{BusItem, BusTask, DrainStats, ObservationBus};
pub use configure::{Configure, ConfigureStore, ObservationConfigure, ObservationType, RawConfigure};
pub use context::{Context, ContextBag, EventContext, Payload, RequestContext};
pub use crate::core::{BusConfig, BusError, ConfigureError, ConfigureId, Result};
pub use event::{EventMessage, EventRecorder, EventWhere, Path};
pub use monitoring::init_tracing;
pub use observation::{MetricsSink, Renderer, Tracer};
pub use reaction::{Reaction, ReactionAction};
