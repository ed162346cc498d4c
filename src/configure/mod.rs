/*!
 * Configuration
 * Raw tenant documents, compiled configuration and the hot-swap store
 */

mod observation;
mod raw;
mod store;

pub use observation::{
    AttributeRule, CustomTimestamp, LogOut, LoggingRule, MetricKind, MetricsRule,
    ObservationConfigure, ObservationType, TimestampFormat, TracingRule,
};
pub use raw::RawConfigure;
pub use store::{Configure, ConfigureStore};
