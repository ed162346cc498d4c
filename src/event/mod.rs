/*!
 * Event Model
 * Representation, metadata and the request-scoped causal chain
 */

mod attributes;
mod chain;
mod data;
mod representation;

pub use attributes::{AttributeValue, Attributes, Path, PathRoot, PathTarget, Value};
pub use chain::{Ancestors, EventChain, EventHandle};
pub use data::{EventData, EventMetadata, SpanMetadata};
pub use representation::{
    EventMessage, EventRecorder, EventRepresentation, EventWhat, EventWhere, LibraryMessage,
};
