/*!
 * Event Data
 * Representation plus the metadata assigned at submission
 */

use super::chain::EventHandle;
use super::representation::EventRepresentation;
use crate::core::types::{EventId, Nanos, RequestId};
use serde::{Deserialize, Serialize};

/// Trace span identity carried with an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanMetadata {
    pub sampled: bool,
    pub trace_id_high: u64,
    pub trace_id_low: u64,
    pub span_id: u64,
    pub parent_id: u64,
}

impl SpanMetadata {
    /// Child span of `self` with the given span id
    pub fn child(&self, span_id: u64) -> Self {
        Self {
            sampled: self.sampled,
            trace_id_high: self.trace_id_high,
            trace_id_low: self.trace_id_low,
            span_id,
            parent_id: self.span_id,
        }
    }
}

/// Per-event metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: EventId,
    pub request_id: RequestId,
    /// Timestamp of the environment profile active at submission
    pub profile: Nanos,
    /// Causal predecessor in the request's event chain
    pub prev_event: Option<EventHandle>,
}

/// Event representation with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub event: EventRepresentation,
    pub metadata: EventMetadata,
    pub span: Option<SpanMetadata>,
    /// Captured at the call site when an observation rule asks for it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

impl EventData {
    pub fn new(event: EventRepresentation, metadata: EventMetadata) -> Self {
        Self {
            event,
            metadata,
            span: None,
            stacktrace: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.event.name()
    }

    #[inline]
    pub fn when(&self) -> Nanos {
        self.event.when
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_span() {
        let parent = SpanMetadata {
            sampled: true,
            trace_id_high: 1,
            trace_id_low: 2,
            span_id: 10,
            parent_id: 0,
        };

        let child = parent.child(11);
        assert_eq!(child.parent_id, 10);
        assert_eq!(child.span_id, 11);
        assert_eq!((child.trace_id_high, child.trace_id_low), (1, 2));
        assert!(child.sampled);
    }
}
