/*!
 * Request and Event Contexts
 */

use crate::core::types::{ConfigureId, RequestId};
use crate::event::{EventHandle, EventMessage, SpanMetadata};
use crate::reaction::PrerequisiteSnapshots;

/// Per inbound call, written once by the network layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    lib: String,
    request_id: RequestId,
    configure_id: ConfigureId,
    message: Option<EventMessage>,
    span: Option<SpanMetadata>,
}

impl RequestContext {
    pub fn new(lib: impl Into<String>, request_id: RequestId, configure_id: ConfigureId) -> Self {
        Self {
            lib: lib.into(),
            request_id,
            configure_id,
            message: None,
            span: None,
        }
    }

    /// Library message attached to every event of the request
    pub fn with_message(mut self, message: EventMessage) -> Self {
        self.message = Some(message);
        self
    }

    /// Parent span propagated by the caller
    pub fn with_span(mut self, span: Option<SpanMetadata>) -> Self {
        self.span = span;
        self
    }

    pub fn lib(&self) -> &str {
        &self.lib
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn configure_id(&self) -> ConfigureId {
        self.configure_id
    }

    pub fn message(&self) -> Option<&EventMessage> {
        self.message.as_ref()
    }

    pub fn span(&self) -> Option<&SpanMetadata> {
        self.span.as_ref()
    }
}

/// Predecessor link of an event context
#[derive(Debug, Clone, PartialEq)]
pub struct PrevEvent {
    pub context: Box<EventContext>,
    pub event: EventHandle,
}

/// One position in a causal chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventContext {
    snapshots: PrerequisiteSnapshots,
    offset: Option<PrerequisiteSnapshots>,
    prev: Option<PrevEvent>,
}

impl EventContext {
    pub fn new(snapshots: PrerequisiteSnapshots) -> Self {
        Self {
            snapshots,
            offset: None,
            prev: None,
        }
    }

    /// Offset snapshots, tracked next to the chain's own
    pub fn with_offset(mut self, offset: PrerequisiteSnapshots) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn snapshots(&self) -> &PrerequisiteSnapshots {
        &self.snapshots
    }

    pub fn offset(&self) -> Option<&PrerequisiteSnapshots> {
        self.offset.as_ref()
    }

    /// Both snapshot sets, for in-place updates
    pub fn snapshots_mut(&mut self) -> (&mut PrerequisiteSnapshots, Option<&mut PrerequisiteSnapshots>) {
        (&mut self.snapshots, self.offset.as_mut())
    }

    pub fn prev(&self) -> Option<&PrevEvent> {
        self.prev.as_ref()
    }

    /// Chain opener this context was created for
    pub fn prev_event(&self) -> Option<EventHandle> {
        self.prev.as_ref().map(|p| p.event)
    }

    /// Number of links back to the request's root context
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self;
        while let Some(prev) = &current.prev {
            depth += 1;
            current = &prev.context;
        }
        depth
    }

    /// New context opened by `event`; `self` becomes its predecessor
    pub(crate) fn open(self, event: EventHandle) -> Self {
        Self {
            snapshots: self.snapshots.clone(),
            offset: self.offset.clone(),
            prev: Some(PrevEvent {
                context: Box::new(self),
                event,
            }),
        }
    }
}
