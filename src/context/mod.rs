/*!
 * Submission Context
 * Request identity, the active chain position and the request's event arena
 */

mod bag;
mod payload;
mod request;

pub use bag::ContextBag;
pub use payload::{MessageType, Payload};
pub use request::{EventContext, PrevEvent, RequestContext};

use crate::core::types::{now_nanos, ConfigureId, Nanos, RequestId};
use crate::event::{EventChain, EventHandle, SpanMetadata};
use std::sync::Arc;

/// Context threaded through every submission of a request
#[derive(Debug, Clone)]
pub struct Context {
    request: RequestContext,
    event: EventContext,
    chain: Arc<EventChain>,
    span: Option<SpanMetadata>,
    timestamp: Nanos,
}

impl Context {
    pub fn new(request: RequestContext, event: EventContext) -> Self {
        Self {
            request,
            event,
            chain: Arc::new(EventChain::new()),
            span: None,
            timestamp: 0,
        }
    }

    /// Resume a chain propagated by an upstream service
    ///
    /// `None` when the upstream tenant bypasses observation.
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        if payload.configure_id.is_bypass() {
            return None;
        }

        let request = RequestContext::new("", payload.request_id, payload.configure_id)
            .with_span(payload.parent);
        Some(Self::new(request, EventContext::new(payload.snapshots.clone())))
    }

    /// Payload to propagate downstream
    pub fn payload(&self) -> Payload {
        let mut payload = Payload::new(self.request.request_id(), self.request.configure_id());
        payload.snapshots = self.event.snapshots().clone();
        payload.parent = self.span.or_else(|| self.request.span().copied());
        payload
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn request_id(&self) -> RequestId {
        self.request.request_id()
    }

    pub fn configure_id(&self) -> ConfigureId {
        self.request.configure_id()
    }

    pub fn event(&self) -> &EventContext {
        &self.event
    }

    pub fn event_mut(&mut self) -> &mut EventContext {
        &mut self.event
    }

    pub fn chain(&self) -> &Arc<EventChain> {
        &self.chain
    }

    /// Latest span allocated for this request
    pub fn span(&self) -> Option<&SpanMetadata> {
        self.span.as_ref()
    }

    pub fn set_span(&mut self, span: SpanMetadata) {
        self.span = Some(span);
    }

    pub fn timestamp(&self) -> Nanos {
        self.timestamp
    }

    /// Stamp the submission in progress
    pub fn touch(&mut self) -> Nanos {
        self.timestamp = now_nanos();
        self.timestamp
    }

    /// Install a new active context opened by `event`
    pub(crate) fn open_link(&mut self, event: EventHandle) {
        let current = std::mem::take(&mut self.event);
        self.event = current.open(event);
    }
}
