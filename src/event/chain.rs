/*!
 * Event Chain Arena
 * Append-only store of chain-opening events linked by integer handles
 *
 * A record may only point at a slot older than its own, so walking backward
 * always terminates within `len()` steps and the chain can never loop.
 */

use super::data::EventData;
use crate::core::errors::ChainError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Index of an event inside its request's chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventHandle(usize);

impl EventHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn at(index: usize) -> Self {
        Self(index)
    }
}

/// Request-scoped arena of linkable events
#[derive(Debug, Default)]
pub struct EventChain {
    records: RwLock<Vec<Arc<EventData>>>,
}

impl EventChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; its `prev_event` must reference an existing slot
    pub fn push(&self, data: EventData) -> Result<(EventHandle, Arc<EventData>), ChainError> {
        let mut records = self.records.write();
        let slot = records.len();

        if let Some(prev) = data.metadata.prev_event {
            if prev.0 >= slot {
                return Err(ChainError::ForwardLink { slot, prev: prev.0 });
            }
        }

        let data = Arc::new(data);
        records.push(Arc::clone(&data));
        Ok((EventHandle(slot), data))
    }

    pub fn get(&self, handle: EventHandle) -> Option<Arc<EventData>> {
        self.records.read().get(handle.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Direct causal predecessor of `data`
    pub fn previous(&self, data: &EventData) -> Option<Arc<EventData>> {
        data.metadata.prev_event.and_then(|h| self.get(h))
    }

    /// Walk predecessors of `data`, newest first
    pub fn ancestors(&self, data: &EventData) -> Ancestors<'_> {
        Ancestors {
            chain: self,
            next: data.metadata.prev_event,
        }
    }

    /// Nearest predecessor recorded under `name`
    pub fn find_previous(&self, data: &EventData, name: &str) -> Option<Arc<EventData>> {
        self.ancestors(data).find(|prev| prev.name() == name)
    }
}

/// Backward iterator over a chain
pub struct Ancestors<'a> {
    chain: &'a EventChain,
    next: Option<EventHandle>,
}

impl Iterator for Ancestors<'_> {
    type Item = Arc<EventData>;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.next.take()?;
        let data = self.chain.get(handle)?;
        // Slots only ever point strictly backward
        self.next = data.metadata.prev_event.filter(|prev| *prev < handle);
        Some(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventMessage, EventMetadata, EventRecorder, EventRepresentation, EventWhat, EventWhere};

    fn data(name: &str, prev: Option<EventHandle>) -> EventData {
        EventData {
            event: EventRepresentation {
                when: 0,
                where_: EventWhere::default(),
                who: EventRecorder::new(name),
                what: EventWhat::new(EventMessage::new("")),
            },
            metadata: EventMetadata {
                prev_event: prev,
                ..Default::default()
            },
            span: None,
            stacktrace: None,
        }
    }

    #[test]
    fn test_push_and_walk() {
        let chain = EventChain::new();
        let (a, _) = chain.push(data("A", None)).unwrap();
        let (b, _) = chain.push(data("B", Some(a))).unwrap();
        let (_, c) = chain.push(data("C", Some(b))).unwrap();

        let names: Vec<String> = chain
            .ancestors(&c)
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(chain.find_previous(&c, "A").unwrap().name(), "A");
        assert!(chain.find_previous(&c, "Z").is_none());
    }

    #[test]
    fn test_forward_link_rejected() {
        let chain = EventChain::new();
        let err = chain.push(data("A", Some(EventHandle(0)))).unwrap_err();
        assert_eq!(err, ChainError::ForwardLink { slot: 0, prev: 0 });
        assert!(chain.is_empty());
    }
}
