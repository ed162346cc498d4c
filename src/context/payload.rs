/*!
 * Propagation Payload
 * What a downstream service needs to resume a causal chain
 */

use crate::core::errors::Result;
use crate::core::types::{ConfigureId, RequestId};
use crate::event::SpanMetadata;
use crate::reaction::PrerequisiteSnapshots;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[default]
    Request,
    Response,
}

/// Cross-process context carrier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub request_id: RequestId,
    pub configure_id: ConfigureId,
    pub snapshots: PrerequisiteSnapshots,
    /// Span the receiver should parent its spans under
    pub parent: Option<SpanMetadata>,
    pub message_type: MessageType,
    pub uuid: String,
}

impl Payload {
    pub fn new(request_id: RequestId, configure_id: ConfigureId) -> Self {
        Self {
            request_id,
            configure_id,
            snapshots: PrerequisiteSnapshots::new(),
            parent: None,
            message_type: MessageType::Request,
            uuid: Uuid::new_v4().to_string(),
        }
    }

    /// Compact binary encoding for transport headers
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
