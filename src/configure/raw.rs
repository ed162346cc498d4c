/*!
 * Raw Configuration
 * The serde shape a tenant submits, before compilation
 */

use super::observation::ObservationConfigure;
use crate::core::errors::ConfigureError;
use crate::reaction::RawReaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Uncompiled tenant configuration
///
/// ```json
/// {
///   "reactions": {
///     "slow_checkout": {"type": "fault_delay", "ms": 200, "tree": {"nodes": [...]}}
///   },
///   "observations": {
///     "CartLoaded": {"type": "start", "logging": {"out": "stdout"}}
///   }
/// }
/// ```
///
/// `observations` absent means "no rules declared"; the front end then logs
/// every event with the default rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawConfigure {
    #[serde(default)]
    pub reactions: BTreeMap<String, RawReaction>,
    #[serde(default)]
    pub observations: Option<BTreeMap<String, ObservationConfigure>>,
}

impl RawConfigure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigureError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigureError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn with_reaction(mut self, name: impl Into<String>, reaction: RawReaction) -> Self {
        self.reactions.insert(name.into(), reaction);
        self
    }

    pub fn with_observation(mut self, name: impl Into<String>, rule: ObservationConfigure) -> Self {
        self.observations
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), rule);
        self
    }
}
