/*!
 * Reactions
 * Synthetic actions fired when a prerequisite tree becomes satisfied
 */

mod condition;
mod prerequisite;
mod snapshot;

pub use condition::{Comparison, Condition, Literal, Operator};
pub use prerequisite::{
    LatencyWindow, LogicOp, PrerequisiteTree, RawNodeKind, RawPrerequisiteNode, RawPrerequisiteTree,
};
pub use snapshot::{PrerequisiteSnapshot, PrerequisiteSnapshots};

use crate::core::errors::{ConfigureError, ReactionError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a satisfied reaction does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactionAction {
    /// Sleep in the submitter's path
    FaultDelay { ms: u64 },
    /// Emit a crash diagnostic from the bus, walking the chain backward
    FaultCrash,
}

impl ReactionAction {
    /// Runs inline with the submission rather than on the bus
    #[inline]
    pub fn is_synchronous(&self) -> bool {
        matches!(self, ReactionAction::FaultDelay { .. })
    }

    pub fn delay(&self) -> Option<Duration> {
        match self {
            ReactionAction::FaultDelay { ms } => Some(Duration::from_millis(*ms)),
            ReactionAction::FaultCrash => None,
        }
    }
}

/// Reaction as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReaction {
    #[serde(flatten)]
    pub action: ReactionAction,
    pub tree: RawPrerequisiteTree,
}

/// Compiled reaction
#[derive(Debug, Clone)]
pub struct Reaction {
    name: String,
    action: ReactionAction,
    tree: PrerequisiteTree,
}

impl Reaction {
    pub fn compile(name: impl Into<String>, raw: &RawReaction) -> Result<Self, ConfigureError> {
        let name = name.into();
        let tree = PrerequisiteTree::compile(&name, &raw.tree)?;
        Ok(Self {
            name,
            action: raw.action.clone(),
            tree,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &ReactionAction {
        &self.action
    }

    pub fn tree(&self) -> &PrerequisiteTree {
        &self.tree
    }

    /// Check this reaction against its slot in `snapshots`
    ///
    /// A chain that never recorded one of the reaction's events has no slot
    /// and is unsatisfied.
    pub fn check(&self, snapshots: &PrerequisiteSnapshots) -> Result<bool, ReactionError> {
        match snapshots.get(&self.name) {
            Some(snapshot) => self.tree.check(snapshot),
            None => Ok(false),
        }
    }
}
