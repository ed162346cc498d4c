/*!
 * Prerequisite Snapshots
 * Per-chain progress of every reaction's prerequisite tree
 */

use crate::core::types::Nanos;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counter and latency-window slots, one per tree node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteSnapshot {
    pub counters: Vec<i64>,
    pub window_starts: Vec<Option<Nanos>>,
}

impl PrerequisiteSnapshot {
    pub fn with_nodes(nodes: usize) -> Self {
        Self {
            counters: vec![0; nodes],
            window_starts: vec![None; nodes],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    #[inline]
    pub fn counter(&self, node: usize) -> i64 {
        self.counters.get(node).copied().unwrap_or(0)
    }

    /// Both vectors sized for a tree of `nodes`
    #[inline]
    pub fn fits(&self, nodes: usize) -> bool {
        self.counters.len() == nodes && self.window_starts.len() == nodes
    }
}

/// Snapshots keyed by reaction name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrerequisiteSnapshots(BTreeMap<String, PrerequisiteSnapshot>);

impl PrerequisiteSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reaction: &str) -> Option<&PrerequisiteSnapshot> {
        self.0.get(reaction)
    }

    /// Snapshot for `reaction`, created by `init` on first use
    pub fn get_or_insert_with(
        &mut self,
        reaction: &str,
        init: impl FnOnce() -> PrerequisiteSnapshot,
    ) -> &mut PrerequisiteSnapshot {
        self.0.entry(reaction.to_string()).or_insert_with(init)
    }

    pub fn insert(&mut self, reaction: impl Into<String>, snapshot: PrerequisiteSnapshot) {
        self.0.insert(reaction.into(), snapshot);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PrerequisiteSnapshot)> {
        self.0.iter()
    }
}
