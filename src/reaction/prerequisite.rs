/*!
 * Prerequisite Trees
 * AND/OR trees over event occurrences, compiled once and evaluated per chain
 *
 * The raw form is the serde shape of a configuration document: a flat node
 * list with parent ids and child lists. Compilation checks the structure and
 * precomputes which leaves each event name touches so snapshot updates only
 * visit the affected slots.
 */

use super::condition::{Comparison, Condition};
use super::snapshot::PrerequisiteSnapshot;
use crate::core::errors::{ConfigureError, ReactionError};
use crate::core::types::Nanos;
use crate::event::EventWhat;
use ahash::RandomState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Logic connective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOp {
    And,
    Or,
}

/// Latency requirement on a message leaf
///
/// The leaf only counts when more than `threshold_ms` elapsed since the most
/// recent `from` event of the same chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyWindow {
    pub from: String,
    pub threshold_ms: u64,
}

impl LatencyWindow {
    #[inline]
    fn threshold_nanos(&self) -> Nanos {
        i64::try_from(self.threshold_ms)
            .unwrap_or(i64::MAX)
            .saturating_mul(1_000_000)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawNodeKind {
    Logic {
        op: LogicOp,
        children: Vec<usize>,
    },
    Message {
        name: String,
        #[serde(default)]
        condition: Option<Condition>,
        #[serde(default)]
        occurrences: Vec<Comparison>,
        #[serde(default)]
        latency: Option<LatencyWindow>,
    },
}

/// One node of a raw tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrerequisiteNode {
    pub id: usize,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(flatten)]
    pub kind: RawNodeKind,
}

impl RawPrerequisiteNode {
    pub fn logic(id: usize, parent: Option<usize>, op: LogicOp, children: Vec<usize>) -> Self {
        Self {
            id,
            parent,
            kind: RawNodeKind::Logic { op, children },
        }
    }

    pub fn message(id: usize, parent: Option<usize>, name: impl Into<String>) -> Self {
        Self {
            id,
            parent,
            kind: RawNodeKind::Message {
                name: name.into(),
                condition: None,
                occurrences: Vec::new(),
                latency: None,
            },
        }
    }

    pub fn with_condition(mut self, value: Condition) -> Self {
        if let RawNodeKind::Message { condition, .. } = &mut self.kind {
            *condition = Some(value);
        }
        self
    }

    pub fn with_occurrence(mut self, value: Comparison) -> Self {
        if let RawNodeKind::Message { occurrences, .. } = &mut self.kind {
            occurrences.push(value);
        }
        self
    }

    pub fn with_latency(mut self, from: impl Into<String>, threshold_ms: u64) -> Self {
        if let RawNodeKind::Message { latency, .. } = &mut self.kind {
            *latency = Some(LatencyWindow {
                from: from.into(),
                threshold_ms,
            });
        }
        self
    }
}

/// Flat node list as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPrerequisiteTree {
    pub nodes: Vec<RawPrerequisiteNode>,
}

impl RawPrerequisiteTree {
    pub fn new(nodes: Vec<RawPrerequisiteNode>) -> Self {
        Self { nodes }
    }
}

#[derive(Debug, Clone)]
struct MessageLeaf {
    name: String,
    condition: Option<Condition>,
    occurrences: Vec<Comparison>,
    latency: Option<LatencyWindow>,
}

impl MessageLeaf {
    fn satisfied(&self, count: i64) -> bool {
        if self.occurrences.is_empty() {
            count > 0
        } else {
            self.occurrences.iter().all(|c| c.holds(count))
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Logic { op: LogicOp, children: Vec<usize> },
    Message(MessageLeaf),
}

/// Validated, immutable prerequisite tree
#[derive(Debug, Clone)]
pub struct PrerequisiteTree {
    nodes: Vec<Node>,
    root: usize,
    leaf_ids: Vec<usize>,
    /// event name -> leaves counting it
    watches: HashMap<String, Vec<usize>, RandomState>,
    /// event name -> latency leaves whose window it opens
    windows: HashMap<String, Vec<usize>, RandomState>,
}

impl PrerequisiteTree {
    /// Validate and compile `raw` for reaction `reaction`
    pub fn compile(reaction: &str, raw: &RawPrerequisiteTree) -> Result<Self, ConfigureError> {
        let n = raw.nodes.len();
        if n == 0 {
            return Err(ConfigureError::EmptyTree(reaction.to_string()));
        }

        let mut slots: Vec<Option<&RawPrerequisiteNode>> = vec![None; n];
        for node in &raw.nodes {
            match slots.get_mut(node.id) {
                Some(slot) if slot.is_none() => *slot = Some(node),
                _ => {
                    return Err(ConfigureError::BadNodeId {
                        reaction: reaction.to_string(),
                        id: node.id,
                    })
                }
            }
        }
        // Dense and unique ids fill every slot
        let ordered: Vec<&RawPrerequisiteNode> = slots.into_iter().flatten().collect();

        let mut listed_parent: Vec<Option<usize>> = vec![None; n];
        for node in &ordered {
            if let RawNodeKind::Logic { children, .. } = &node.kind {
                if children.is_empty() {
                    return Err(ConfigureError::EmptyLogic {
                        reaction: reaction.to_string(),
                        node: node.id,
                    });
                }
                for &child in children {
                    if child >= n {
                        return Err(ConfigureError::MissingNode {
                            reaction: reaction.to_string(),
                            node: node.id,
                            missing: child,
                        });
                    }
                    if child == node.id || listed_parent[child].is_some() {
                        return Err(ConfigureError::ParentMismatch {
                            reaction: reaction.to_string(),
                            node: child,
                            declared: ordered[child].parent,
                            actual: listed_parent[child].or(Some(node.id)),
                        });
                    }
                    listed_parent[child] = Some(node.id);
                }
            }
        }

        let roots: Vec<usize> = ordered
            .iter()
            .filter(|node| node.parent.is_none())
            .map(|node| node.id)
            .collect();
        if roots.len() != 1 {
            return Err(ConfigureError::RootCount {
                reaction: reaction.to_string(),
                found: roots.len(),
            });
        }
        let root = roots[0];

        for node in &ordered {
            if node.parent != listed_parent[node.id] {
                return Err(ConfigureError::ParentMismatch {
                    reaction: reaction.to_string(),
                    node: node.id,
                    declared: node.parent,
                    actual: listed_parent[node.id],
                });
            }
        }

        let mut visited = vec![false; n];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id], true) {
                continue;
            }
            if let RawNodeKind::Logic { children, .. } = &ordered[id].kind {
                stack.extend(children.iter().copied());
            }
        }
        if let Some(node) = visited.iter().position(|seen| !seen) {
            return Err(ConfigureError::Unreachable {
                reaction: reaction.to_string(),
                node,
            });
        }

        let mut nodes = Vec::with_capacity(n);
        let mut leaf_ids = Vec::new();
        let mut watches: HashMap<String, Vec<usize>, RandomState> = HashMap::default();
        let mut windows: HashMap<String, Vec<usize>, RandomState> = HashMap::default();

        for node in &ordered {
            nodes.push(match &node.kind {
                RawNodeKind::Logic { op, children } => Node::Logic {
                    op: *op,
                    children: children.clone(),
                },
                RawNodeKind::Message {
                    name,
                    condition,
                    occurrences,
                    latency,
                } => {
                    leaf_ids.push(node.id);
                    watches.entry(name.clone()).or_default().push(node.id);
                    if let Some(window) = latency {
                        windows.entry(window.from.clone()).or_default().push(node.id);
                    }
                    Node::Message(MessageLeaf {
                        name: name.clone(),
                        condition: condition.clone(),
                        occurrences: occurrences.clone(),
                        latency: latency.clone(),
                    })
                }
            });
        }

        Ok(Self {
            nodes,
            root,
            leaf_ids,
            watches,
            windows,
        })
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_ids(&self) -> &[usize] {
        &self.leaf_ids
    }

    /// Every event name that can change a snapshot of this tree
    pub fn watched_names(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self
            .watches
            .keys()
            .chain(self.windows.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names.into_iter()
    }

    /// Name watched by leaf `id`
    pub fn leaf_name(&self, id: usize) -> Option<&str> {
        match self.nodes.get(id)? {
            Node::Message(leaf) => Some(&leaf.name),
            Node::Logic { .. } => None,
        }
    }

    pub fn initialize_snapshot(&self) -> PrerequisiteSnapshot {
        PrerequisiteSnapshot::with_nodes(self.nodes.len())
    }

    /// Record one occurrence of `name`; returns how many counters moved
    pub fn update_snapshot(
        &self,
        name: &str,
        when: Nanos,
        what: &EventWhat,
        snapshot: &mut PrerequisiteSnapshot,
    ) -> usize {
        if !snapshot.fits(self.nodes.len()) {
            *snapshot = self.initialize_snapshot();
        }

        let mut bumped = 0;
        for &id in self.watches.get(name).map(Vec::as_slice).unwrap_or_default() {
            let Node::Message(leaf) = &self.nodes[id] else {
                continue;
            };

            if let Some(condition) = &leaf.condition {
                match condition.evaluate(what) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        debug!(leaf = id, event = name, error = %e, "Leaf condition not evaluable");
                        continue;
                    }
                }
            }

            if let Some(window) = &leaf.latency {
                match snapshot.window_starts[id] {
                    Some(start) if when.saturating_sub(start) > window.threshold_nanos() => {}
                    _ => continue,
                }
            }

            snapshot.counters[id] = snapshot.counters[id].saturating_add(1);
            bumped += 1;
        }

        for &id in self.windows.get(name).map(Vec::as_slice).unwrap_or_default() {
            snapshot.window_starts[id] = Some(when);
        }

        bumped
    }

    /// Whether the tree is satisfied by `snapshot`
    pub fn check(&self, snapshot: &PrerequisiteSnapshot) -> Result<bool, ReactionError> {
        if !snapshot.fits(self.nodes.len()) {
            return Err(ReactionError::SnapshotMismatch {
                expected: self.nodes.len(),
                actual: snapshot.len(),
            });
        }
        Ok(self.check_node(self.root, snapshot))
    }

    fn check_node(&self, id: usize, snapshot: &PrerequisiteSnapshot) -> bool {
        match &self.nodes[id] {
            Node::Logic {
                op: LogicOp::And,
                children,
            } => children.iter().all(|&c| self.check_node(c, snapshot)),
            Node::Logic {
                op: LogicOp::Or,
                children,
            } => children.iter().any(|&c| self.check_node(c, snapshot)),
            Node::Message(leaf) => leaf.satisfied(snapshot.counters[id]),
        }
    }
}
