//! Append-only solution tree recorded during a search run.
//!
//! Nodes are stored in insertion order and addressed by [`NodeId`], which is
//! simply the insertion index. Parent/child links only ever grow by appending
//! a new leaf, so the tree can never contain a cycle and ids along any
//! root-to-leaf path are strictly increasing.

use std::fmt;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::invariants::validate_snapshot;

/// Current on-disk snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Identifier of a node within one journal (0-based insertion index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// `None` marks a draft (root) node.
    pub parent: Option<NodeId>,
    /// Children in insertion order.
    pub children: Vec<NodeId>,
    pub is_buggy: bool,
    /// Score of a successful run. Always `None` for buggy nodes.
    pub metric: Option<f64>,
}

impl Node {
    pub fn is_draft(&self) -> bool {
        self.parent.is_none()
    }
}

/// Serialized form of a [`Journal`]. Draft order is implied by node order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalSnapshot {
    pub version: u32,
    pub nodes: Vec<Node>,
}

/// The full tree of candidates for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Journal {
    nodes: Vec<Node>,
    drafts: Vec<NodeId>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node under `parent`, or as a new draft when `parent` is `None`.
    ///
    /// A metric is only kept for non-buggy nodes, and non-finite metrics are
    /// recorded as unscored.
    ///
    /// # Panics
    ///
    /// Panics if `parent` was not issued by this journal. Callers handling ids
    /// from untrusted input should check [`Journal::contains`] first.
    pub fn insert(
        &mut self,
        parent: Option<NodeId>,
        is_buggy: bool,
        metric: Option<f64>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let metric = if is_buggy {
            None
        } else {
            metric.filter(|value| value.is_finite())
        };

        match parent {
            Some(parent_id) => {
                let Some(parent_node) = self.nodes.get_mut(parent_id.0) else {
                    panic!("parent node {parent_id} is not part of this journal");
                };
                parent_node.children.push(id);
            }
            None => self.drafts.push(id),
        }

        self.nodes.push(Node {
            id,
            parent,
            children: Vec::new(),
            is_buggy,
            metric,
        });
        id
    }

    /// Total number of nodes across all trees.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Root nodes in insertion order.
    pub fn draft_nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.drafts.iter().map(|id| &self.nodes[id.0])
    }

    pub fn buggy_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_buggy).count()
    }

    /// Highest-scoring non-buggy node. Ties go to the earliest insertion.
    pub fn best_node(&self) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for node in &self.nodes {
            if node.is_buggy {
                continue;
            }
            let Some(metric) = node.metric else {
                continue;
            };
            match best {
                Some((_, best_metric)) if best_metric >= metric => {}
                _ => best = Some((node.id, metric)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Pre-order walk over every tree, yielding `(depth, node)`.
    ///
    /// Drafts are visited in insertion order, and so are the children of each
    /// node. Each call starts a fresh walk.
    pub fn traverse(&self) -> Traverse<'_> {
        Traverse {
            journal: self,
            stack: self.drafts.iter().rev().map(|id| (0, *id)).collect(),
        }
    }

    pub fn to_snapshot(&self) -> JournalSnapshot {
        JournalSnapshot {
            version: SNAPSHOT_VERSION,
            nodes: self.nodes.clone(),
        }
    }

    /// Rebuild a journal from a snapshot, rejecting structurally invalid trees.
    pub fn from_snapshot(snapshot: JournalSnapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(anyhow!(
                "unsupported journal snapshot version {} (expected {})",
                snapshot.version,
                SNAPSHOT_VERSION
            ));
        }
        let errors = validate_snapshot(&snapshot.nodes);
        if !errors.is_empty() {
            return Err(anyhow!("journal invariants failed: {}", errors.join("; ")));
        }
        let drafts = snapshot
            .nodes
            .iter()
            .filter(|node| node.is_draft())
            .map(|node| node.id)
            .collect();
        Ok(Self {
            nodes: snapshot.nodes,
            drafts,
        })
    }
}

/// Lazy pre-order iterator returned by [`Journal::traverse`].
pub struct Traverse<'a> {
    journal: &'a Journal,
    stack: Vec<(usize, NodeId)>,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = (usize, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, id) = self.stack.pop()?;
        let node = &self.journal.nodes[id.0];
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, *child)));
        Some((depth, node))
    }
}
