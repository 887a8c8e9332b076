//! Lineage traversal output: trees of annotated edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tracelot_core::{ActorId, BatchId, BatchStatus, EventId, ItemId, Quantity};
use tracelot_ledger::EventKind;

/// Traversal direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upstream,
    Downstream,
}

/// Why a branch stopped expanding.
///
/// A node with no links and no termination marker is a genuine boundary of
/// the graph: a true root (upstream) or a batch nothing has consumed yet
/// (downstream).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Cross-namespace reference: a different trust/ownership domain whose
    /// ledger this traversal does not read.
    ForeignActor,
    /// The depth budget ran out with expansions remaining.
    DepthLimit,
    /// The node is already on the current path. Well-formed ledgers cannot
    /// produce this (output identifiers must be previously unused); it is
    /// a defensive stop, reported on the tree as a whole.
    Cycle,
    /// The referenced batch has no record in the entity store.
    Unknown,
}

/// One edge of the tree, annotated with the event that implies it and the
/// amount that event cited for the child batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageLink {
    pub event_id: EventId,
    pub event_kind: EventKind,
    pub event_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Quantity>,
    pub node: LineageNode,
}

/// One batch in the tree. Catalog details are filled in when the batch is
/// readable from the entity store; foreign and unknown nodes carry only the
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageNode {
    pub batch_id: BatchId,
    pub actor_id: ActorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BatchStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LineageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination: Option<Termination>,
}

impl LineageNode {
    /// Batch identifiers of the direct children, in tree order.
    pub fn child_ids(&self) -> Vec<&BatchId> {
        self.links.iter().map(|l| &l.node.batch_id).collect()
    }
}

/// A bounded traversal result.
///
/// `cycle_detected` marks a partial result: the offending branch carries
/// [`Termination::Cycle`] and everything else is intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageTree {
    pub direction: Direction,
    pub root: LineageNode,
    pub node_count: usize,
    pub cycle_detected: bool,
}

/// Both directions combined, built from a single ledger snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageGraph {
    pub batch_id: BatchId,
    pub actor_id: ActorId,
    pub upstream: LineageTree,
    pub downstream: LineageTree,
}
