//! Traversal over the ledger snapshot.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use tracelot_core::{ActorId, BatchId, TraceError, TraceResult};
use tracelot_ledger::{Event, EventLedger};
use tracelot_store::EntityStore;

use crate::tree::{Direction, LineageGraph, LineageLink, LineageNode, LineageTree, Termination};

/// Rebuilds provenance trees from the event ledger.
///
/// ## Consistency
///
/// Each traversal takes one `list_by_actor` snapshot of the ledger and
/// walks entirely within it; batch records are then resolved one by one
/// from the entity store. Reads are lock-free, so a concurrent operation
/// may commit between the ledger snapshot and a store read, so a traversal
/// can observe a batch whose status is newer than the events it walked.
/// That read skew is accepted and bounded to single-batch detail fields;
/// the tree's *shape* always reflects exactly one ledger snapshot.
pub struct LineageBuilder<S, L> {
    store: S,
    ledger: L,
}

impl<S, L> LineageBuilder<S, L> {
    pub fn new(store: S, ledger: L) -> Self {
        Self { store, ledger }
    }
}

impl<S, L> LineageBuilder<S, L>
where
    S: EntityStore,
    L: EventLedger,
{
    /// Ancestry of a batch: events that produced it, their inputs, and so
    /// on up to `max_depth`. Terminates at true roots (batches no event
    /// outputs), cross-namespace references, and the depth budget.
    pub fn upstream(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
        max_depth: u32,
    ) -> TraceResult<LineageTree> {
        let events = self.ledger.list_by_actor(actor_id)?;
        self.traverse(actor_id, batch_id, Direction::Upstream, max_depth, &events)
    }

    /// Descendants of a batch: events that consumed it, their outputs, and
    /// so on. Symmetric to [`LineageBuilder::upstream`].
    pub fn downstream(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
        max_depth: u32,
    ) -> TraceResult<LineageTree> {
        let events = self.ledger.list_by_actor(actor_id)?;
        self.traverse(actor_id, batch_id, Direction::Downstream, max_depth, &events)
    }

    /// Both directions, built from a single ledger snapshot.
    pub fn graph(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
        max_depth: u32,
    ) -> TraceResult<LineageGraph> {
        let events = self.ledger.list_by_actor(actor_id)?;
        Ok(LineageGraph {
            batch_id: batch_id.clone(),
            actor_id: actor_id.clone(),
            upstream: self.traverse(
                actor_id,
                batch_id,
                Direction::Upstream,
                max_depth,
                &events,
            )?,
            downstream: self.traverse(
                actor_id,
                batch_id,
                Direction::Downstream,
                max_depth,
                &events,
            )?,
        })
    }

    fn traverse(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
        direction: Direction,
        max_depth: u32,
        events: &[Event],
    ) -> TraceResult<LineageTree> {
        if self.store.get_batch(actor_id, batch_id)?.is_none() {
            return Err(TraceError::not_found(format!("batch {actor_id}/{batch_id}")));
        }

        let mut walk = Walk {
            store: &self.store,
            actor_id,
            events,
            index: build_index(events, direction),
            direction,
            max_depth,
            node_count: 0,
            cycle_detected: false,
        };

        let mut path = HashSet::new();
        let root = walk.node(batch_id, 0, &mut path)?;

        debug!(
            actor = %actor_id,
            batch = %batch_id,
            ?direction,
            nodes = walk.node_count,
            cycle = walk.cycle_detected,
            "lineage traversal complete"
        );

        Ok(LineageTree {
            direction,
            root,
            node_count: walk.node_count,
            cycle_detected: walk.cycle_detected,
        })
    }
}

/// Index from a batch id to the events that link it in the traversal
/// direction: producing events for upstream, consuming events for
/// downstream. Foreign citations are left out; those ids belong to other
/// namespaces.
fn build_index<'a>(
    events: &'a [Event],
    direction: Direction,
) -> HashMap<&'a BatchId, Vec<usize>> {
    let mut index: HashMap<&BatchId, Vec<usize>> = HashMap::new();
    for (i, event) in events.iter().enumerate() {
        let refs = match direction {
            Direction::Upstream => &event.outputs,
            Direction::Downstream => &event.inputs,
        };
        for r in refs {
            if r.is_foreign(&event.actor_id) {
                continue;
            }
            index.entry(&r.batch_id).or_default().push(i);
        }
    }
    index
}

struct Walk<'a, S> {
    store: &'a S,
    actor_id: &'a ActorId,
    events: &'a [Event],
    index: HashMap<&'a BatchId, Vec<usize>>,
    direction: Direction,
    max_depth: u32,
    node_count: usize,
    cycle_detected: bool,
}

impl<S> Walk<'_, S>
where
    S: EntityStore,
{
    fn node(
        &mut self,
        batch_id: &BatchId,
        depth: u32,
        path: &mut HashSet<(ActorId, BatchId)>,
    ) -> TraceResult<LineageNode> {
        self.node_count += 1;

        let record = self.store.get_batch(self.actor_id, batch_id)?;
        let mut node = LineageNode {
            batch_id: batch_id.clone(),
            actor_id: self.actor_id.clone(),
            item_id: record.as_ref().map(|b| b.item_id.clone()),
            status: record.as_ref().map(|b| b.status),
            quantity: record.as_ref().and_then(|b| b.quantity.clone()),
            depth,
            links: Vec::new(),
            termination: record.is_none().then_some(Termination::Unknown),
        };
        if record.is_none() {
            // Carry the reference, nothing to expand.
            return Ok(node);
        }

        let event_indices = match self.index.get(batch_id) {
            Some(indices) => indices.clone(),
            None => return Ok(node),
        };

        if depth >= self.max_depth {
            node.termination = Some(Termination::DepthLimit);
            return Ok(node);
        }

        path.insert((self.actor_id.clone(), batch_id.clone()));
        for idx in event_indices {
            let event = &self.events[idx];
            let children = match self.direction {
                Direction::Upstream => &event.inputs,
                Direction::Downstream => &event.outputs,
            };
            for r in children {
                let owner = r.owner(&event.actor_id).clone();
                let child = if r.is_foreign(&event.actor_id) {
                    self.node_count += 1;
                    LineageNode {
                        batch_id: r.batch_id.clone(),
                        actor_id: owner,
                        item_id: None,
                        status: None,
                        quantity: None,
                        depth: depth + 1,
                        links: Vec::new(),
                        termination: Some(Termination::ForeignActor),
                    }
                } else if path.contains(&(owner.clone(), r.batch_id.clone())) {
                    self.cycle_detected = true;
                    self.node_count += 1;
                    LineageNode {
                        batch_id: r.batch_id.clone(),
                        actor_id: owner,
                        item_id: None,
                        status: None,
                        quantity: None,
                        depth: depth + 1,
                        links: Vec::new(),
                        termination: Some(Termination::Cycle),
                    }
                } else {
                    self.node(&r.batch_id, depth + 1, path)?
                };

                node.links.push(LineageLink {
                    event_id: event.id.clone(),
                    event_kind: event.kind.clone(),
                    event_timestamp: event.timestamp,
                    amount: r.amount.clone(),
                    node: child,
                });
            }
        }
        path.remove(&(self.actor_id.clone(), batch_id.clone()));

        // Fixed child order: event timestamp ascending, batch id tie-break.
        node.links.sort_by(|a, b| {
            a.event_timestamp
                .cmp(&b.event_timestamp)
                .then_with(|| a.node.batch_id.cmp(&b.node.batch_id))
        });

        Ok(node)
    }
}
