//! Batch references cited by events.

use serde::{Deserialize, Serialize};

use crate::id::{ActorId, BatchId};
use crate::quantity::Quantity;

/// A tagged reference to a batch in an event's input/output lists:
/// `{batch_id, actor_id?, amount?}`.
///
/// `actor_id` defaults to the citing event's own actor when absent. A
/// reference whose `actor_id` names a *different* actor is a cross-namespace
/// citation: a read-only pointer into a foreign trust domain that never
/// grants mutation rights and is never expanded by lineage traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRef {
    pub batch_id: BatchId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Quantity>,
}

impl BatchRef {
    /// Reference a batch in the event's own namespace.
    pub fn local(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            actor_id: None,
            amount: None,
        }
    }

    /// Reference a batch owned by another actor.
    pub fn foreign(batch_id: BatchId, actor_id: ActorId) -> Self {
        Self {
            batch_id,
            actor_id: Some(actor_id),
            amount: None,
        }
    }

    pub fn with_amount(mut self, amount: Quantity) -> Self {
        self.amount = Some(amount);
        self
    }

    /// The actor that owns the referenced batch, given the citing event's
    /// actor as the default.
    pub fn owner<'a>(&'a self, event_actor: &'a ActorId) -> &'a ActorId {
        self.actor_id.as_ref().unwrap_or(event_actor)
    }

    /// Whether this reference points outside the citing event's namespace.
    pub fn is_foreign(&self, event_actor: &ActorId) -> bool {
        self.actor_id
            .as_ref()
            .is_some_and(|owner| owner != event_actor)
    }
}
