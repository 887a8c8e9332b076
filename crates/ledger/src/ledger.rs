//! The append-only event ledger contract.

use std::sync::Arc;

use thiserror::Error;

use tracelot_core::{ActorId, BatchId, EventId, TraceError};

use crate::event::Event;

/// Ledger operation error.
///
/// These are infrastructure-boundary errors. Domain validation (eligible
/// statuses, identifier reuse on batches) happens in the executor before
/// anything reaches the ledger.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// The event identifier already exists in the actor's namespace.
    /// Ledger entries are idempotency keys; re-appending is a caller bug
    /// or a replayed request, never silently absorbed.
    #[error("duplicate event id: {0}")]
    DuplicateEventId(EventId),

    /// Backend failure (lock poisoning, I/O, ...).
    #[error("ledger storage error: {0}")]
    Storage(String),
}

impl From<LedgerError> for TraceError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::DuplicateEventId(id) => TraceError::DuplicateEventId(id),
            LedgerError::Storage(msg) => TraceError::Conflict(msg),
        }
    }
}

/// Append-only, actor-scoped event log.
///
/// ## Semantics
///
/// - `append` persists one event or fails; there is no update or delete.
///   Corrections are made by appending a compensating event, a policy for
///   callers, not a mechanism enforced here.
/// - `list_by_actor` returns the actor's events ordered by business
///   timestamp ascending, then by insertion order for equal timestamps.
///   That ordering is what makes lineage traversal deterministic.
/// - `list_referencing` narrows to events citing the given batch (owned by
///   the actor) in their inputs or outputs. Implementations may serve this
///   from an index or a filtered scan.
///
/// Durability once `append` returns success is the implementation's
/// responsibility; the executor assumes it.
pub trait EventLedger: Send + Sync {
    /// Append one event. Fails with [`LedgerError::DuplicateEventId`] if
    /// the id is already present in the actor's namespace.
    fn append(&self, event: Event) -> Result<Event, LedgerError>;

    /// Whether an event id is already taken in the actor's namespace.
    fn contains(&self, actor_id: &ActorId, event_id: &EventId) -> Result<bool, LedgerError>;

    /// All events for an actor, ordered by timestamp then insertion order.
    fn list_by_actor(&self, actor_id: &ActorId) -> Result<Vec<Event>, LedgerError>;

    /// Events where the batch appears in inputs or outputs, same ordering
    /// as [`EventLedger::list_by_actor`].
    fn list_referencing(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
    ) -> Result<Vec<Event>, LedgerError>;
}

impl<L> EventLedger for Arc<L>
where
    L: EventLedger + ?Sized,
{
    fn append(&self, event: Event) -> Result<Event, LedgerError> {
        (**self).append(event)
    }

    fn contains(&self, actor_id: &ActorId, event_id: &EventId) -> Result<bool, LedgerError> {
        (**self).contains(actor_id, event_id)
    }

    fn list_by_actor(&self, actor_id: &ActorId) -> Result<Vec<Event>, LedgerError> {
        (**self).list_by_actor(actor_id)
    }

    fn list_referencing(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
    ) -> Result<Vec<Event>, LedgerError> {
        (**self).list_referencing(actor_id, batch_id)
    }
}
