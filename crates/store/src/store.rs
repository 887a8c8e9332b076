//! The entity store contract.

use std::sync::Arc;

use thiserror::Error;

use tracelot_core::{
    Actor, ActorId, Batch, BatchId, ExpectedVersion, Item, ItemId, Location, LocationId,
    TraceError,
};

/// Entity store operation error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Optimistic concurrency check failed (stale version presented).
    #[error("version conflict on {key}: expected {expected:?}, found {actual}")]
    Conflict {
        key: String,
        expected: ExpectedVersion,
        actual: u64,
    },

    /// A record targeted by an update/remove is absent.
    #[error("record not found: {0}")]
    NotFound(String),

    /// An insert targeted an identifier that is already taken.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// Backend failure (lock poisoning, I/O, ...).
    #[error("store error: {0}")]
    Storage(String),
}

impl From<StoreError> for TraceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { .. } => TraceError::Conflict(value.to_string()),
            StoreError::NotFound(what) => TraceError::NotFound(what),
            StoreError::AlreadyExists(key) => TraceError::IdentifierConflict(key),
            StoreError::Storage(msg) => TraceError::Conflict(msg),
        }
    }
}

/// Typed accessors for Actor/Item/Batch/Location records.
///
/// ## Versioning
///
/// `put_batch` is the only mutation path the core uses. Callers present the
/// version they last read; the store bumps it by one on success and reports
/// [`StoreError::Conflict`] on mismatch so the executor can abort the whole
/// operation. A record that does not exist yet is at version 0.
///
/// `remove_batch` exists solely so the executor can unwind creations when a
/// commit fails partway; it is not part of the caller-facing surface.
///
/// No call has side effects beyond the single record it touches.
pub trait EntityStore: Send + Sync {
    fn get_batch(&self, actor_id: &ActorId, batch_id: &BatchId)
        -> Result<Option<Batch>, StoreError>;

    /// Write a batch record. The stored copy carries `expected + 1` as its
    /// version (1 for a first insert) and is returned.
    fn put_batch(&self, batch: Batch, expected: ExpectedVersion) -> Result<Batch, StoreError>;

    /// Remove a batch record (rollback support).
    fn remove_batch(&self, actor_id: &ActorId, batch_id: &BatchId) -> Result<(), StoreError>;

    fn list_batches_by_actor(&self, actor_id: &ActorId) -> Result<Vec<Batch>, StoreError>;

    fn get_actor(&self, actor_id: &ActorId) -> Result<Option<Actor>, StoreError>;

    fn insert_actor(&self, actor: Actor) -> Result<(), StoreError>;

    fn get_item(&self, actor_id: &ActorId, item_id: &ItemId) -> Result<Option<Item>, StoreError>;

    fn insert_item(&self, item: Item) -> Result<(), StoreError>;

    fn get_location(
        &self,
        actor_id: &ActorId,
        location_id: &LocationId,
    ) -> Result<Option<Location>, StoreError>;

    fn insert_location(&self, location: Location) -> Result<(), StoreError>;
}

impl<S> EntityStore for Arc<S>
where
    S: EntityStore + ?Sized,
{
    fn get_batch(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
    ) -> Result<Option<Batch>, StoreError> {
        (**self).get_batch(actor_id, batch_id)
    }

    fn put_batch(&self, batch: Batch, expected: ExpectedVersion) -> Result<Batch, StoreError> {
        (**self).put_batch(batch, expected)
    }

    fn remove_batch(&self, actor_id: &ActorId, batch_id: &BatchId) -> Result<(), StoreError> {
        (**self).remove_batch(actor_id, batch_id)
    }

    fn list_batches_by_actor(&self, actor_id: &ActorId) -> Result<Vec<Batch>, StoreError> {
        (**self).list_batches_by_actor(actor_id)
    }

    fn get_actor(&self, actor_id: &ActorId) -> Result<Option<Actor>, StoreError> {
        (**self).get_actor(actor_id)
    }

    fn insert_actor(&self, actor: Actor) -> Result<(), StoreError> {
        (**self).insert_actor(actor)
    }

    fn get_item(&self, actor_id: &ActorId, item_id: &ItemId) -> Result<Option<Item>, StoreError> {
        (**self).get_item(actor_id, item_id)
    }

    fn insert_item(&self, item: Item) -> Result<(), StoreError> {
        (**self).insert_item(item)
    }

    fn get_location(
        &self,
        actor_id: &ActorId,
        location_id: &LocationId,
    ) -> Result<Option<Location>, StoreError> {
        (**self).get_location(actor_id, location_id)
    }

    fn insert_location(&self, location: Location) -> Result<(), StoreError> {
        (**self).insert_location(location)
    }
}
