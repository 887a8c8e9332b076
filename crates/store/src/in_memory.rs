//! In-memory entity store.

use std::collections::HashMap;
use std::sync::RwLock;

use tracelot_core::{
    Actor, ActorId, Batch, BatchId, ExpectedVersion, Item, ItemId, Location, LocationId,
};

use crate::store::{EntityStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BatchKey {
    actor_id: ActorId,
    batch_id: BatchId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ItemKey {
    actor_id: ActorId,
    item_id: ItemId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LocationKey {
    actor_id: ActorId,
    location_id: LocationId,
}

/// In-memory entity store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    batches: RwLock<HashMap<BatchKey, Batch>>,
    actors: RwLock<HashMap<ActorId, Actor>>,
    items: RwLock<HashMap<ItemKey, Item>>,
    locations: RwLock<HashMap<LocationKey, Location>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}

impl EntityStore for InMemoryEntityStore {
    fn get_batch(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
    ) -> Result<Option<Batch>, StoreError> {
        let batches = self.batches.read().map_err(poisoned)?;
        Ok(batches
            .get(&BatchKey {
                actor_id: actor_id.clone(),
                batch_id: batch_id.clone(),
            })
            .cloned())
    }

    fn put_batch(&self, mut batch: Batch, expected: ExpectedVersion) -> Result<Batch, StoreError> {
        let key = BatchKey {
            actor_id: batch.actor_id.clone(),
            batch_id: batch.id.clone(),
        };
        let mut batches = self.batches.write().map_err(poisoned)?;

        let actual = batches.get(&key).map(|b| b.version).unwrap_or(0);
        if !expected.matches(actual) {
            return Err(StoreError::Conflict {
                key: format!("{}/{}", key.actor_id, key.batch_id),
                expected,
                actual,
            });
        }

        batch.version = actual + 1;
        batches.insert(key, batch.clone());
        Ok(batch)
    }

    fn remove_batch(&self, actor_id: &ActorId, batch_id: &BatchId) -> Result<(), StoreError> {
        let mut batches = self.batches.write().map_err(poisoned)?;
        let key = BatchKey {
            actor_id: actor_id.clone(),
            batch_id: batch_id.clone(),
        };
        batches
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{actor_id}/{batch_id}")))
    }

    fn list_batches_by_actor(&self, actor_id: &ActorId) -> Result<Vec<Batch>, StoreError> {
        let batches = self.batches.read().map_err(poisoned)?;
        let mut result: Vec<_> = batches
            .values()
            .filter(|b| &b.actor_id == actor_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(result)
    }

    fn get_actor(&self, actor_id: &ActorId) -> Result<Option<Actor>, StoreError> {
        let actors = self.actors.read().map_err(poisoned)?;
        Ok(actors.get(actor_id).cloned())
    }

    fn insert_actor(&self, actor: Actor) -> Result<(), StoreError> {
        let mut actors = self.actors.write().map_err(poisoned)?;
        if actors.contains_key(&actor.id) {
            return Err(StoreError::AlreadyExists(actor.id.into_string()));
        }
        actors.insert(actor.id.clone(), actor);
        Ok(())
    }

    fn get_item(&self, actor_id: &ActorId, item_id: &ItemId) -> Result<Option<Item>, StoreError> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items
            .get(&ItemKey {
                actor_id: actor_id.clone(),
                item_id: item_id.clone(),
            })
            .cloned())
    }

    fn insert_item(&self, item: Item) -> Result<(), StoreError> {
        let key = ItemKey {
            actor_id: item.actor_id.clone(),
            item_id: item.id.clone(),
        };
        let mut items = self.items.write().map_err(poisoned)?;
        if items.contains_key(&key) {
            return Err(StoreError::AlreadyExists(item.id.into_string()));
        }
        items.insert(key, item);
        Ok(())
    }

    fn get_location(
        &self,
        actor_id: &ActorId,
        location_id: &LocationId,
    ) -> Result<Option<Location>, StoreError> {
        let locations = self.locations.read().map_err(poisoned)?;
        Ok(locations
            .get(&LocationKey {
                actor_id: actor_id.clone(),
                location_id: location_id.clone(),
            })
            .cloned())
    }

    fn insert_location(&self, location: Location) -> Result<(), StoreError> {
        let key = LocationKey {
            actor_id: location.actor_id.clone(),
            location_id: location.id.clone(),
        };
        let mut locations = self.locations.write().map_err(poisoned)?;
        if locations.contains_key(&key) {
            return Err(StoreError::AlreadyExists(location.id.into_string()));
        }
        locations.insert(key, location);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn actor_id() -> ActorId {
        ActorId::new("acme-farm").unwrap()
    }

    fn batch(id: &str) -> Batch {
        Batch::new(
            BatchId::new(id).unwrap(),
            actor_id(),
            ItemId::new("garlic").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn insert_assigns_version_one() {
        let store = InMemoryEntityStore::new();
        let stored = store.put_batch(batch("b1"), ExpectedVersion::Any).unwrap();
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let store = InMemoryEntityStore::new();
        let stored = store.put_batch(batch("b1"), ExpectedVersion::Any).unwrap();

        // A concurrent writer moved the record forward.
        store
            .put_batch(stored.clone(), ExpectedVersion::Exact(stored.version))
            .unwrap();

        let err = store
            .put_batch(stored.clone(), ExpectedVersion::Exact(stored.version))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { actual: 2, .. }));
    }

    #[test]
    fn expected_zero_means_fresh_insert() {
        let store = InMemoryEntityStore::new();
        store
            .put_batch(batch("b1"), ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .put_batch(batch("b1"), ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn namespaces_do_not_collide() {
        let store = InMemoryEntityStore::new();
        store.put_batch(batch("b1"), ExpectedVersion::Any).unwrap();

        let mut other = batch("b1");
        other.actor_id = ActorId::new("other-co").unwrap();
        store.put_batch(other, ExpectedVersion::Exact(0)).unwrap();

        assert_eq!(
            store.list_batches_by_actor(&actor_id()).unwrap().len(),
            1
        );
    }

    #[test]
    fn remove_supports_rollback() {
        let store = InMemoryEntityStore::new();
        let stored = store.put_batch(batch("b1"), ExpectedVersion::Any).unwrap();

        store.remove_batch(&stored.actor_id, &stored.id).unwrap();
        assert!(store
            .get_batch(&stored.actor_id, &stored.id)
            .unwrap()
            .is_none());

        let err = store.remove_batch(&stored.actor_id, &stored.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn catalog_inserts_reject_duplicates() {
        let store = InMemoryEntityStore::new();
        let item = Item {
            id: ItemId::new("garlic").unwrap(),
            actor_id: actor_id(),
            name: "Garlic".to_string(),
            category: None,
            unit: Some("kg".to_string()),
            created_at: Utc::now(),
        };
        store.insert_item(item.clone()).unwrap();
        assert!(matches!(
            store.insert_item(item),
            Err(StoreError::AlreadyExists(_))
        ));
    }
}
