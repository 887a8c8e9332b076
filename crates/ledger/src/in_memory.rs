//! In-memory append-only event ledger.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tracing::debug;

use tracelot_core::{ActorId, BatchId, EventId};

use crate::event::Event;
use crate::ledger::{EventLedger, LedgerError};

#[derive(Debug, Default)]
struct ActorLog {
    // Insertion order; list reads sort stably by timestamp on the way out.
    events: Vec<Event>,
    ids: HashSet<EventId>,
}

/// In-memory event ledger.
///
/// Intended for tests/dev. Not optimized for performance: `list_referencing`
/// is a filtered scan, not an index.
#[derive(Debug, Default)]
pub struct InMemoryEventLedger {
    logs: RwLock<HashMap<ActorId, ActorLog>>,
}

impl InMemoryEventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut events: Vec<Event>) -> Vec<Event> {
        // Stable sort: insertion order breaks timestamp ties.
        events.sort_by_key(|e| e.timestamp);
        events
    }
}

impl EventLedger for InMemoryEventLedger {
    fn append(&self, event: Event) -> Result<Event, LedgerError> {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;

        let log = logs.entry(event.actor_id.clone()).or_default();
        if log.ids.contains(&event.id) {
            return Err(LedgerError::DuplicateEventId(event.id));
        }

        debug!(
            actor = %event.actor_id,
            event = %event.id,
            kind = %event.kind,
            inputs = event.inputs.len(),
            outputs = event.outputs.len(),
            "ledger append"
        );

        log.ids.insert(event.id.clone());
        log.events.push(event.clone());
        Ok(event)
    }

    fn contains(&self, actor_id: &ActorId, event_id: &EventId) -> Result<bool, LedgerError> {
        let logs = self
            .logs
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        Ok(logs
            .get(actor_id)
            .is_some_and(|log| log.ids.contains(event_id)))
    }

    fn list_by_actor(&self, actor_id: &ActorId) -> Result<Vec<Event>, LedgerError> {
        let logs = self
            .logs
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        Ok(Self::sorted(
            logs.get(actor_id)
                .map(|log| log.events.clone())
                .unwrap_or_default(),
        ))
    }

    fn list_referencing(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
    ) -> Result<Vec<Event>, LedgerError> {
        let logs = self
            .logs
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        let events = logs
            .get(actor_id)
            .map(|log| {
                log.events
                    .iter()
                    .filter(|e| e.cites_as_input(batch_id) || e.cites_as_output(batch_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self::sorted(events))
    }
}
