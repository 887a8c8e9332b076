//! Status reconciliation: recompute a batch's status from the ledger.
//!
//! The status field on a batch record is a cache; the ledger is canonical.
//! The executor keeps the two consistent inside each atomic unit, but the
//! cache can still drift (manual edits, a restored backup, a buggy
//! collaborator). Reconciliation is the explicit repair/audit path; it is
//! never invoked implicitly on reads.

use serde::{Deserialize, Serialize};

use tracelot_core::{Batch, BatchId, BatchStatus};
use tracelot_ledger::{Event, EventKind};

/// Recompute the canonical status of `batch_id` from the events citing it.
///
/// `events` must be the referencing events in ledger order (timestamp
/// ascending). A split or merge citing the batch as an input consumes it
/// (`depleted`); a disposal disposes it; later citations win. A batch no
/// transforming event consumed is `active`.
///
/// Quarantine, recall and expiry are collaborator-asserted states with no
/// ledger representation, so they cannot be derived here; see
/// [`should_repair`] for how they are treated.
pub fn derive_status(batch_id: &BatchId, events: &[Event]) -> BatchStatus {
    let mut status = BatchStatus::Active;
    for event in events {
        if !event.cites_as_input(batch_id) {
            continue;
        }
        match event.kind {
            EventKind::Split | EventKind::Merge => status = BatchStatus::Depleted,
            EventKind::Disposal => status = BatchStatus::Disposed,
            _ => {}
        }
    }
    status
}

/// Whether a drifted cache should be overwritten with the derived status.
///
/// The ledger wins whenever it proves consumption (`depleted`/`disposed`),
/// and whenever the cache claims a consumption the ledger does not show.
/// Collaborator-asserted holds (`quarantined`, `recalled`, `expired`) are
/// preserved: the ledger cannot see them, so their absence is not drift.
pub fn should_repair(cached: BatchStatus, derived: BatchStatus) -> bool {
    if cached == derived {
        return false;
    }
    match derived {
        BatchStatus::Depleted | BatchStatus::Disposed => true,
        _ => matches!(cached, BatchStatus::Depleted | BatchStatus::Disposed),
    }
}

/// Outcome of one reconciliation pass over a single batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub batch_id: BatchId,
    pub cached: BatchStatus,
    pub derived: BatchStatus,
    pub repaired: bool,
}

impl ReconcileReport {
    pub fn clean(batch: &Batch, derived: BatchStatus) -> Self {
        Self {
            batch_id: batch.id.clone(),
            cached: batch.status,
            derived,
            repaired: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tracelot_core::{ActorId, BatchRef, EventId};

    fn event(id: &str, kind: EventKind, input: &BatchId, ts: i64) -> Event {
        let mut e = Event::new(
            EventId::new(id).unwrap(),
            ActorId::new("acme").unwrap(),
            kind,
            Utc.timestamp_opt(ts, 0).unwrap(),
        );
        e.inputs.push(BatchRef::local(input.clone()));
        e
    }

    #[test]
    fn unreferenced_batch_is_active() {
        let id = BatchId::new("b1").unwrap();
        assert_eq!(derive_status(&id, &[]), BatchStatus::Active);
    }

    #[test]
    fn split_input_derives_depleted() {
        let id = BatchId::new("b1").unwrap();
        let events = [event("e1", EventKind::Split, &id, 100)];
        assert_eq!(derive_status(&id, &events), BatchStatus::Depleted);
    }

    #[test]
    fn disposal_wins_over_earlier_observations() {
        let id = BatchId::new("b1").unwrap();
        let events = [
            event("e1", EventKind::QualityCheck, &id, 100),
            event("e2", EventKind::Disposal, &id, 200),
        ];
        assert_eq!(derive_status(&id, &events), BatchStatus::Disposed);
    }

    #[test]
    fn observations_do_not_consume() {
        let id = BatchId::new("b1").unwrap();
        let events = [
            event("e1", EventKind::Shipping, &id, 100),
            event("e2", EventKind::QualityCheck, &id, 200),
        ];
        assert_eq!(derive_status(&id, &events), BatchStatus::Active);
    }

    #[test]
    fn repair_rules() {
        use BatchStatus::*;
        // Ledger proves consumption: always repair.
        assert!(should_repair(Active, Depleted));
        assert!(should_repair(Quarantined, Disposed));
        // Cache claims consumption the ledger does not show: repair back.
        assert!(should_repair(Depleted, Active));
        // Collaborator-asserted holds are not drift.
        assert!(!should_repair(Quarantined, Active));
        assert!(!should_repair(Recalled, Active));
        assert!(!should_repair(Expired, Active));
        // Agreement.
        assert!(!should_repair(Active, Active));
        assert!(!should_repair(Depleted, Depleted));
    }
}
