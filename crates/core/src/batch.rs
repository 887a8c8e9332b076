//! Batch: the smallest traceable lot of material.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TraceError, TraceResult};
use crate::id::{ActorId, BatchId, ItemId, LocationId};
use crate::quantity::Quantity;

/// Lifecycle status of a batch.
///
/// `Active` and `Quarantined` are the only statuses from which a batch may
/// be cited as an operation input; the rest are terminal. The status field
/// on [`Batch`] is a maintained cache; the ledger is the canonical record,
/// and `tracelot-engine` exposes an explicit reconciliation that recomputes
/// it from events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Active,
    Depleted,
    Quarantined,
    Recalled,
    Expired,
    Disposed,
}

impl BatchStatus {
    /// Whether a batch in this status may be cited as an operation input.
    pub fn is_eligible_input(self) -> bool {
        matches!(self, BatchStatus::Active | BatchStatus::Quarantined)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_eligible_input()
    }

    /// Wire name, matching the interchange document format.
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Depleted => "depleted",
            BatchStatus::Quarantined => "quarantined",
            BatchStatus::Recalled => "recalled",
            BatchStatus::Expired => "expired",
            BatchStatus::Disposed => "disposed",
        }
    }
}

impl core::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a batch came into existence.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOrigin {
    Harvested,
    Received,
    Transformed,
    Split,
    Merged,
}

/// The unit of traceability.
///
/// Quantity is set at creation and never decremented by partial
/// consumption; full depletion is a terminal status transition driven by
/// the operation that used the batch up. `version` is the optimistic
/// concurrency token assigned by the entity store on each write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub actor_id: ActorId,
    pub item_id: ItemId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<BatchOrigin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Batch {
    /// A fresh `active` batch with no optional metadata.
    pub fn new(id: BatchId, actor_id: ActorId, item_id: ItemId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            actor_id,
            item_id,
            quantity: None,
            status: BatchStatus::Active,
            location_id: None,
            origin: None,
            production_date: None,
            expiration_date: None,
            created_at: at,
            updated_at: at,
            version: 0,
        }
    }

    /// Shape validation for newly-registered batches.
    pub fn validate(&self) -> TraceResult<()> {
        if let (Some(produced), Some(expires)) = (self.production_date, self.expiration_date) {
            if expires <= produced {
                return Err(TraceError::validation(format!(
                    "expiration date ({expires}) must be after production date ({produced})"
                )));
            }
        }
        Ok(())
    }

    /// Apply a status transition, enforcing the lifecycle map.
    ///
    /// Eligible statuses may move to any other status (quarantine release
    /// included); terminal statuses never move again.
    pub fn transition(&mut self, to: BatchStatus, at: DateTime<Utc>) -> TraceResult<()> {
        if self.status == to {
            return Err(TraceError::validation(format!(
                "batch {} is already {to}",
                self.id
            )));
        }
        if self.status.is_terminal() {
            return Err(TraceError::insufficient_state(self.id.clone(), self.status));
        }
        self.status = to;
        self.updated_at = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Batch {
        Batch::new(
            BatchId::new("garlic-raw-01").unwrap(),
            ActorId::new("acme-farm").unwrap(),
            ItemId::new("garlic").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn eligibility() {
        assert!(BatchStatus::Active.is_eligible_input());
        assert!(BatchStatus::Quarantined.is_eligible_input());
        for s in [
            BatchStatus::Depleted,
            BatchStatus::Recalled,
            BatchStatus::Expired,
            BatchStatus::Disposed,
        ] {
            assert!(s.is_terminal(), "{s} should be terminal");
        }
    }

    #[test]
    fn active_batch_can_deplete() {
        let mut b = batch();
        b.transition(BatchStatus::Depleted, Utc::now()).unwrap();
        assert_eq!(b.status, BatchStatus::Depleted);
    }

    #[test]
    fn quarantine_release() {
        let mut b = batch();
        b.transition(BatchStatus::Quarantined, Utc::now()).unwrap();
        b.transition(BatchStatus::Active, Utc::now()).unwrap();
        assert_eq!(b.status, BatchStatus::Active);
    }

    #[test]
    fn terminal_status_is_final() {
        let mut b = batch();
        b.transition(BatchStatus::Disposed, Utc::now()).unwrap();
        let err = b.transition(BatchStatus::Active, Utc::now()).unwrap_err();
        assert!(matches!(err, TraceError::InsufficientState { .. }));
    }

    #[test]
    fn self_transition_rejected() {
        let mut b = batch();
        assert!(matches!(
            b.transition(BatchStatus::Active, Utc::now()),
            Err(TraceError::Validation(_))
        ));
    }

    #[test]
    fn date_order_validated() {
        let mut b = batch();
        b.production_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        b.expiration_date = NaiveDate::from_ymd_opt(2025, 5, 1);
        assert!(b.validate().is_err());

        b.expiration_date = NaiveDate::from_ymd_opt(2025, 12, 1);
        assert!(b.validate().is_ok());
    }

    #[test]
    fn status_wire_names() {
        let json = serde_json::to_string(&BatchStatus::Quarantined).unwrap();
        assert_eq!(json, "\"quarantined\"");
    }
}
