//! The Event record and its kind vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tracelot_core::{ActorId, BatchId, BatchRef, EventId, LocationId, ProcessId, TraceError};

/// What an event records.
///
/// `Processing`, `Split`, `Merge` and `Disposal` are the transforming
/// kinds: the composite operations that create batches and drive status
/// transitions. The remaining kinds are observations: they cite batches
/// without changing their state. `Custom` covers `x-`-prefixed extension
/// kinds from the interchange format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventKind {
    Harvest,
    Processing,
    Packaging,
    Receiving,
    Shipping,
    StorageMove,
    QualityCheck,
    Split,
    Merge,
    Disposal,
    Custom(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Harvest => "harvest",
            EventKind::Processing => "processing",
            EventKind::Packaging => "packaging",
            EventKind::Receiving => "receiving",
            EventKind::Shipping => "shipping",
            EventKind::StorageMove => "storage_move",
            EventKind::QualityCheck => "quality_check",
            EventKind::Split => "split",
            EventKind::Merge => "merge",
            EventKind::Disposal => "disposal",
            EventKind::Custom(s) => s,
        }
    }

    /// Kinds the operation executor emits with state effects attached.
    pub fn is_transforming(&self) -> bool {
        matches!(
            self,
            EventKind::Processing | EventKind::Split | EventKind::Merge | EventKind::Disposal
        )
    }

    pub fn parse(s: &str) -> Result<Self, TraceError> {
        let kind = match s {
            "harvest" => EventKind::Harvest,
            "processing" => EventKind::Processing,
            "packaging" => EventKind::Packaging,
            "receiving" => EventKind::Receiving,
            "shipping" => EventKind::Shipping,
            "storage_move" => EventKind::StorageMove,
            "quality_check" => EventKind::QualityCheck,
            "split" => EventKind::Split,
            "merge" => EventKind::Merge,
            "disposal" => EventKind::Disposal,
            custom if custom.starts_with("x-") => EventKind::Custom(custom.to_string()),
            other => {
                return Err(TraceError::validation(format!(
                    "unknown event kind: {other:?} (custom kinds must start with \"x-\")"
                )));
            }
        };
        Ok(kind)
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventKind> for String {
    fn from(value: EventKind) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for EventKind {
    type Error = TraceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventKind::parse(&value)
    }
}

/// An immutable, append-only record of one operation.
///
/// `timestamp` is business time (caller-supplied, defaulting to now);
/// `recorded_at` is when the executor committed the event. Input and output
/// lists are ordered as cited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub actor_id: ActorId,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<BatchRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<BatchRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packaging_materials: Vec<BatchRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<ProcessId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Event {
    pub fn new(id: EventId, actor_id: ActorId, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            actor_id,
            kind,
            timestamp,
            inputs: Vec::new(),
            outputs: Vec::new(),
            packaging_materials: Vec::new(),
            process_id: None,
            location_id: None,
            performed_by: None,
            notes: None,
            recorded_at: timestamp,
        }
    }

    /// Whether this event cites `batch_id` (owned by this event's actor)
    /// as an input.
    pub fn cites_as_input(&self, batch_id: &BatchId) -> bool {
        self.inputs
            .iter()
            .any(|r| &r.batch_id == batch_id && !r.is_foreign(&self.actor_id))
    }

    /// Whether this event cites `batch_id` (owned by this event's actor)
    /// as an output.
    pub fn cites_as_output(&self, batch_id: &BatchId) -> bool {
        self.outputs
            .iter()
            .any(|r| &r.batch_id == batch_id && !r.is_foreign(&self.actor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelot_core::BatchRef;

    #[test]
    fn kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventKind::StorageMove).unwrap(),
            "\"storage_move\""
        );
        let parsed: EventKind = serde_json::from_str("\"split\"").unwrap();
        assert_eq!(parsed, EventKind::Split);
    }

    #[test]
    fn custom_kinds_require_prefix() {
        assert_eq!(
            EventKind::parse("x-fermentation").unwrap(),
            EventKind::Custom("x-fermentation".to_string())
        );
        assert!(EventKind::parse("fermentation").is_err());
    }

    #[test]
    fn citation_checks_ignore_foreign_refs() {
        let actor = ActorId::new("acme").unwrap();
        let supplier = ActorId::new("supplier-x").unwrap();
        let lot = BatchId::new("lot-1").unwrap();

        let mut event = Event::new(
            EventId::new("evt-1").unwrap(),
            actor,
            EventKind::Processing,
            Utc::now(),
        );
        event.inputs.push(BatchRef::foreign(lot.clone(), supplier));

        // Same id, but owned by a different namespace.
        assert!(!event.cites_as_input(&lot));
    }
}
