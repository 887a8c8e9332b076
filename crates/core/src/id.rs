//! Strongly-typed identifiers used across the domain.
//!
//! Identifiers here are caller-chosen strings (e.g. `garlic-raw-01`), unique
//! within their owning actor's namespace. They are intentionally not UUIDs:
//! the interchange format carries human-assigned slugs, and uniqueness is a
//! per-namespace concern enforced by the stores, not by the id type.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TraceError;

/// Identifier of an actor (owning namespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

/// Identifier of a catalog item, scoped to one actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

/// Identifier of a batch, scoped to one actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

/// Identifier of a ledger event, scoped to one actor.
///
/// Event ids double as idempotency keys for the append-only ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

/// Identifier of a location, scoped to one actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

/// Identifier of a process (recipe/procedure), scoped to one actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(String);

macro_rules! impl_str_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw string, rejecting empty or padded values.
            pub fn new(value: impl Into<String>) -> Result<Self, TraceError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(TraceError::invalid_id(concat!($name, " cannot be empty")));
                }
                if value.trim() != value {
                    return Err(TraceError::invalid_id(format!(
                        concat!($name, " has surrounding whitespace: {:?}"),
                        value
                    )));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = TraceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

impl_str_newtype!(ActorId, "ActorId");
impl_str_newtype!(ItemId, "ItemId");
impl_str_newtype!(BatchId, "BatchId");
impl_str_newtype!(EventId, "EventId");
impl_str_newtype!(LocationId, "LocationId");
impl_str_newtype!(ProcessId, "ProcessId");

impl EventId {
    /// Generate a fresh event id for callers that do not supply their own
    /// idempotency key.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing ids explicitly in tests
    /// for determinism.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_slug_identifiers() {
        let id = BatchId::new("garlic-raw-01").unwrap();
        assert_eq!(id.as_str(), "garlic-raw-01");
        assert_eq!(id.to_string(), "garlic-raw-01");
    }

    #[test]
    fn rejects_empty_and_padded() {
        assert!(matches!(BatchId::new(""), Err(TraceError::InvalidId(_))));
        assert!(matches!(
            ActorId::new(" acme "),
            Err(TraceError::InvalidId(_))
        ));
    }

    #[test]
    fn parse_roundtrip() {
        let id: EventId = "evt-001".parse().unwrap();
        assert_eq!(id.as_str(), "evt-001");
    }

    #[test]
    fn generated_event_ids_are_distinct() {
        assert_ne!(EventId::generate(), EventId::generate());
    }
}
