//! Read-only catalog records: actors, items, locations.
//!
//! The core never mutates these. They exist so operations and lineage nodes
//! can resolve names and units for rendering; creating and editing them is
//! a collaborator concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ActorId, ItemId, LocationId};

/// An owning namespace (business/organization). Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A catalog definition (ingredient, product, packaging), scoped to one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub actor_id: ActorId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A physical or logical place, scoped to one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub actor_id: ActorId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub created_at: DateTime<Utc>,
}
