//! Domain error model.

use thiserror::Error;

use crate::batch::BatchStatus;
use crate::id::{BatchId, EventId};

/// Result type used across the domain layer.
pub type TraceResult<T> = Result<T, TraceError>;

/// Domain-level error.
///
/// Every variant is a recoverable, caller-reportable condition; none of
/// these represent programmer bugs. The core never logs, retries, or masks
/// them; mapping to user-visible responses belongs to the API layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TraceError {
    /// A value failed validation (e.g. malformed input, empty output list).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record is absent from its namespace.
    #[error("not found: {0}")]
    NotFound(String),

    /// A batch was cited as an operation input while not in an eligible
    /// status (`active` or `quarantined`).
    #[error("batch {batch_id} is not available as an input (status: {status})")]
    InsufficientState {
        batch_id: BatchId,
        status: BatchStatus,
    },

    /// An output identifier is already taken in the actor's namespace.
    #[error("identifier already in use: {0}")]
    IdentifierConflict(String),

    /// The event identifier already exists in the actor's ledger. Event
    /// ids double as idempotency keys, so this is how a replayed request
    /// surfaces.
    #[error("duplicate event id: {0}")]
    DuplicateEventId(EventId),

    /// A required lock could not be acquired within the configured budget.
    #[error("lock acquisition timed out on {key} after {waited_ms}ms")]
    LockTimeout { key: String, waited_ms: u64 },

    /// Optimistic version mismatch (stale read).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was malformed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl TraceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn identifier_conflict(id: impl Into<String>) -> Self {
        Self::IdentifierConflict(id.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn insufficient_state(batch_id: BatchId, status: BatchStatus) -> Self {
        Self::InsufficientState { batch_id, status }
    }
}
