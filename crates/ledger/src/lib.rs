//! `tracelot-ledger` — append-only log of transformation events.
//!
//! Events are immutable facts: each one records one operation, referencing
//! zero or more input batches and producing zero or more output batches.
//! The ledger is the single source of truth for lineage; batch status in
//! the entity store is a derived cache kept consistent by the executor.

pub mod event;
pub mod in_memory;
pub mod ledger;

pub use event::{Event, EventKind};
pub use in_memory::InMemoryEventLedger;
pub use ledger::{EventLedger, LedgerError};
