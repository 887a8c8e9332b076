//! `tracelot-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives for batch traceability
//! (no infrastructure concerns): identifiers, the error taxonomy, the
//! `Batch` lifecycle model, catalog records, and event references.

pub mod batch;
pub mod catalog;
pub mod error;
pub mod id;
pub mod quantity;
pub mod reference;
pub mod version;

pub use batch::{Batch, BatchOrigin, BatchStatus};
pub use catalog::{Actor, Item, Location};
pub use error::{TraceError, TraceResult};
pub use id::{ActorId, BatchId, EventId, ItemId, LocationId, ProcessId};
pub use quantity::Quantity;
pub use reference::BatchRef;
pub use version::ExpectedVersion;
