//! `tracelot-store` — keyed record store for actors, items, batches and
//! locations.
//!
//! The store holds no business logic beyond optimistic-version reads and
//! writes. Batches are the only records the core mutates (status
//! transitions inside an operation's atomic unit); everything else is a
//! read-only catalog seeded by collaborators.

pub mod in_memory;
pub mod store;

pub use in_memory::InMemoryEntityStore;
pub use store::{EntityStore, StoreError};
