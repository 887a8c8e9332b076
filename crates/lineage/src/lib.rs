//! `tracelot-lineage` — provenance graph reconstruction.
//!
//! A pure read algorithm over a ledger snapshot: no locks, no state
//! machine, no writes. Upstream walks from a batch to its ancestry
//! (events that produced it), downstream to its descendants (events that
//! consumed it); both are bounded by depth, deterministic, cycle-safe and
//! stop at cross-namespace references.

pub mod builder;
pub mod tree;

pub use builder::LineageBuilder;
pub use tree::{Direction, LineageGraph, LineageLink, LineageNode, LineageTree, Termination};
