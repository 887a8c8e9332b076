//! `tracelot-engine` — the batch lifecycle engine.
//!
//! Composes the entity store and the event ledger into atomic composite
//! operations (production run, split, merge, disposal), guarded by a
//! deterministic lock coordinator, plus the explicit status-reconciliation
//! path. Stores are injected through their traits; this crate performs no
//! IO of its own.

pub mod executor;
pub mod locks;
pub mod reconcile;
pub mod validation;


pub use executor::{
    DisposeBatch, ExecutorConfig, MergeBatches, OperationExecutor, OutputSpec, ProductionRun,
    RecordObservation, RegisterBatch, SplitBatch,
};
pub use locks::{LockCoordinator, LockGuard, LockKey};
pub use reconcile::{derive_status, should_repair, ReconcileReport};
