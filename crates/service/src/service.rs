//! The trace service: one entry point per external capability.

use serde::{Deserialize, Serialize};
use tracing::debug;

use tracelot_core::{ActorId, Batch, BatchId, TraceError, TraceResult};
use tracelot_engine::{
    DisposeBatch, ExecutorConfig, MergeBatches, OperationExecutor, ProductionRun,
    RecordObservation, ReconcileReport, RegisterBatch, SplitBatch,
};
use tracelot_ledger::{Event, EventLedger};
use tracelot_lineage::{LineageBuilder, LineageGraph, LineageTree};
use tracelot_store::EntityStore;

/// One state-changing request, dispatched by kind.
///
/// The payloads are the executor's own request types, so the service adds
/// no translation layer; this enum exists so callers (HTTP handlers,
/// queue consumers) can carry "an operation" as one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationRequest {
    Production(ProductionRun),
    Split(SplitBatch),
    Merge(MergeBatches),
    Dispose(DisposeBatch),
    Observation(RecordObservation),
}

impl OperationRequest {
    pub fn actor_id(&self) -> &ActorId {
        match self {
            OperationRequest::Production(r) => &r.actor_id,
            OperationRequest::Split(r) => &r.actor_id,
            OperationRequest::Merge(r) => &r.actor_id,
            OperationRequest::Dispose(r) => &r.actor_id,
            OperationRequest::Observation(r) => &r.actor_id,
        }
    }
}

/// Facade over the executor, the lineage builder and the entity store.
///
/// Cheaply cloneable store/ledger handles (e.g. `Arc`-wrapped in-memory
/// implementations, pooled clients) are cloned into both sides; the
/// executor keeps the only lock coordinator, lineage reads stay lock-free.
pub struct TraceService<S, L> {
    executor: OperationExecutor<S, L>,
    lineage: LineageBuilder<S, L>,
    store: S,
}

impl<S, L> TraceService<S, L>
where
    S: EntityStore + Clone,
    L: EventLedger + Clone,
{
    pub fn new(store: S, ledger: L) -> Self {
        Self::with_config(store, ledger, ExecutorConfig::default())
    }

    pub fn with_config(store: S, ledger: L, config: ExecutorConfig) -> Self {
        Self {
            executor: OperationExecutor::with_config(store.clone(), ledger.clone(), config),
            lineage: LineageBuilder::new(store.clone(), ledger),
            store,
        }
    }

    /// Execute one state-changing operation atomically.
    pub fn execute(&self, request: OperationRequest) -> TraceResult<Event> {
        debug!(actor = %request.actor_id(), "operation request");
        match request {
            OperationRequest::Production(r) => self.executor.production_run(r),
            OperationRequest::Split(r) => self.executor.split_batch(r),
            OperationRequest::Merge(r) => self.executor.merge_batches(r),
            OperationRequest::Dispose(r) => self.executor.dispose_batch(r),
            OperationRequest::Observation(r) => self.executor.record_observation(r),
        }
    }

    /// Register a root batch (no event).
    pub fn register_batch(&self, request: RegisterBatch) -> TraceResult<Batch> {
        self.executor.register_batch(request)
    }

    /// Recompute and repair a batch's cached status from the ledger.
    pub fn reconcile_status(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
    ) -> TraceResult<ReconcileReport> {
        self.executor.reconcile_status(actor_id, batch_id)
    }

    pub fn upstream(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
        max_depth: u32,
    ) -> TraceResult<LineageTree> {
        self.lineage.upstream(actor_id, batch_id, max_depth)
    }

    pub fn downstream(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
        max_depth: u32,
    ) -> TraceResult<LineageTree> {
        self.lineage.downstream(actor_id, batch_id, max_depth)
    }

    pub fn graph(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
        max_depth: u32,
    ) -> TraceResult<LineageGraph> {
        self.lineage.graph(actor_id, batch_id, max_depth)
    }

    /// Read passthrough for UI rendering.
    pub fn get_batch(&self, actor_id: &ActorId, batch_id: &BatchId) -> TraceResult<Batch> {
        self.store
            .get_batch(actor_id, batch_id)?
            .ok_or_else(|| TraceError::not_found(format!("batch {actor_id}/{batch_id}")))
    }
}
