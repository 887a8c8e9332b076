//! The operation executor: atomic composite state transitions.
//!
//! ## Execution flow
//!
//! Every operation runs the same pipeline:
//!
//! ```text
//! Request
//!   ↓
//! 1. Collect the full lock set (inputs ∪ outputs ∪ packaging) and acquire
//!    it in canonical order (suspends here, bounded by the lock budget)
//!   ↓
//! 2. Validate against the stores (first failure wins, nothing written)
//!   ↓
//! 3. Commit: create output batches, apply status transitions, append the
//!    ledger event last; any failure unwinds the journal in reverse
//!   ↓
//! 4. Release locks (guard drop, reverse order)
//! ```
//!
//! Validation-then-commit, not commit-then-compensate: a request that fails
//! validation has touched nothing. The rollback journal exists only for
//! commit-phase store failures and is never observable as partial state.
//! No operation retries automatically; retry policy belongs to the caller.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tracelot_core::{
    ActorId, Batch, BatchId, BatchOrigin, BatchRef, BatchStatus, EventId, ExpectedVersion, ItemId,
    LocationId, ProcessId, Quantity, TraceError, TraceResult,
};
use tracelot_ledger::{Event, EventKind, EventLedger};
use tracelot_store::EntityStore;

use crate::locks::{LockCoordinator, LockKey};
use crate::reconcile::{self, ReconcileReport};
use crate::validation;

/// Tunables for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// How long one operation may wait for its lock set before failing
    /// with `LockTimeout`.
    pub lock_timeout: Duration,
    /// Switch on the optional quantity-bound checks (see
    /// [`crate::validation`]). Off by default: conservation of mass is a
    /// policy, not an invariant.
    pub enforce_quantity_bounds: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            enforce_quantity_bounds: false,
        }
    }
}

/// Declaration of one output batch an operation will create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub batch_id: BatchId,
    /// Required for production outputs; split/merge outputs inherit the
    /// source item and may only restate it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
}

/// Production run: consume inputs (without depleting them), create outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRun {
    pub actor_id: ActorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<ProcessId>,
    #[serde(default)]
    pub inputs: Vec<BatchRef>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub packaging_materials: Vec<BatchRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Split one source batch into two or more new batches; the source is
/// depleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitBatch {
    pub actor_id: ActorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub source_batch_id: BatchId,
    pub outputs: Vec<OutputSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Merge two or more source batches into one new batch; all sources are
/// depleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeBatches {
    pub actor_id: ActorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub source_batch_ids: Vec<BatchId>,
    pub output: OutputSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Dispose of a batch (waste, damage, recall follow-up).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisposeBatch {
    pub actor_id: ActorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub batch_id: BatchId,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Record a non-transforming event (shipping, storage move, quality check,
/// custom `x-` kinds): batches are cited but their state is untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordObservation {
    pub actor_id: ActorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub kind: EventKind,
    pub batches: Vec<BatchRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Register a root batch (harvested/received material) directly in the
/// entity store. No event is appended: root batches are exactly the lineage
/// traversal roots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterBatch {
    pub actor_id: ActorId,
    pub batch_id: BatchId,
    pub item_id: ItemId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<BatchOrigin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_date: Option<chrono::NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<chrono::NaiveDate>,
}

/// A validated operation ready to commit.
struct Plan {
    event: Event,
    creates: Vec<Batch>,
    /// `(loaded batch, target status)`, loaded under the operation's
    /// locks, so the version cannot move before commit.
    transitions: Vec<(Batch, BatchStatus)>,
}

/// One applied store write, recorded so a failed commit can unwind.
enum Applied {
    Created { actor_id: ActorId, batch_id: BatchId },
    Updated { prior: Batch },
}

/// Executes the composite state-changing operations as atomic units.
///
/// The store and ledger are injected (any implementation of the traits);
/// the lock coordinator is owned, one per executor. Share the executor
/// itself (e.g. behind `Arc`) to serialize operations over the same batch
/// identifiers.
pub struct OperationExecutor<S, L> {
    store: S,
    ledger: L,
    locks: LockCoordinator,
    config: ExecutorConfig,
}

impl<S, L> OperationExecutor<S, L> {
    pub fn new(store: S, ledger: L) -> Self {
        Self::with_config(store, ledger, ExecutorConfig::default())
    }

    pub fn with_config(store: S, ledger: L, config: ExecutorConfig) -> Self {
        Self {
            store,
            ledger,
            locks: LockCoordinator::new(),
            config,
        }
    }
}

impl<S, L> OperationExecutor<S, L>
where
    S: EntityStore,
    L: EventLedger,
{
    /// Record a production run.
    ///
    /// Inputs must be eligible but are *not* depleted; partial consumption
    /// is the deliberate policy difference from split/merge, where the
    /// operation by definition uses its sources up.
    pub fn production_run(&self, req: ProductionRun) -> TraceResult<Event> {
        let now = Utc::now();
        let timestamp = req.timestamp.unwrap_or(now);
        let event_id = req.event_id.clone().unwrap_or_else(EventId::generate);

        if req.inputs.is_empty() && req.outputs.is_empty() {
            return Err(TraceError::validation(
                "a production run must cite at least one input or output",
            ));
        }

        let mut keys = ref_keys(&req.actor_id, req.inputs.iter());
        keys.extend(ref_keys(&req.actor_id, req.packaging_materials.iter()));
        keys.extend(spec_keys(&req.actor_id, &req.outputs));
        let _guard = self.locks.acquire(keys, self.config.lock_timeout)?;

        self.ensure_event_id_free(&req.actor_id, &event_id)?;

        for input in &req.inputs {
            if let Some(batch) = self.load_local_input(&req.actor_id, input)? {
                if self.config.enforce_quantity_bounds {
                    if let Some(cited) = &input.amount {
                        validation::cited_amount_within_stock(&batch, cited)?;
                    }
                }
            }
        }
        self.check_packaging(&req.actor_id, &req.packaging_materials)?;
        self.ensure_output_ids_free(&req.actor_id, &req.outputs)?;

        let mut creates = Vec::with_capacity(req.outputs.len());
        let mut output_refs = Vec::with_capacity(req.outputs.len());
        for spec in &req.outputs {
            let item_id = spec.item_id.clone().ok_or_else(|| {
                TraceError::validation(format!(
                    "production output {} must name an item",
                    spec.batch_id
                ))
            })?;
            let mut batch = Batch::new(spec.batch_id.clone(), req.actor_id.clone(), item_id, now);
            batch.quantity = spec.quantity.clone();
            batch.origin = Some(BatchOrigin::Transformed);
            batch.production_date = Some(timestamp.date_naive());
            batch.location_id = req.location_id.clone();
            creates.push(batch);
            output_refs.push(spec_ref(spec));
        }

        let mut event = Event::new(event_id, req.actor_id.clone(), EventKind::Processing, timestamp);
        event.recorded_at = now;
        event.inputs = req.inputs;
        event.outputs = output_refs;
        event.packaging_materials = req.packaging_materials;
        event.process_id = req.process_id;
        event.location_id = req.location_id;
        event.performed_by = req.performed_by;
        event.notes = req.notes;

        let event = self.commit(
            Plan {
                event,
                creates,
                transitions: Vec::new(),
            },
            now,
        )?;
        info!(actor = %event.actor_id, event = %event.id, outputs = event.outputs.len(), "production run recorded");
        Ok(event)
    }

    /// Split one batch into multiple new batches; the source is depleted.
    pub fn split_batch(&self, req: SplitBatch) -> TraceResult<Event> {
        let now = Utc::now();
        let timestamp = req.timestamp.unwrap_or(now);
        let event_id = req.event_id.clone().unwrap_or_else(EventId::generate);

        if req.outputs.is_empty() {
            return Err(TraceError::validation(
                "a split must declare at least one output batch",
            ));
        }

        let mut keys = vec![LockKey::new(req.actor_id.clone(), req.source_batch_id.clone())];
        keys.extend(spec_keys(&req.actor_id, &req.outputs));
        let _guard = self.locks.acquire(keys, self.config.lock_timeout)?;

        self.ensure_event_id_free(&req.actor_id, &event_id)?;

        let source = self.load_eligible(&req.actor_id, &req.source_batch_id)?;
        self.ensure_output_ids_free(&req.actor_id, &req.outputs)?;

        if self.config.enforce_quantity_bounds {
            validation::split_within_bounds(&source, &req.outputs)?;
        }

        let mut creates = Vec::with_capacity(req.outputs.len());
        let mut output_refs = Vec::with_capacity(req.outputs.len());
        for spec in &req.outputs {
            let item_id = inherited_item(spec, &source)?;
            let mut batch = Batch::new(spec.batch_id.clone(), req.actor_id.clone(), item_id, now);
            batch.quantity = spec.quantity.clone();
            batch.origin = Some(BatchOrigin::Split);
            batch.production_date = source.production_date;
            batch.location_id = req.location_id.clone().or_else(|| source.location_id.clone());
            creates.push(batch);
            output_refs.push(spec_ref(spec));
        }

        let mut source_ref = BatchRef::local(source.id.clone());
        if let Some(qty) = &source.quantity {
            source_ref = source_ref.with_amount(qty.clone());
        }

        let mut event = Event::new(event_id, req.actor_id.clone(), EventKind::Split, timestamp);
        event.recorded_at = now;
        event.inputs = vec![source_ref];
        event.outputs = output_refs;
        event.location_id = req.location_id;
        event.notes = req.notes;

        let event = self.commit(
            Plan {
                event,
                creates,
                transitions: vec![(source, BatchStatus::Depleted)],
            },
            now,
        )?;
        info!(actor = %event.actor_id, event = %event.id, outputs = event.outputs.len(), "batch split");
        Ok(event)
    }

    /// Merge two or more batches into one; every source is depleted.
    pub fn merge_batches(&self, req: MergeBatches) -> TraceResult<Event> {
        let now = Utc::now();
        let timestamp = req.timestamp.unwrap_or(now);
        let event_id = req.event_id.clone().unwrap_or_else(EventId::generate);

        let distinct: HashSet<&BatchId> = req.source_batch_ids.iter().collect();
        if distinct.len() < 2 {
            return Err(TraceError::validation(
                "a merge requires at least two distinct source batches",
            ));
        }
        if distinct.contains(&req.output.batch_id) {
            return Err(TraceError::identifier_conflict(
                req.output.batch_id.as_str(),
            ));
        }

        let mut keys: Vec<LockKey> = req
            .source_batch_ids
            .iter()
            .map(|id| LockKey::new(req.actor_id.clone(), id.clone()))
            .collect();
        keys.push(LockKey::new(
            req.actor_id.clone(),
            req.output.batch_id.clone(),
        ));
        let _guard = self.locks.acquire(keys, self.config.lock_timeout)?;

        self.ensure_event_id_free(&req.actor_id, &event_id)?;

        let mut sources = Vec::with_capacity(req.source_batch_ids.len());
        let mut item_id: Option<ItemId> = None;
        for batch_id in &req.source_batch_ids {
            let batch = self.load_eligible(&req.actor_id, batch_id)?;
            match &item_id {
                None => item_id = Some(batch.item_id.clone()),
                Some(common) if common != &batch.item_id => {
                    return Err(TraceError::validation(
                        "cannot merge batches of different items",
                    ));
                }
                Some(_) => {}
            }
            sources.push(batch);
        }
        let Some(item_id) = item_id else {
            return Err(TraceError::validation(
                "a merge requires at least two distinct source batches",
            ));
        };

        let output_item = inherited_item_from(&req.output, &item_id)?;
        self.ensure_output_ids_free(&req.actor_id, std::slice::from_ref(&req.output))?;

        if self.config.enforce_quantity_bounds {
            validation::merge_within_bounds(&sources, req.output.quantity.as_ref())?;
        }

        let mut output = Batch::new(
            req.output.batch_id.clone(),
            req.actor_id.clone(),
            output_item,
            now,
        );
        output.quantity = req.output.quantity.clone();
        output.origin = Some(BatchOrigin::Merged);
        output.production_date = Some(timestamp.date_naive());
        output.location_id = req.location_id.clone();

        let input_refs = sources
            .iter()
            .map(|b| {
                let mut r = BatchRef::local(b.id.clone());
                if let Some(qty) = &b.quantity {
                    r = r.with_amount(qty.clone());
                }
                r
            })
            .collect();

        let mut event = Event::new(event_id, req.actor_id.clone(), EventKind::Merge, timestamp);
        event.recorded_at = now;
        event.inputs = input_refs;
        event.outputs = vec![spec_ref(&req.output)];
        event.location_id = req.location_id;
        event.notes = req.notes;

        let transitions = sources
            .into_iter()
            .map(|b| (b, BatchStatus::Depleted))
            .collect();

        let event = self.commit(
            Plan {
                event,
                creates: vec![output],
                transitions,
            },
            now,
        )?;
        info!(actor = %event.actor_id, event = %event.id, sources = event.inputs.len(), "batches merged");
        Ok(event)
    }

    /// Dispose of a batch. The batch must still be eligible: disposing
    /// already-consumed material is reported, not absorbed.
    pub fn dispose_batch(&self, req: DisposeBatch) -> TraceResult<Event> {
        let now = Utc::now();
        let timestamp = req.timestamp.unwrap_or(now);
        let event_id = req.event_id.clone().unwrap_or_else(EventId::generate);

        if req.reason.trim().is_empty() {
            return Err(TraceError::validation("disposal requires a reason"));
        }

        let keys = vec![LockKey::new(req.actor_id.clone(), req.batch_id.clone())];
        let _guard = self.locks.acquire(keys, self.config.lock_timeout)?;

        self.ensure_event_id_free(&req.actor_id, &event_id)?;
        let batch = self.load_eligible(&req.actor_id, &req.batch_id)?;

        let mut input_ref = BatchRef::local(batch.id.clone());
        if let Some(qty) = &batch.quantity {
            input_ref = input_ref.with_amount(qty.clone());
        }

        let notes = match req.notes {
            Some(extra) => format!("reason: {}. {extra}", req.reason),
            None => format!("reason: {}", req.reason),
        };

        let mut event = Event::new(event_id, req.actor_id.clone(), EventKind::Disposal, timestamp);
        event.recorded_at = now;
        event.inputs = vec![input_ref];
        event.location_id = req.location_id;
        event.notes = Some(notes);

        let event = self.commit(
            Plan {
                event,
                creates: Vec::new(),
                transitions: vec![(batch, BatchStatus::Disposed)],
            },
            now,
        )?;
        info!(actor = %event.actor_id, event = %event.id, "batch disposed");
        Ok(event)
    }

    /// Record an observation event: cited batches are validated but their
    /// state is untouched and nothing is created.
    pub fn record_observation(&self, req: RecordObservation) -> TraceResult<Event> {
        let now = Utc::now();
        let timestamp = req.timestamp.unwrap_or(now);
        let event_id = req.event_id.clone().unwrap_or_else(EventId::generate);

        if req.kind.is_transforming() {
            return Err(TraceError::validation(format!(
                "event kind '{}' has state effects; use its dedicated operation",
                req.kind
            )));
        }
        if req.batches.is_empty() {
            return Err(TraceError::validation(
                "an observation must cite at least one batch",
            ));
        }

        let keys = ref_keys(&req.actor_id, req.batches.iter());
        let _guard = self.locks.acquire(keys, self.config.lock_timeout)?;

        self.ensure_event_id_free(&req.actor_id, &event_id)?;
        for r in &req.batches {
            self.load_local_input(&req.actor_id, r)?;
        }

        let mut event = Event::new(event_id, req.actor_id.clone(), req.kind.clone(), timestamp);
        event.recorded_at = now;
        event.inputs = req.batches;
        event.location_id = req.location_id;
        event.performed_by = req.performed_by;
        event.notes = req.notes;

        let event = self.commit(
            Plan {
                event,
                creates: Vec::new(),
                transitions: Vec::new(),
            },
            now,
        )?;
        info!(actor = %event.actor_id, event = %event.id, kind = %event.kind, "observation recorded");
        Ok(event)
    }

    /// Register a root batch. No ledger entry: a batch no event produced is
    /// a true lineage root (harvested or received material).
    pub fn register_batch(&self, req: RegisterBatch) -> TraceResult<Batch> {
        let now = Utc::now();

        let keys = vec![LockKey::new(req.actor_id.clone(), req.batch_id.clone())];
        let _guard = self.locks.acquire(keys, self.config.lock_timeout)?;

        if self.store.get_batch(&req.actor_id, &req.batch_id)?.is_some() {
            return Err(TraceError::identifier_conflict(req.batch_id.as_str()));
        }

        let mut batch = Batch::new(req.batch_id, req.actor_id, req.item_id, now);
        batch.quantity = req.quantity;
        batch.location_id = req.location_id;
        batch.origin = req.origin;
        batch.production_date = req.production_date;
        batch.expiration_date = req.expiration_date;
        batch.validate()?;

        let stored = self.store.put_batch(batch, ExpectedVersion::Exact(0))?;
        info!(actor = %stored.actor_id, batch = %stored.id, "batch registered");
        Ok(stored)
    }

    /// Recompute a batch's status from the ledger and repair the cache if
    /// the ledger contradicts it. Explicit repair/audit path; reads never
    /// trigger this implicitly.
    pub fn reconcile_status(
        &self,
        actor_id: &ActorId,
        batch_id: &BatchId,
    ) -> TraceResult<ReconcileReport> {
        let now = Utc::now();

        let keys = vec![LockKey::new(actor_id.clone(), batch_id.clone())];
        let _guard = self.locks.acquire(keys, self.config.lock_timeout)?;

        let mut batch = self
            .store
            .get_batch(actor_id, batch_id)?
            .ok_or_else(|| TraceError::not_found(format!("batch {actor_id}/{batch_id}")))?;

        let events = self.ledger.list_referencing(actor_id, batch_id)?;
        let derived = reconcile::derive_status(batch_id, &events);

        if !reconcile::should_repair(batch.status, derived) {
            return Ok(ReconcileReport::clean(&batch, derived));
        }

        let cached = batch.status;
        batch.status = derived;
        batch.updated_at = now;
        let version = batch.version;
        self.store
            .put_batch(batch.clone(), ExpectedVersion::Exact(version))?;

        warn!(actor = %actor_id, batch = %batch_id, %cached, %derived, "status cache repaired");
        Ok(ReconcileReport {
            batch_id: batch_id.clone(),
            cached,
            derived,
            repaired: true,
        })
    }

    // ---- validation helpers -------------------------------------------

    fn ensure_event_id_free(&self, actor_id: &ActorId, event_id: &EventId) -> TraceResult<()> {
        if self.ledger.contains(actor_id, event_id)? {
            return Err(TraceError::DuplicateEventId(event_id.clone()));
        }
        Ok(())
    }

    /// Load and eligibility-check a locally-owned input reference.
    ///
    /// Cross-namespace references are accepted as opaque: the batch lives
    /// in a foreign trust domain whose lifecycle its owner governs, so
    /// there is nothing to load or status-check here.
    fn load_local_input(&self, actor_id: &ActorId, r: &BatchRef) -> TraceResult<Option<Batch>> {
        if r.is_foreign(actor_id) {
            return Ok(None);
        }
        self.load_eligible(actor_id, &r.batch_id).map(Some)
    }

    fn load_eligible(&self, actor_id: &ActorId, batch_id: &BatchId) -> TraceResult<Batch> {
        let batch = self
            .store
            .get_batch(actor_id, batch_id)?
            .ok_or_else(|| TraceError::not_found(format!("batch {actor_id}/{batch_id}")))?;
        if !batch.status.is_eligible_input() {
            return Err(TraceError::insufficient_state(batch.id.clone(), batch.status));
        }
        Ok(batch)
    }

    /// Packaging material must be strictly `active` (not quarantined).
    fn check_packaging(&self, actor_id: &ActorId, refs: &[BatchRef]) -> TraceResult<()> {
        for r in refs {
            if r.is_foreign(actor_id) {
                continue;
            }
            let batch = self
                .store
                .get_batch(actor_id, &r.batch_id)?
                .ok_or_else(|| {
                    TraceError::not_found(format!("packaging batch {actor_id}/{}", r.batch_id))
                })?;
            if batch.status != BatchStatus::Active {
                return Err(TraceError::insufficient_state(batch.id, batch.status));
            }
        }
        Ok(())
    }

    fn ensure_output_ids_free(&self, actor_id: &ActorId, outputs: &[OutputSpec]) -> TraceResult<()> {
        let mut seen = HashSet::new();
        for spec in outputs {
            if !seen.insert(&spec.batch_id) {
                return Err(TraceError::identifier_conflict(spec.batch_id.as_str()));
            }
            if self.store.get_batch(actor_id, &spec.batch_id)?.is_some() {
                return Err(TraceError::identifier_conflict(spec.batch_id.as_str()));
            }
        }
        Ok(())
    }

    // ---- commit -------------------------------------------------------

    fn commit(&self, plan: Plan, now: DateTime<Utc>) -> TraceResult<Event> {
        let mut journal: Vec<Applied> = Vec::new();

        for batch in plan.creates {
            let actor_id = batch.actor_id.clone();
            let batch_id = batch.id.clone();
            if let Err(e) = self.store.put_batch(batch, ExpectedVersion::Exact(0)) {
                self.rollback(journal);
                return Err(e.into());
            }
            journal.push(Applied::Created { actor_id, batch_id });
        }

        for (mut batch, target) in plan.transitions {
            let prior = batch.clone();
            if let Err(e) = batch.transition(target, now) {
                self.rollback(journal);
                return Err(e);
            }
            if let Err(e) = self
                .store
                .put_batch(batch, ExpectedVersion::Exact(prior.version))
            {
                self.rollback(journal);
                return Err(e.into());
            }
            journal.push(Applied::Updated { prior });
        }

        // Ledger append goes last: the event is the commit point.
        match self.ledger.append(plan.event) {
            Ok(event) => Ok(event),
            Err(e) => {
                self.rollback(journal);
                Err(e.into())
            }
        }
    }

    fn rollback(&self, journal: Vec<Applied>) {
        for entry in journal.into_iter().rev() {
            let result = match entry {
                Applied::Created { actor_id, batch_id } => self
                    .store
                    .remove_batch(&actor_id, &batch_id)
                    .map(|_| ()),
                Applied::Updated { prior } => self
                    .store
                    .put_batch(prior, ExpectedVersion::Any)
                    .map(|_| ()),
            };
            if let Err(e) = result {
                // Nothing more the core can do; the caller sees the original
                // commit error and the store keeps whatever this leaves.
                warn!(error = %e, "rollback step failed");
            }
        }
    }
}

fn ref_keys<'a>(
    actor_id: &ActorId,
    refs: impl Iterator<Item = &'a BatchRef>,
) -> Vec<LockKey> {
    refs.map(|r| LockKey::new(r.owner(actor_id).clone(), r.batch_id.clone()))
        .collect()
}

fn spec_keys(actor_id: &ActorId, specs: &[OutputSpec]) -> Vec<LockKey> {
    specs
        .iter()
        .map(|s| LockKey::new(actor_id.clone(), s.batch_id.clone()))
        .collect()
}

fn spec_ref(spec: &OutputSpec) -> BatchRef {
    let mut r = BatchRef::local(spec.batch_id.clone());
    if let Some(qty) = &spec.quantity {
        r = r.with_amount(qty.clone());
    }
    r
}

/// Split/merge outputs inherit the source item; an explicit item may only
/// restate it.
fn inherited_item(spec: &OutputSpec, source: &Batch) -> TraceResult<ItemId> {
    inherited_item_from(spec, &source.item_id)
}

fn inherited_item_from(spec: &OutputSpec, source_item: &ItemId) -> TraceResult<ItemId> {
    match &spec.item_id {
        None => Ok(source_item.clone()),
        Some(item) if item == source_item => Ok(item.clone()),
        Some(item) => Err(TraceError::validation(format!(
            "output {} declares item '{item}' but the source item is '{source_item}'",
            spec.batch_id
        ))),
    }
}
