//! Lineage traversal benchmarks: deep chains and wide fan-outs.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use tracelot_core::{ActorId, Batch, BatchId, BatchRef, EventId, ExpectedVersion, ItemId};
use tracelot_ledger::{Event, EventKind, EventLedger, InMemoryEventLedger};
use tracelot_lineage::LineageBuilder;
use tracelot_store::{EntityStore, InMemoryEntityStore};

fn actor() -> ActorId {
    ActorId::new("bench-actor").unwrap()
}

fn seed_batch(store: &InMemoryEntityStore, id: &str) {
    let batch = Batch::new(
        BatchId::new(id).unwrap(),
        actor(),
        ItemId::new("widget").unwrap(),
        Utc::now(),
    );
    store.put_batch(batch, ExpectedVersion::Exact(0)).unwrap();
}

fn seed_event(ledger: &InMemoryEventLedger, id: &str, ts: i64, input: &str, outputs: &[String]) {
    let mut event = Event::new(
        EventId::new(id).unwrap(),
        actor(),
        EventKind::Processing,
        Utc.timestamp_opt(ts, 0).unwrap(),
    );
    event.inputs = vec![BatchRef::local(BatchId::new(input).unwrap())];
    event.outputs = outputs
        .iter()
        .map(|o| BatchRef::local(BatchId::new(o.as_str()).unwrap()))
        .collect();
    ledger.append(event).unwrap();
}

/// One batch transformed 500 times in a straight line.
fn deep_chain(
    depth: usize,
) -> LineageBuilder<Arc<InMemoryEntityStore>, Arc<InMemoryEventLedger>> {
    let store = Arc::new(InMemoryEntityStore::new());
    let ledger = Arc::new(InMemoryEventLedger::new());

    seed_batch(&store, "lot-0");
    for i in 0..depth {
        let next = format!("lot-{}", i + 1);
        seed_batch(&store, &next);
        seed_event(
            &ledger,
            &format!("evt-{i}"),
            i as i64,
            &format!("lot-{i}"),
            &[next],
        );
    }

    LineageBuilder::new(store, ledger)
}

/// One root split into many leaves over a few generations.
fn wide_fanout() -> LineageBuilder<Arc<InMemoryEntityStore>, Arc<InMemoryEventLedger>> {
    let store = Arc::new(InMemoryEntityStore::new());
    let ledger = Arc::new(InMemoryEventLedger::new());

    seed_batch(&store, "gen0-0");
    let mut ts = 0i64;
    for level in 0..4usize {
        let parents = 8usize.pow(level as u32);
        for p in 0..parents {
            let outputs: Vec<String> = (0..8)
                .map(|c| format!("gen{}-{}", level + 1, p * 8 + c))
                .collect();
            for o in &outputs {
                seed_batch(&store, o);
            }
            seed_event(
                &ledger,
                &format!("evt-{level}-{p}"),
                ts,
                &format!("gen{level}-{p}"),
                &outputs,
            );
            ts += 1;
        }
    }

    LineageBuilder::new(store, ledger)
}

fn bench_traversal(c: &mut Criterion) {
    let chain = deep_chain(500);
    let last = BatchId::new("lot-500").unwrap();
    c.bench_function("upstream_chain_500", |b| {
        b.iter(|| {
            let tree = chain.upstream(&actor(), &last, u32::MAX).unwrap();
            black_box(tree.node_count)
        })
    });

    let first = BatchId::new("lot-0").unwrap();
    c.bench_function("downstream_chain_500", |b| {
        b.iter(|| {
            let tree = chain.downstream(&actor(), &first, u32::MAX).unwrap();
            black_box(tree.node_count)
        })
    });

    let fanout = wide_fanout();
    let root = BatchId::new("gen0-0").unwrap();
    c.bench_function("downstream_fanout_4x8", |b| {
        b.iter(|| {
            let tree = fanout.downstream(&actor(), &root, u32::MAX).unwrap();
            black_box(tree.node_count)
        })
    });

    c.bench_function("downstream_fanout_depth_2", |b| {
        b.iter(|| {
            let tree = fanout.downstream(&actor(), &root, 2).unwrap();
            black_box(tree.node_count)
        })
    });
}

criterion_group!(benches, bench_traversal);
criterion_main!(benches);
