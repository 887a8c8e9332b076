//! Deterministic, deadlock-free batch locking.
//!
//! Every composite operation locks the full set of batch identifiers it
//! will touch (inputs, outputs and packaging materials alike) before
//! validating anything. Output identifiers are locked *before* the batches
//! exist, which reserves the identifier space: a concurrent operation
//! cannot create a different batch under the same id while the first is in
//! flight.
//!
//! Deadlock avoidance is by total ordering: the key set is sorted
//! lexicographically by `(actor, batch)` and acquired in that order, so two
//! operations sharing any subset of keys always contend in the same
//! relative order. Acquisition is blocking with a per-operation deadline;
//! a caller that gives up before being granted releases whatever prefix it
//! held with no other side effects.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use tracelot_core::{ActorId, BatchId, TraceError, TraceResult};

/// A lock key: one batch identifier in one actor's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey {
    pub actor_id: ActorId,
    pub batch_id: BatchId,
}

impl LockKey {
    pub fn new(actor_id: ActorId, batch_id: BatchId) -> Self {
        Self { actor_id, batch_id }
    }
}

impl core::fmt::Display for LockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.actor_id, self.batch_id)
    }
}

/// Sort and dedupe a key set into canonical acquisition order.
pub fn canonical_order(mut keys: Vec<LockKey>) -> Vec<LockKey> {
    keys.sort();
    keys.dedup();
    keys
}

/// Exclusive per-identifier locks for in-flight operations.
#[derive(Debug, Default)]
pub struct LockCoordinator {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl LockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn held_set(&self) -> MutexGuard<'_, HashSet<LockKey>> {
        // A poisoned registry only means a panic elsewhere; the set itself
        // is still consistent, so keep going.
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquire every key in `keys`, blocking up to `timeout` overall.
    ///
    /// Keys are acquired in canonical order and released in reverse order
    /// when the returned guard drops. On timeout, any prefix already held
    /// is released and [`TraceError::LockTimeout`] names the key that
    /// could not be acquired.
    pub fn acquire(&self, keys: Vec<LockKey>, timeout: Duration) -> TraceResult<LockGuard<'_>> {
        let keys = canonical_order(keys);
        let started = Instant::now();
        let deadline = started + timeout;

        let mut held = self.held_set();
        let mut acquired: Vec<LockKey> = Vec::with_capacity(keys.len());

        for key in keys {
            loop {
                if !held.contains(&key) {
                    held.insert(key.clone());
                    acquired.push(key);
                    break;
                }

                let now = Instant::now();
                if now >= deadline {
                    for k in acquired.iter().rev() {
                        held.remove(k);
                    }
                    drop(held);
                    self.released.notify_all();
                    return Err(TraceError::LockTimeout {
                        key: key.to_string(),
                        waited_ms: started.elapsed().as_millis() as u64,
                    });
                }

                let (guard, _timed_out) = self
                    .released
                    .wait_timeout(held, deadline - now)
                    .unwrap_or_else(|e| e.into_inner());
                held = guard;
            }
        }

        debug!(keys = acquired.len(), "locks acquired");
        Ok(LockGuard {
            coordinator: self,
            keys: acquired,
        })
    }
}

/// RAII guard over an acquired key set; releases on drop.
#[derive(Debug)]
pub struct LockGuard<'a> {
    coordinator: &'a LockCoordinator,
    keys: Vec<LockKey>,
}

impl LockGuard<'_> {
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.coordinator.held_set();
        for key in self.keys.iter().rev() {
            held.remove(key);
        }
        drop(held);
        self.coordinator.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn key(actor: &str, batch: &str) -> LockKey {
        LockKey::new(ActorId::new(actor).unwrap(), BatchId::new(batch).unwrap())
    }

    #[test]
    fn acquire_and_release() {
        let locks = LockCoordinator::new();
        let guard = locks
            .acquire(vec![key("acme", "b1"), key("acme", "b2")], Duration::from_secs(1))
            .unwrap();
        assert_eq!(guard.keys().len(), 2);
        drop(guard);

        // Everything released; the same set is immediately available.
        locks
            .acquire(vec![key("acme", "b1"), key("acme", "b2")], Duration::from_secs(1))
            .unwrap();
    }

    #[test]
    fn duplicate_keys_collapse() {
        let locks = LockCoordinator::new();
        let guard = locks
            .acquire(
                vec![key("acme", "b1"), key("acme", "b1"), key("acme", "b1")],
                Duration::from_secs(1),
            )
            .unwrap();
        assert_eq!(guard.keys().len(), 1);
    }

    #[test]
    fn contended_key_times_out() {
        let locks = LockCoordinator::new();
        let _held = locks
            .acquire(vec![key("acme", "b1")], Duration::from_secs(1))
            .unwrap();

        let err = locks
            .acquire(
                vec![key("acme", "b0"), key("acme", "b1")],
                Duration::from_millis(50),
            )
            .unwrap_err();
        assert!(matches!(err, TraceError::LockTimeout { .. }));

        // The prefix (b0) must have been released on the way out.
        locks
            .acquire(vec![key("acme", "b0")], Duration::from_millis(50))
            .unwrap();
    }

    #[test]
    fn overlapping_sets_never_deadlock() {
        let locks = Arc::new(LockCoordinator::new());
        let mut handles = Vec::new();

        // Threads request overlapping sets in scrambled orders; sorted
        // acquisition means they serialize instead of deadlocking.
        for i in 0..4u32 {
            let locks = Arc::clone(&locks);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let keys = if i % 2 == 0 {
                        vec![key("acme", "b1"), key("acme", "b2"), key("acme", "b3")]
                    } else {
                        vec![key("acme", "b3"), key("acme", "b1")]
                    };
                    let guard = locks.acquire(keys, Duration::from_secs(5)).unwrap();
                    drop(guard);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn waiter_is_granted_after_release() {
        let locks = Arc::new(LockCoordinator::new());
        let guard = locks
            .acquire(vec![key("acme", "b1")], Duration::from_secs(1))
            .unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            std::thread::spawn(move || {
                locks
                    .acquire(vec![key("acme", "b1")], Duration::from_secs(5))
                    .map(|g| g.keys().len())
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert_eq!(waiter.join().unwrap().unwrap(), 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Canonical order is total, duplicate-free, and independent of
            // the order keys were collected in.
            #[test]
            fn canonical_order_is_sorted_and_deduped(
                raw in proptest::collection::vec("[a-z]{1,4}", 0..20)
            ) {
                let keys: Vec<LockKey> = raw
                    .iter()
                    .map(|s| key("acme", s))
                    .collect();
                let mut shuffled = keys.clone();
                shuffled.reverse();

                let a = canonical_order(keys);
                let b = canonical_order(shuffled);

                prop_assert_eq!(&a, &b);
                prop_assert!(a.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
