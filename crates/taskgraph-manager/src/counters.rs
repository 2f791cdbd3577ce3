//! Atomic counters tracked by the manager (spec §4.6 / §8 invariant 2).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// A consistent point-in-time view of the manager's counters. Never
/// constructed atomically as a whole — callers observing `CountsSnapshot`
/// mid-drain may see `submitted != completed + errors + in_flight` by a
/// transient amount; the invariant holds only between operations, not
/// within the read itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub errors: u64,
    pub in_flight: i64,
}

#[derive(Default)]
pub struct Counters {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub errors: AtomicU64,
    pub in_flight: AtomicI64,
}

impl Counters {
    pub fn snapshot(&self) -> CountsSnapshot {
        CountsSnapshot {
            submitted: self.submitted.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
        }
    }
}
