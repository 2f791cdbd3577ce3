//! The execution context (C4): per-(task, graph) state.
//!
//! Holds the accumulated inputs per node, a fan-in signal per node, the
//! exactly-once execution guard, the saved-results map, and the original
//! task payload.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{GraphError, Result};
use crate::fqn::Fqn;
use crate::graph::CompiledGraph;
use crate::job::{JobOutput, Task};

/// Default per-node fan-in deadline (spec §4.4), independent of any
/// per-execution timeout the manager layers on top.
pub const DEFAULT_FAN_IN_TIMEOUT: Duration = Duration::from_secs(30);

/// One-shot latch combining the `arrived` signal with a sticky flag, so a
/// waiter that starts checking *after* the signal already fired still
/// observes it — `tokio::sync::Notify::notified()` alone only wakes
/// currently-registered waiters, which would otherwise lose the event.
struct Latch {
    notify: Notify,
    fired: AtomicBool,
}

impl Latch {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            fired: AtomicBool::new(false),
        }
    }

    fn fire(&self) {
        self.fired.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    async fn wait(&self, timeout: Duration) -> std::result::Result<(), ()> {
        if self.fired.load(Ordering::SeqCst) {
            return Ok(());
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Re-check after registering interest to close the race between the
        // initial load above and the signal firing before we started
        // waiting on the notify.
        if self.fired.load(Ordering::SeqCst) {
            return Ok(());
        }
        tokio::time::timeout(timeout, notified).await.map_err(|_| ())
    }
}

struct NodeState {
    inputs: Mutex<HashMap<Fqn, JobOutput>>,
    latch: Latch,
    started: AtomicBool,
    spawn_claimed: AtomicBool,
}

/// Per-(task, graph) execution state.
pub struct ExecutionContext {
    pub task: Arc<Task>,
    nodes: HashMap<Fqn, NodeState>,
    expected_inputs: HashMap<Fqn, HashSet<Fqn>>,
    saved_results: Mutex<HashMap<String, JobOutput>>,
}

impl ExecutionContext {
    pub fn new(graph: &CompiledGraph, task: Arc<Task>) -> Self {
        let mut nodes = HashMap::with_capacity(graph.nodes.len());
        let mut expected_inputs = HashMap::with_capacity(graph.nodes.len());
        for (fqn, entry) in &graph.nodes {
            nodes.insert(
                fqn.clone(),
                NodeState {
                    inputs: Mutex::new(HashMap::new()),
                    latch: Latch::new(),
                    started: AtomicBool::new(false),
                    spawn_claimed: AtomicBool::new(false),
                },
            );
            expected_inputs.insert(fqn.clone(), entry.expected_inputs.clone());
        }
        Self {
            task,
            nodes,
            expected_inputs,
            saved_results: Mutex::new(HashMap::new()),
        }
    }

    /// Record `from`'s output as an input to `to`. If `to`'s fan-in set is
    /// now fully satisfied, fires its latch.
    pub fn deliver(&self, to: &Fqn, from: &Fqn, output: JobOutput) {
        let state = self
            .nodes
            .get(to)
            .expect("deliver target must be a node in this graph");
        let expected = &self.expected_inputs[to];
        let satisfied = {
            let mut inputs = state.inputs.lock().unwrap();
            inputs.insert(from.clone(), output);
            expected.iter().all(|e| inputs.contains_key(e))
        };
        if satisfied {
            state.latch.fire();
        }
    }

    /// Wait until `node`'s fan-in set is fully satisfied. Returns
    /// immediately, never blocking, when `expected_inputs` is empty
    /// (boundary behavior: the head never blocks).
    pub async fn await_fan_in(&self, node: &Fqn, timeout: Duration) -> Result<()> {
        let expected = &self.expected_inputs[node];
        if expected.is_empty() {
            return Ok(());
        }
        let state = &self.nodes[node];
        state.latch.wait(timeout).await.map_err(|_| {
            let received: HashSet<Fqn> =
                state.inputs.lock().unwrap().keys().cloned().collect();
            GraphError::FanInTimeout {
                node: node.clone(),
                expected: expected.clone(),
                received,
            }
        })
    }

    /// Exactly-once guard: the first caller to flip this from `false` to
    /// `true` is the one that must invoke the node's job.
    pub fn try_start(&self, node: &Fqn) -> bool {
        self.nodes[node]
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Exactly-once guard over *scheduling* a node's execution task, distinct
    /// from `try_start`'s guard over *running its job*. A node must be
    /// scheduled exactly once as soon as its first predecessor delivers, so
    /// that its execution body genuinely blocks on `await_fan_in` (and can
    /// therefore time out) rather than only ever being scheduled once every
    /// predecessor has already arrived.
    pub fn claim_spawn(&self, node: &Fqn) -> bool {
        self.nodes[node]
            .spawn_claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Snapshot of `node`'s accumulated inputs, for building a `JobContext`.
    pub fn inputs_for(&self, node: &Fqn) -> HashMap<Fqn, JobOutput> {
        self.nodes[node].inputs.lock().unwrap().clone()
    }

    pub fn save_result(&self, short_name: &str, output: &JobOutput) {
        self.saved_results
            .lock()
            .unwrap()
            .insert(short_name.to_string(), output.clone());
    }

    pub fn saved_results(&self) -> HashMap<String, JobOutput> {
        self.saved_results.lock().unwrap().clone()
    }
}
