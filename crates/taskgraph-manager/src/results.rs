//! The results buffer: completed outputs and errors, keyed by graph FQN.

use std::collections::HashMap;
use std::sync::Mutex;

use taskgraph_core::{GraphError, JobOutput};

/// Snapshot handed back by `pop_results`, draining the buffer it came from.
#[derive(Default)]
pub struct PopResult {
    pub completed: HashMap<String, Vec<JobOutput>>,
    pub errors: HashMap<String, Vec<GraphError>>,
}

/// Process-wide mutable state shared by every in-flight execution. Each
/// operation is a single short critical section (spec §5's "shared-resource
/// policy"); the buffer never holds a lock across an `await`.
#[derive(Default)]
pub struct ResultsBuffer {
    completed: Mutex<HashMap<String, Vec<JobOutput>>>,
    errors: Mutex<HashMap<String, Vec<GraphError>>>,
}

impl ResultsBuffer {
    pub fn record_completion(&self, fqn: &str, output: JobOutput) {
        self.completed
            .lock()
            .unwrap()
            .entry(fqn.to_string())
            .or_default()
            .push(output);
    }

    pub fn record_error(&self, fqn: &str, error: GraphError) {
        self.errors
            .lock()
            .unwrap()
            .entry(fqn.to_string())
            .or_default()
            .push(error);
    }

    /// Pull everything landed so far for one FQN without disturbing other
    /// graphs' entries — used by the one-shot `run` helper.
    pub fn take_for(&self, fqn: &str) -> (Vec<JobOutput>, Vec<GraphError>) {
        let outputs = self.completed.lock().unwrap().remove(fqn).unwrap_or_default();
        let errors = self.errors.lock().unwrap().remove(fqn).unwrap_or_default();
        (outputs, errors)
    }

    pub fn has_entry_for(&self, fqn: &str) -> bool {
        self.completed.lock().unwrap().contains_key(fqn) || self.errors.lock().unwrap().contains_key(fqn)
    }

    pub fn pop_all(&self) -> PopResult {
        let completed = std::mem::take(&mut *self.completed.lock().unwrap());
        let errors = std::mem::take(&mut *self.errors.lock().unwrap());
        PopResult { completed, errors }
    }
}
