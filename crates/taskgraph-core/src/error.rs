//! Error types shared by graph compilation and execution.
//!
//! Every error kind named in the core's contract gets its own variant so
//! callers can match on failure mode rather than parse a message string.

use std::collections::HashSet;
use thiserror::Error;

use crate::fqn::Fqn;

/// Convenience result type using [`GraphError`].
pub type Result<T> = std::result::Result<T, GraphError>;

/// All errors that can occur while building, compiling, or executing a graph.
#[derive(Error, Debug)]
pub enum GraphError {
    /// `submit` referenced a graph that was never added to the manager.
    #[error("unknown graph: {0}")]
    UnknownFqn(String),

    /// A node waited longer than its fan-in deadline for its predecessors.
    #[error("fan-in timeout at node '{node}': expected {expected:?}, received {received:?}")]
    FanInTimeout {
        node: Fqn,
        expected: HashSet<Fqn>,
        received: HashSet<Fqn>,
    },

    /// A job's `run` returned an error.
    #[error("job '{node}' failed: {source}")]
    JobFailed {
        node: Fqn,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The manager or caller requested cancellation.
    #[error("execution cancelled")]
    Cancelled,

    /// The per-execution or `wait_for_completion` deadline fired.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// An FQN string was malformed. Carries the original input.
    #[error("unsupported name format: {0:?}")]
    ParseError(String),

    /// Two jobs inside one DSL tree share a short name.
    #[error("duplicate short name '{0}' within graph")]
    DuplicateShortName(String),

    /// `parallel`/`serial` was given an empty list, or a DSL tree had no leaves.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Wraps JSON (de)serialization failures at the task/output boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `wait_for_completion` concluded with `RAISE_ON_ERROR` set and at least
    /// one task in the `errors` buffer. The per-task detail remains
    /// available through `pop_results`; this variant only carries the count.
    #[error("{0} task(s) completed with errors")]
    Errored(usize),
}

impl GraphError {
    pub fn job_failed(node: Fqn, source: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::JobFailed { node, source }
    }
}
