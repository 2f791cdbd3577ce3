//! One queued unit of work: a task payload bound to a graph FQN.

use taskgraph_core::Task;

pub(crate) struct Submission {
    pub(crate) task: Task,
    pub(crate) fqn: String,
}
