//! S4 — fan-in timeout: a node's predecessor set names a node that is
//! never actually invoked, so the node blocks until its fan-in deadline and
//! the walk terminates with a `FanInTimeout` naming it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use taskgraph_core::fqn::Fqn;
use taskgraph_core::graph::{CompiledGraph, NodeEntry};
use taskgraph_core::job::{Job, JobContext, JobOutput, JobResult, Task};
use taskgraph_core::{DagExecutor, GraphError};

struct NoopJob(&'static str);
#[async_trait]
impl Job for NoopJob {
    async fn run(&self, _ctx: &JobContext<'_>) -> JobResult {
        Ok(JobOutput::new())
    }
    fn short_name(&self) -> &str {
        self.0
    }
}

#[tokio::test]
async fn incomplete_fan_in_times_out_naming_the_stuck_node() {
    let a = Fqn::format("g", "", "a");
    let b = Fqn::format("g", "", "b");
    let ghost = Fqn::format("g", "", "ghost");

    let mut nodes = HashMap::new();
    nodes.insert(
        a.clone(),
        NodeEntry {
            job: Arc::new(NoopJob("a")),
            successors: vec![b.clone()],
            expected_inputs: HashSet::new(),
        },
    );
    nodes.insert(
        b.clone(),
        NodeEntry {
            job: Arc::new(NoopJob("b")),
            successors: Vec::new(),
            // `ghost` is never a node in this graph, so it can never deliver.
            expected_inputs: HashSet::from([a.clone(), ghost.clone()]),
        },
    );

    let graph = Arc::new(CompiledGraph {
        fqn: Fqn::format("g", "", "a"),
        nodes,
        head: a,
        tail: b.clone(),
    });

    let err = DagExecutor::run_with_fan_in_timeout(
        graph,
        Arc::new(Task::new()),
        CancellationToken::new(),
        Some(Duration::from_secs(5)),
        Duration::from_millis(50),
    )
    .await
    .unwrap_err();

    match err {
        GraphError::FanInTimeout { node, expected, received } => {
            assert_eq!(node, b);
            assert!(expected.contains(&ghost));
            assert!(received.len() == 1);
        }
        other => panic!("expected FanInTimeout, got {other:?}"),
    }
}
