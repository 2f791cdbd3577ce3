//! Cancelling the manager must fail every in-flight execution with a
//! `Cancelled` entry rather than leaving it stuck (spec §8 invariant 12).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use taskgraph_core::dsl::{wrap_job, IntoDslNode};
use taskgraph_core::job::{Job, JobContext, JobOutput, JobResult, Task};
use taskgraph_core::GraphError;
use taskgraph_manager::{FlowManager, ManagerConfig};

struct SlowJob;
#[async_trait]
impl Job for SlowJob {
    async fn run(&self, _ctx: &JobContext<'_>) -> JobResult {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(JobOutput::new())
    }
    fn short_name(&self) -> &str {
        "slow"
    }
}

#[tokio::test]
async fn cancelling_the_manager_errors_out_in_flight_tasks() {
    let manager = FlowManager::new(ManagerConfig::default());
    let tree = Arc::new(wrap_job(Arc::new(SlowJob)).into_dsl_node());
    let fqn = manager.add_dsl(tree, "slow", None).unwrap();

    for _ in 0..3 {
        manager.submit(Task::new(), fqn.as_str()).unwrap();
    }

    // Give the drain loop a moment to spawn the submissions before cancelling.
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.cancel();

    assert!(manager
        .wait_for_completion(Some(Duration::from_secs(2)), None)
        .await
        .unwrap());

    let popped = manager.pop_results();
    let errors = &popped.errors[fqn.as_str()];
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|e| matches!(e, GraphError::Cancelled)));
    assert!(popped.completed.get(fqn.as_str()).is_none());
}

#[tokio::test]
async fn single_task_cancellation_lands_in_errors() {
    let manager = FlowManager::new(ManagerConfig::default());
    let tree = Arc::new(wrap_job(Arc::new(SlowJob)).into_dsl_node());
    let fqn = manager.add_dsl(tree, "alone", None).unwrap();
    manager.submit(Task::new(), fqn.as_str()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.cancel();
    manager
        .wait_for_completion(Some(Duration::from_secs(2)), None)
        .await
        .unwrap();
    let popped = manager.pop_results();
    assert_eq!(popped.errors[fqn.as_str()].len(), 1);
}
