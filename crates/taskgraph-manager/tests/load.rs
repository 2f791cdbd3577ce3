//! S3 — parallel load: 1000 tasks through a single-job graph that each
//! await 1s. Wall-clock must stay well under the serial sum, proving every
//! submission gets its own concurrently scheduled execution instead of
//! draining through a fixed-size pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use taskgraph_core::dsl::{wrap_job, IntoDslNode};
use taskgraph_core::job::{Job, JobContext, JobOutput, JobResult, Task};
use taskgraph_manager::{FlowManager, ManagerConfig};

struct SleepOneSecond;
#[async_trait]
impl Job for SleepOneSecond {
    async fn run(&self, _ctx: &JobContext<'_>) -> JobResult {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(JobOutput::new())
    }
    fn short_name(&self) -> &str {
        "sleep"
    }
}

#[tokio::test]
async fn thousand_concurrent_tasks_complete_well_under_the_serial_sum() {
    let manager = FlowManager::new(ManagerConfig::default());
    let tree = Arc::new(wrap_job(Arc::new(SleepOneSecond)).into_dsl_node());
    let fqn = manager.add_dsl(tree, "load", None).unwrap();

    let start = Instant::now();
    for _ in 0..1000 {
        manager.submit(Task::new(), fqn.as_str()).unwrap();
    }
    assert!(manager
        .wait_for_completion(Some(Duration::from_secs(10)), None)
        .await
        .unwrap());
    let elapsed = start.elapsed();

    let counts = manager.get_counts();
    assert_eq!(counts.errors, 0);
    assert_eq!(counts.completed, 1000);
    assert!(
        elapsed < Duration::from_millis(1800),
        "expected cooperative overlap to finish well under 1.8s, took {elapsed:?}"
    );
}
