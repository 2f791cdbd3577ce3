//! S1 — diamond composition end to end: `A >> (B | C) >> D`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use taskgraph_core::compiler::compile;
use taskgraph_core::dsl::{parallel, serial, wrap_job, IntoDslNode};
use taskgraph_core::executor::{DagExecutor, SAVED_RESULTS_KEY, TASK_PASS_THROUGH_KEY};
use taskgraph_core::job::{Job, JobContext, JobOutput, JobResult, Task};

struct A;
#[async_trait]
impl Job for A {
    async fn run(&self, _ctx: &JobContext<'_>) -> JobResult {
        let mut out = JobOutput::new();
        out.insert("v".to_string(), Value::from(1));
        Ok(out)
    }
    fn short_name(&self) -> &str {
        "A"
    }
}

struct B;
#[async_trait]
impl Job for B {
    async fn run(&self, ctx: &JobContext<'_>) -> JobResult {
        let inputs = ctx.get_inputs();
        let v = inputs["A"]["v"].as_i64().unwrap();
        let mut out = JobOutput::new();
        out.insert("b".to_string(), Value::from(v * 2));
        Ok(out)
    }
    fn short_name(&self) -> &str {
        "B"
    }
}

struct C;
#[async_trait]
impl Job for C {
    async fn run(&self, ctx: &JobContext<'_>) -> JobResult {
        let inputs = ctx.get_inputs();
        let v = inputs["A"]["v"].as_i64().unwrap();
        let mut out = JobOutput::new();
        out.insert("c".to_string(), Value::from(v + 10));
        Ok(out)
    }
    fn short_name(&self) -> &str {
        "C"
    }
}

struct D;
#[async_trait]
impl Job for D {
    async fn run(&self, ctx: &JobContext<'_>) -> JobResult {
        let inputs = ctx.get_inputs();
        let b = inputs["B"]["b"].as_i64().unwrap();
        let c = inputs["C"]["c"].as_i64().unwrap();
        let mut out = JobOutput::new();
        out.insert("sum".to_string(), Value::from(b + c));
        Ok(out)
    }
    fn short_name(&self) -> &str {
        "D"
    }
}

#[tokio::test]
async fn diamond_produces_expected_sum() {
    let a = wrap_job(Arc::new(A)).into_dsl_node();
    let b = wrap_job(Arc::new(B)).into_dsl_node();
    let c = wrap_job(Arc::new(C)).into_dsl_node();
    let d = wrap_job(Arc::new(D)).into_dsl_node();
    let mid = parallel(vec![b, c]).unwrap();
    let tree = serial(vec![a, mid, d]).unwrap();

    let graph = Arc::new(compile(&tree, "diamond", None, &|_| false).unwrap());
    let task = Arc::new(Task::new());

    let result = DagExecutor::run(graph, task.clone(), CancellationToken::new(), Some(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(result["sum"], Value::from(13));
    assert_eq!(result[SAVED_RESULTS_KEY], Value::Object(Default::default()));
    assert_eq!(
        result[TASK_PASS_THROUGH_KEY],
        serde_json::to_value(&*task).unwrap()
    );
}
