//! The DAG executor (C5): drives one task through one compiled graph.
//!
//! Each node becomes a spawned tokio task once its fan-in is satisfied.
//! Node tasks report completion (or failure) through an mpsc channel back
//! to the driving loop, which recognizes the tail's arrival as the walk's
//! result and aborts any still-running siblings on the first error —
//! concurrent successors within one execution are tracked so they can all
//! be cancelled together (spec §4.5's "cancel outstanding sibling work").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::context::{ExecutionContext, DEFAULT_FAN_IN_TIMEOUT};
use crate::error::{GraphError, Result};
use crate::fqn::Fqn;
use crate::graph::CompiledGraph;
use crate::job::{JobContext, JobOutput, Task};

/// Reserved output key: the `saved_results` map for this execution.
pub const SAVED_RESULTS_KEY: &str = "SAVED_RESULTS";
/// Reserved output key: the original task payload, verbatim.
pub const TASK_PASS_THROUGH_KEY: &str = "task_pass_through";

struct Walk {
    graph: Arc<CompiledGraph>,
    ctx: Arc<ExecutionContext>,
    cancel: CancellationToken,
    fan_in_timeout: Duration,
    report: mpsc::UnboundedSender<Result<(Fqn, JobOutput)>>,
    handles: Mutex<Vec<AbortHandle>>,
    failed: AtomicBool,
}

impl Walk {
    fn abort_all(&self) {
        for handle in self.handles.lock().unwrap().drain(..) {
            handle.abort();
        }
    }
}

/// Drives a single task through a single compiled graph to completion.
pub struct DagExecutor;

impl DagExecutor {
    /// Execute `task` through `graph`, returning the tail's output
    /// augmented with `SAVED_RESULTS` and `task_pass_through`.
    ///
    /// `timeout` bounds the whole walk and is independent of the internal
    /// 30s fan-in deadline; `None` means unbounded, matching spec §5.
    #[tracing::instrument(skip_all, fields(graph = %graph.fqn))]
    pub async fn run(
        graph: Arc<CompiledGraph>,
        task: Arc<Task>,
        cancel: CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<JobOutput> {
        Self::run_with_fan_in_timeout(graph, task, cancel, timeout, DEFAULT_FAN_IN_TIMEOUT).await
    }

    pub async fn run_with_fan_in_timeout(
        graph: Arc<CompiledGraph>,
        task: Arc<Task>,
        cancel: CancellationToken,
        timeout: Option<Duration>,
        fan_in_timeout: Duration,
    ) -> Result<JobOutput> {
        let ctx = Arc::new(ExecutionContext::new(&graph, task.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let walk = Arc::new(Walk {
            graph: graph.clone(),
            ctx: ctx.clone(),
            cancel,
            fan_in_timeout,
            report: tx,
            handles: Mutex::new(Vec::new()),
            failed: AtomicBool::new(false),
        });

        spawn_node(walk.clone(), graph.head.clone());

        let drive = async {
            loop {
                tokio::select! {
                    _ = walk.cancel.cancelled() => {
                        return Err(GraphError::Cancelled);
                    }
                    msg = rx.recv() => {
                        match msg {
                            Some(Ok((node, output))) if node == graph.tail => {
                                return Ok(finalize(output, &ctx, &task));
                            }
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => return Err(e),
                            None => return Err(GraphError::Cancelled),
                        }
                    }
                }
            }
        };

        let result = match timeout {
            Some(d) => match tokio::time::timeout(d, drive).await {
                Ok(r) => r,
                Err(_) => Err(GraphError::Timeout(d)),
            },
            None => drive.await,
        };

        walk.abort_all();
        result
    }
}

fn finalize(mut tail_output: JobOutput, ctx: &ExecutionContext, task: &Task) -> JobOutput {
    let saved: JobOutput = ctx
        .saved_results()
        .into_iter()
        .map(|(k, v)| (k, serde_json::to_value(v).unwrap_or(Value::Null)))
        .collect();
    tail_output.insert(SAVED_RESULTS_KEY.to_string(), Value::Object(
        saved.into_iter().collect(),
    ));
    tail_output.insert(
        TASK_PASS_THROUGH_KEY.to_string(),
        serde_json::to_value(task.clone()).unwrap_or(Value::Null),
    );
    tail_output
}

fn spawn_node(walk: Arc<Walk>, node: Fqn) {
    let handle = tokio::spawn(run_node(walk.clone(), node));
    walk.handles.lock().unwrap().push(handle.abort_handle());
}

async fn run_node(walk: Arc<Walk>, node: Fqn) {
    if walk.cancel.is_cancelled() || walk.failed.load(Ordering::SeqCst) {
        return;
    }

    if let Err(e) = walk.ctx.await_fan_in(&node, walk.fan_in_timeout).await {
        report_failure(&walk, e);
        return;
    }

    if !walk.ctx.try_start(&node) {
        // Another predecessor's delivery already satisfied fan-in and won
        // the race to execute this node; nothing left to do here.
        return;
    }

    let entry = &walk.graph.nodes[&node];
    let inputs = walk.ctx.inputs_for(&node);
    let saved = walk.ctx.saved_results();
    let params = entry.job.properties().clone();
    let output = {
        let job_ctx = JobContext::new(&inputs, &saved, &walk.ctx.task, &params);
        entry.job.run(&job_ctx).await
    };

    let output = match output {
        Ok(output) => output,
        Err(source) => {
            report_failure(&walk, GraphError::job_failed(node.clone(), source));
            return;
        }
    };

    if entry.job.save_result() {
        walk.ctx.save_result(entry.job.short_name(), &output);
    }

    if node == walk.graph.tail {
        let _ = walk.report.send(Ok((node.clone(), output.clone())));
        return;
    }

    for successor in &entry.successors {
        walk.ctx.deliver(successor, &node, output.clone());
        // Schedule the successor on its *first* delivery, not once every
        // predecessor has arrived: the scheduled task then genuinely blocks
        // on `await_fan_in` for the rest, which is what lets an incomplete
        // fan-in actually time out instead of simply never being scheduled.
        if walk.ctx.claim_spawn(successor) {
            spawn_node(walk.clone(), successor.clone());
        }
    }
}

fn report_failure(walk: &Walk, err: GraphError) {
    if walk.failed.swap(true, Ordering::SeqCst) {
        return;
    }
    let _ = walk.report.send(Err(err));
}
