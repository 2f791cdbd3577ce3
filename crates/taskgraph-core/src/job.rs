//! The job contract (C1): a named asynchronous unit of work.
//!
//! A job consumes a map of predecessor outputs plus the original task
//! payload and produces a map output. Jobs must not mutate the task or any
//! other job's output — the executor hands out shared, read-only views.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::fqn::Fqn;

/// The task payload a caller submits. Keys are either bare strings, passed
/// through untouched, or dotted `<short_job_name>.<param>` strings consumed
/// by wrapped callables.
pub type Task = HashMap<String, Value>;

/// A job's output map.
pub type JobOutput = HashMap<String, Value>;

/// The result of one job's `run`: any failure raised from user code,
/// type-erased, travels as the `source` of a `GraphError::JobFailed` once
/// the executor attaches the failing node's FQN.
pub type JobResult = std::result::Result<JobOutput, Box<dyn std::error::Error + Send + Sync>>;

/// Static, compile-time parameters consulted by a job at run time. Empty by
/// default; jobs that need per-variant configuration override
/// [`Job::properties`].
pub type JobProperties = HashMap<String, Value>;

fn empty_properties() -> &'static JobProperties {
    static EMPTY: std::sync::OnceLock<JobProperties> = std::sync::OnceLock::new();
    EMPTY.get_or_init(HashMap::new)
}

/// The view a running job sees of its execution: immediate predecessor
/// outputs, the saved-results map accumulated so far, and the original task.
pub struct JobContext<'a> {
    inputs: &'a HashMap<Fqn, JobOutput>,
    saved_results: &'a HashMap<String, JobOutput>,
    task: &'a Task,
    params: &'a JobProperties,
}

impl<'a> JobContext<'a> {
    pub fn new(
        inputs: &'a HashMap<Fqn, JobOutput>,
        saved_results: &'a HashMap<String, JobOutput>,
        task: &'a Task,
        params: &'a JobProperties,
    ) -> Self {
        Self {
            inputs,
            saved_results,
            task,
            params,
        }
    }

    /// Immediate predecessor outputs, keyed by their **short** names.
    ///
    /// Mirrors `JobABC.get_input_from`: if more than one predecessor FQN
    /// parses to the same short name, the first one encountered wins.
    pub fn get_inputs(&self) -> HashMap<String, JobOutput> {
        let mut out = HashMap::with_capacity(self.inputs.len());
        for (fqn, output) in self.inputs {
            out.entry(fqn.short_name().to_string())
                .or_insert_with(|| output.clone());
        }
        out
    }

    pub fn get_saved_results(&self) -> &HashMap<String, JobOutput> {
        self.saved_results
    }

    pub fn get_task(&self) -> &Task {
        self.task
    }

    pub fn get_params(&self) -> &JobProperties {
        self.params
    }
}

/// A named asynchronous unit of work; the node of the graph.
#[async_trait]
pub trait Job: Send + Sync {
    /// Execute the job's logic against the current context.
    async fn run(&self, ctx: &JobContext<'_>) -> JobResult;

    /// The short, graph-unique name chosen by the caller.
    fn short_name(&self) -> &str;

    /// Whether this job's output should be retained in `saved_results` so
    /// non-adjacent downstream jobs can observe it.
    fn save_result(&self) -> bool {
        false
    }

    /// Static parameters consulted at run time. Defaults to empty.
    fn properties(&self) -> &JobProperties {
        empty_properties()
    }
}

/// A plain async function, wrapped as a job. Pulls its arguments from the
/// task under `<short_name>.<param>` keys.
pub struct CallableJob<F> {
    short_name: String,
    save_result: bool,
    callable: F,
}

type CallableFn = Arc<
    dyn Fn(HashMap<String, Value>) -> futures::future::BoxFuture<'static, JobResult>
        + Send
        + Sync,
>;

impl CallableJob<CallableFn> {
    pub fn new(short_name: impl Into<String>, callable: CallableFn) -> Self {
        Self {
            short_name: short_name.into(),
            save_result: false,
            callable,
        }
    }

    pub fn with_save_result(mut self, save: bool) -> Self {
        self.save_result = save;
        self
    }
}

#[async_trait]
impl Job for CallableJob<CallableFn> {
    async fn run(&self, ctx: &JobContext<'_>) -> JobResult {
        let prefix = format!("{}.", self.short_name);
        let params: HashMap<String, Value> = ctx
            .get_task()
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(prefix.as_str()).map(|p| (p.to_string(), v.clone())))
            .collect();
        (self.callable)(params).await
    }

    fn short_name(&self) -> &str {
        &self.short_name
    }

    fn save_result(&self) -> bool {
        self.save_result
    }
}

/// A constant value, wrapped as a job that returns `{"value": <string form>}`.
///
/// The original value is not JSON-preserved by design: the source wraps
/// arbitrary Python objects and stringifies them, so parity here means the
/// output is always the value's display form, not a round-trippable copy.
pub struct ValueJob {
    short_name: String,
    save_result: bool,
    rendered: String,
}

impl ValueJob {
    pub fn new(short_name: impl Into<String>, value: &Value) -> Self {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            short_name: short_name.into(),
            save_result: false,
            rendered,
        }
    }

    pub fn with_save_result(mut self, save: bool) -> Self {
        self.save_result = save;
        self
    }
}

#[async_trait]
impl Job for ValueJob {
    async fn run(&self, _ctx: &JobContext<'_>) -> JobResult {
        let mut out = JobOutput::new();
        out.insert("value".to_string(), Value::String(self.rendered.clone()));
        Ok(out)
    }

    fn short_name(&self) -> &str {
        &self.short_name
    }

    fn save_result(&self) -> bool {
        self.save_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn value_job_renders_string_form() {
        let job = ValueJob::new("k", &Value::from(42));
        let task = Task::new();
        let saved = HashMap::new();
        let inputs = HashMap::new();
        let params = JobProperties::new();
        let ctx = JobContext::new(&inputs, &saved, &task, &params);
        let out = job.run(&ctx).await.unwrap();
        assert_eq!(out.get("value").unwrap(), "42");
    }

    #[tokio::test]
    async fn callable_job_pulls_dotted_params() {
        let callable: CallableFn = Arc::new(|params| {
            Box::pin(async move {
                let x = params.get("x").and_then(Value::as_i64).unwrap_or(0);
                let mut out = JobOutput::new();
                out.insert("doubled".to_string(), Value::from(x * 2));
                Ok(out)
            })
        });
        let job = CallableJob::new("times", callable);
        let mut task = Task::new();
        task.insert("times.x".to_string(), Value::from(5));
        let saved = HashMap::new();
        let inputs = HashMap::new();
        let params = JobProperties::new();
        let ctx = JobContext::new(&inputs, &saved, &task, &params);
        let out = job.run(&ctx).await.unwrap();
        assert_eq!(out.get("doubled").unwrap(), &Value::from(10));
    }
}
