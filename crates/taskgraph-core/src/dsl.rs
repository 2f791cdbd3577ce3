//! The DSL composer (C2): an algebra of `parallel` and `serial` over jobs
//! and plain values.
//!
//! `DslNode` is the abstract tree the composer builds; it carries no
//! adjacency or FQN information yet — that is [`crate::compiler`]'s job.
//! Wrapping heterogeneous inputs (an already-built job, a plain callable, or
//! a constant value) onto one shape is done with a tagged enum
//! ([`JobSpec`]) and a small dispatch table, per the Design Notes'
//! guidance to avoid structural introspection at run time.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::job::{CallableJob, Job, JobResult, ValueJob};

/// A value that has been normalized into one of the three shapes the
/// compiler understands: an already-built job, a callable awaiting
/// wrapping, or a constant value awaiting wrapping.
#[derive(Clone)]
pub enum JobSpec {
    Job(Arc<dyn Job>),
    Value { short_name: String, value: Value },
}

impl JobSpec {
    /// Resolve to the concrete `Arc<dyn Job>` the compiler will place in the
    /// graph, wrapping callables/values lazily so the short name assigned at
    /// `wrap` time survives into the final job.
    pub(crate) fn into_job(self) -> Arc<dyn Job> {
        match self {
            JobSpec::Job(job) => job,
            JobSpec::Value { short_name, value } => Arc::new(ValueJob::new(short_name, &value)),
        }
    }

    pub(crate) fn short_name(&self) -> String {
        match self {
            JobSpec::Job(job) => job.short_name().to_string(),
            JobSpec::Value { short_name, .. } => short_name.clone(),
        }
    }

    /// Identity used by the compiler to detect the same job object
    /// referenced from two DSL positions (Design Notes §9: dedupe, don't
    /// double-execute).
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            JobSpec::Job(job) => Some(Arc::as_ptr(job) as *const () as usize),
            JobSpec::Value { .. } => None,
        }
    }
}

/// Wrap an already-built job unchanged (no double wrapping).
pub fn wrap_job(job: Arc<dyn Job>) -> JobSpec {
    JobSpec::Job(job)
}

/// Wrap a plain async callable under the given short name. The callable
/// pulls its arguments from the task under `<short_name>.<param>` keys.
pub fn wrap_callable(
    short_name: impl Into<String>,
    callable: Arc<
        dyn Fn(std::collections::HashMap<String, Value>) -> futures::future::BoxFuture<'static, JobResult>
            + Send
            + Sync,
    >,
) -> JobSpec {
    JobSpec::Job(Arc::new(CallableJob::new(short_name, callable)))
}

/// Wrap a constant value under the given short name. At run time this
/// becomes a job that returns `{"value": <string form>}`.
pub fn wrap_value(short_name: impl Into<String>, value: Value) -> JobSpec {
    JobSpec::Value {
        short_name: short_name.into(),
        value,
    }
}

/// The abstract composition tree built by `parallel`/`serial`.
#[derive(Clone)]
pub enum DslNode {
    Leaf(JobSpec),
    Parallel(Vec<DslNode>),
    Serial(Vec<DslNode>),
}

impl DslNode {
    pub fn leaf(spec: JobSpec) -> Self {
        DslNode::Leaf(spec)
    }

    /// `A | B` flattened: chaining builds one `Parallel` of components
    /// rather than nesting pairwise, matching the source's associativity.
    pub fn parallel_with(self, other: DslNode) -> DslNode {
        merge(self, other, true)
    }

    /// `A >> B` flattened the same way.
    pub fn serial_with(self, other: DslNode) -> DslNode {
        merge(self, other, false)
    }
}

fn merge(a: DslNode, b: DslNode, as_parallel: bool) -> DslNode {
    let mut components = Vec::new();
    match (as_parallel, a) {
        (true, DslNode::Parallel(mut inner)) => components.append(&mut inner),
        (false, DslNode::Serial(mut inner)) => components.append(&mut inner),
        (_, other) => components.push(other),
    }
    match (as_parallel, b) {
        (true, DslNode::Parallel(mut inner)) => components.append(&mut inner),
        (false, DslNode::Serial(mut inner)) => components.append(&mut inner),
        (_, other) => components.push(other),
    }
    if as_parallel {
        DslNode::Parallel(components)
    } else {
        DslNode::Serial(components)
    }
}

impl std::ops::BitOr for DslNode {
    type Output = DslNode;
    fn bitor(self, rhs: DslNode) -> DslNode {
        self.parallel_with(rhs)
    }
}

impl std::ops::Shr for DslNode {
    type Output = DslNode;
    fn shr(self, rhs: DslNode) -> DslNode {
        self.serial_with(rhs)
    }
}

/// Anything that can become a [`DslNode`]: an existing node, or a `JobSpec`
/// leaf.
pub trait IntoDslNode {
    fn into_dsl_node(self) -> DslNode;
}

impl IntoDslNode for DslNode {
    fn into_dsl_node(self) -> DslNode {
        self
    }
}

impl IntoDslNode for JobSpec {
    fn into_dsl_node(self) -> DslNode {
        DslNode::Leaf(self)
    }
}

/// `parallel([...])`: a left-fold of `|` over the list. The empty list is a
/// configuration error; a singleton returns the wrapped element directly,
/// not a `Parallel` of one.
pub fn parallel<T: IntoDslNode>(items: Vec<T>) -> Result<DslNode> {
    fold(items, true)
}

/// `serial([...])`: a left-fold of `>>` over the list, same boundary rules.
pub fn serial<T: IntoDslNode>(items: Vec<T>) -> Result<DslNode> {
    fold(items, false)
}

fn fold<T: IntoDslNode>(items: Vec<T>, as_parallel: bool) -> Result<DslNode> {
    let mut iter = items.into_iter().map(IntoDslNode::into_dsl_node);
    let first = iter
        .next()
        .ok_or_else(|| GraphError::Configuration("empty composition list".to_string()))?;
    let mut acc = first;
    for next in iter {
        acc = merge(acc, next, as_parallel);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str) -> DslNode {
        wrap_value(name, Value::from(name)).into_dsl_node()
    }

    #[test]
    fn parallel_empty_list_errors() {
        assert!(parallel::<DslNode>(vec![]).is_err());
    }

    #[test]
    fn serial_empty_list_errors() {
        assert!(serial::<DslNode>(vec![]).is_err());
    }

    #[test]
    fn parallel_singleton_is_not_wrapped() {
        let node = parallel(vec![v("a")]).unwrap();
        assert!(matches!(node, DslNode::Leaf(_)));
    }

    #[test]
    fn chained_parallel_flattens() {
        let node = v("a") | v("b") | v("c");
        match node {
            DslNode::Parallel(components) => assert_eq!(components.len(), 3),
            _ => panic!("expected Parallel"),
        }
    }

    #[test]
    fn mixed_operators_nest_correctly() {
        let node = (v("a") >> v("b")) | v("c");
        match node {
            DslNode::Parallel(components) => {
                assert_eq!(components.len(), 2);
                assert!(matches!(components[0], DslNode::Serial(_)));
            }
            _ => panic!("expected Parallel"),
        }
    }
}
