//! # taskgraph-core — the per-task DAG execution engine
//!
//! This crate is the core of a job-graph orchestration library: an algebra
//! for composing directed acyclic graphs of asynchronous jobs, a compiler
//! that turns that algebra into an adjacency representation, and an
//! executor that drives exactly one task through exactly one compiled
//! graph with fan-in synchronization and exactly-once node execution.
//!
//! It has no opinion about concurrent scheduling *across* tasks, result
//! buffering, or callbacks — that lives one layer up, in
//! `taskgraph-manager`. This crate's contract is narrow on purpose: given a
//! [`CompiledGraph`] and a task, produce a tail output or an error.
//!
//! ## Building a graph
//!
//! ```
//! use std::sync::Arc;
//! use taskgraph_core::dsl::{parallel, serial, wrap_job, IntoDslNode};
//! use taskgraph_core::job::{Job, JobContext, JobOutput, JobResult};
//! use taskgraph_core::compiler::compile;
//! use async_trait::async_trait;
//!
//! struct Echo(&'static str);
//!
//! #[async_trait]
//! impl Job for Echo {
//!     async fn run(&self, _ctx: &JobContext<'_>) -> JobResult {
//!         let mut out = JobOutput::new();
//!         out.insert("v".to_string(), serde_json::Value::from(self.0));
//!         Ok(out)
//!     }
//!     fn short_name(&self) -> &str { self.0 }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let a = wrap_job(Arc::new(Echo("a"))).into_dsl_node();
//! let b = wrap_job(Arc::new(Echo("b"))).into_dsl_node();
//! let c = wrap_job(Arc::new(Echo("c"))).into_dsl_node();
//! let tree = serial(vec![a, parallel(vec![b, c])?])?;
//! let graph = compile(&tree, "demo", None, &|_| false)?;
//! assert_eq!(graph.nodes.len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod context;
pub mod dsl;
pub mod error;
pub mod executor;
pub mod fqn;
pub mod graph;
pub mod job;

pub use compiler::compile;
pub use context::ExecutionContext;
pub use error::{GraphError, Result};
pub use executor::{DagExecutor, SAVED_RESULTS_KEY, TASK_PASS_THROUGH_KEY};
pub use fqn::Fqn;
pub use graph::CompiledGraph;
pub use job::{Job, JobContext, JobOutput, JobProperties, JobResult, Task};
