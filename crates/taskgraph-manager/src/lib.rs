//! # taskgraph-manager — the concurrent flow manager
//!
//! Owns a registry of compiled graphs, a cooperative-scheduling submission
//! pipeline, a results buffer, and completion counters. This crate is the
//! thing applications actually hold onto: `taskgraph-core` compiles one
//! graph and walks one task through it; `FlowManager` is what lets many
//! independent tasks stream through many graphs concurrently, with results
//! collected by blocking wait, by draining a buffer, or by callback.
//!
//! ```
//! use std::sync::Arc;
//! use taskgraph_core::dsl::{wrap_value, IntoDslNode};
//! use taskgraph_manager::{FlowManager, ManagerConfig};
//! use serde_json::Value;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = FlowManager::new(ManagerConfig::default());
//! let tree = Arc::new(wrap_value("greeting", Value::from("hello")).into_dsl_node());
//! let fqn = manager.add_dsl(tree, "demo", None)?;
//! manager.submit(Default::default(), fqn.as_str())?;
//! manager.wait_for_completion(None, None).await?;
//! let results = manager.pop_results();
//! assert_eq!(results.completed[fqn.as_str()][0]["value"], Value::from("hello"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod counters;
pub mod manager;
pub mod registry;
pub mod results;
mod submission;

pub use config::ManagerConfig;
pub use counters::CountsSnapshot;
pub use manager::FlowManager;
pub use results::PopResult;
