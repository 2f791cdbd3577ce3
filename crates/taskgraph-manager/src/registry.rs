//! The graph registry: compiled graphs keyed by FQN, plus the DSL-identity
//! cache that makes `add_dsl` idempotent for a given tree instance.
//!
//! Read-heavy and read-only once a graph is compiled (spec §5's
//! "shared-resource policy"), so a concurrent map is the natural fit —
//! grounded in `orchestrator`'s own use of `dashmap` for its websocket
//! connection table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use taskgraph_core::compiler::compile;
use taskgraph_core::dsl::DslNode;
use taskgraph_core::{CompiledGraph, Fqn, GraphError, Result};

#[derive(Default)]
pub struct Registry {
    graphs: DashMap<String, Arc<CompiledGraph>>,
    /// Tree-pointer identity (`Arc::as_ptr`) → the FQN it compiled to, so
    /// resubmitting the exact same DSL instance is a cache hit rather than
    /// a fresh compile (`tests/test_flowmanager_details.py`'s resubmission
    /// case).
    dsl_cache: Mutex<HashMap<usize, String>>,
}

impl Registry {
    pub fn get(&self, fqn: &str) -> Option<Arc<CompiledGraph>> {
        self.graphs.get(fqn).map(|entry| entry.clone())
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.graphs.contains_key(fqn)
    }

    pub fn fq_names(&self) -> Vec<String> {
        self.graphs.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Compile `tree` under `graph_name`/`variant` and register it, unless
    /// this exact tree instance was already registered — in which case the
    /// cached FQN is returned unchanged (spec §4.3's idempotence clause).
    pub fn add_dsl(
        &self,
        tree: &Arc<DslNode>,
        graph_name: &str,
        variant: Option<&str>,
    ) -> Result<Fqn> {
        let identity = Arc::as_ptr(tree) as *const () as usize;
        if let Some(cached) = self.dsl_cache.lock().unwrap().get(&identity) {
            return Fqn::parse(cached);
        }

        let fqn_taken = |candidate: &str| self.graphs.contains_key(candidate);
        let graph = compile(tree, graph_name, variant, &fqn_taken)?;
        let fqn = graph.fqn.clone();
        self.graphs.insert(fqn.as_str().to_string(), Arc::new(graph));
        self.dsl_cache
            .lock()
            .unwrap()
            .insert(identity, fqn.as_str().to_string());
        Ok(fqn)
    }

    pub fn require(&self, fqn: &str) -> Result<Arc<CompiledGraph>> {
        self.get(fqn).ok_or_else(|| GraphError::UnknownFqn(fqn.to_string()))
    }

    pub fn reset(&self) {
        self.graphs.clear();
        self.dsl_cache.lock().unwrap().clear();
    }
}
