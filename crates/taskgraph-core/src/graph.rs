//! The compiled graph (C3 output, C4/C5 input).
//!
//! A [`CompiledGraph`] is the adjacency representation the executor walks:
//! nodes keyed by FQN, an ordered successor list per node, the unordered
//! `expected_inputs` fan-in set per node, and a single head/tail.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::fqn::Fqn;
use crate::job::Job;

/// One node's static data within a compiled graph.
pub struct NodeEntry {
    pub job: Arc<dyn Job>,
    /// Successor FQNs, in the order edges were added. Order is preserved
    /// (not just a set) since DSL authors may rely on deterministic
    /// fan-out, e.g. for logging order.
    pub successors: Vec<Fqn>,
    /// The set of predecessor FQNs this node must see before it may run.
    /// Empty only for the head.
    pub expected_inputs: HashSet<Fqn>,
}

/// A compiled, acyclic job graph: one head, one tail (synthetic when the
/// DSL had multiple sources/sinks), identified by its own FQN.
pub struct CompiledGraph {
    pub fqn: Fqn,
    pub nodes: HashMap<Fqn, NodeEntry>,
    pub head: Fqn,
    pub tail: Fqn,
}

impl CompiledGraph {
    pub fn node(&self, fqn: &Fqn) -> Option<&NodeEntry> {
        self.nodes.get(fqn)
    }

    /// All node FQNs in this graph (introspection helper, spec §6).
    pub fn fq_names(&self) -> Vec<Fqn> {
        self.nodes.keys().cloned().collect()
    }

    /// The head job(s) of this graph. A compiled graph always has exactly
    /// one head (synthetic `DefaultHead` inserted by the compiler when the
    /// DSL had more than one source), so this is a one-element slice in
    /// practice but returned as a `Vec` to match the introspection surface
    /// named in spec §6.
    pub fn head_jobs(&self) -> Vec<Fqn> {
        vec![self.head.clone()]
    }
}
