//! The graph compiler (C3): turns a [`DslNode`] tree into a [`CompiledGraph`].
//!
//! Compilation is described as contracts, not steps, in the core's design:
//! assign FQNs to every leaf, expand `serial`/`parallel` into adjacency,
//! derive `expected_inputs` from the edge list, inject synthetic head/tail
//! nodes when the tree has more than one source/sink, and assign the graph
//! its own FQN with collision-suffix disambiguation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::dsl::DslNode;
use crate::error::{GraphError, Result};
use crate::fqn::Fqn;
use crate::graph::{CompiledGraph, NodeEntry};
use crate::job::{Job, JobContext, JobOutput, JobResult};

const DEFAULT_HEAD_SHORT: &str = "DefaultHead";
const DEFAULT_TAIL_SHORT: &str = "DefaultTail";

/// Synthetic head inserted when a tree has more than one source. Returns an
/// empty map, same as any other head receiving the empty input.
struct DefaultHeadJob;

#[async_trait]
impl Job for DefaultHeadJob {
    async fn run(&self, _ctx: &JobContext<'_>) -> JobResult {
        Ok(JobOutput::new())
    }

    fn short_name(&self) -> &str {
        DEFAULT_HEAD_SHORT
    }
}

/// Synthetic tail inserted when a tree has more than one sink. Returns a
/// map of its predecessors' outputs keyed by their parsed short names —
/// `JobContext::get_inputs` already does exactly that resolution.
struct DefaultTailJob;

#[async_trait]
impl Job for DefaultTailJob {
    async fn run(&self, ctx: &JobContext<'_>) -> JobResult {
        let mut out = JobOutput::new();
        for (short, output) in ctx.get_inputs() {
            out.insert(short, serde_json::to_value(output).unwrap_or_default());
        }
        Ok(out)
    }

    fn short_name(&self) -> &str {
        DEFAULT_TAIL_SHORT
    }
}

/// Intermediate adjacency accumulated while walking the DSL tree.
struct Fragment {
    jobs: HashMap<Fqn, Arc<dyn Job>>,
    edges: Vec<(Fqn, Fqn)>,
    heads: Vec<Fqn>,
    tails: Vec<Fqn>,
}

impl Fragment {
    fn leaf(fqn: Fqn, job: Arc<dyn Job>) -> Self {
        let mut jobs = HashMap::new();
        jobs.insert(fqn.clone(), job);
        Fragment {
            jobs,
            edges: Vec::new(),
            heads: vec![fqn.clone()],
            tails: vec![fqn],
        }
    }

    fn union(mut self, mut other: Fragment) -> Fragment {
        self.jobs.extend(other.jobs.drain());
        self.edges.append(&mut other.edges);
        self.heads.append(&mut other.heads);
        self.tails.append(&mut other.tails);
        self
    }

    fn chain(mut self, mut other: Fragment) -> Fragment {
        for tail in &self.tails {
            for head in &other.heads {
                self.edges.push((tail.clone(), head.clone()));
            }
        }
        self.jobs.extend(other.jobs.drain());
        self.edges.append(&mut other.edges);
        let tails = std::mem::take(&mut other.tails);
        Fragment {
            jobs: self.jobs,
            edges: self.edges,
            heads: self.heads,
            tails,
        }
    }
}

/// Tracks short-name assignment while walking one tree, so that the same
/// `Arc<dyn Job>` referenced from two DSL positions collapses to a single
/// node (Design Notes §9) while two *different* jobs sharing a short name
/// are rejected.
#[derive(Default)]
struct NameAssignment {
    by_short: HashMap<String, (Fqn, Option<usize>)>,
}

fn walk(
    node: &DslNode,
    graph_name: &str,
    variant: &str,
    assignment: &mut NameAssignment,
) -> Result<Fragment> {
    match node {
        DslNode::Leaf(spec) => {
            let short = spec.short_name();
            let identity = spec.identity();
            if let Some((existing_fqn, existing_identity)) = assignment.by_short.get(&short) {
                if identity.is_some() && *existing_identity == identity {
                    let fqn = existing_fqn.clone();
                    // Same job object seen again: reuse the node, no new job entry.
                    return Ok(Fragment {
                        jobs: HashMap::new(),
                        edges: Vec::new(),
                        heads: vec![fqn.clone()],
                        tails: vec![fqn],
                    });
                }
                return Err(GraphError::DuplicateShortName(short));
            }
            let fqn = Fqn::format(graph_name, variant, &short);
            assignment
                .by_short
                .insert(short, (fqn.clone(), identity));
            let job = spec.clone().into_job();
            Ok(Fragment::leaf(fqn, job))
        }
        DslNode::Parallel(children) => {
            let mut iter = children.iter();
            let first = iter
                .next()
                .ok_or_else(|| GraphError::Configuration("empty parallel composition".to_string()))?;
            let mut acc = walk(first, graph_name, variant, assignment)?;
            for child in iter {
                let next = walk(child, graph_name, variant, assignment)?;
                acc = acc.union(next);
            }
            Ok(acc)
        }
        DslNode::Serial(children) => {
            let mut iter = children.iter();
            let first = iter
                .next()
                .ok_or_else(|| GraphError::Configuration("empty serial composition".to_string()))?;
            let mut acc = walk(first, graph_name, variant, assignment)?;
            for child in iter {
                let next = walk(child, graph_name, variant, assignment)?;
                acc = acc.chain(next);
            }
            Ok(acc)
        }
    }
}

fn dedup_preserve_order(items: Vec<Fqn>) -> Vec<Fqn> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|f| seen.insert(f.clone())).collect()
}

/// Compile a DSL tree into a [`CompiledGraph`], given a name, an optional
/// variant tag, and a predicate telling the compiler whether a candidate
/// graph FQN is already taken (so the caller's registry stays the single
/// source of truth for collisions; the compiler only probes it).
#[tracing::instrument(skip_all, fields(graph_name, variant))]
pub fn compile(
    tree: &DslNode,
    graph_name: &str,
    variant: Option<&str>,
    fqn_taken: &dyn Fn(&str) -> bool,
) -> Result<CompiledGraph> {
    let base_variant = variant.unwrap_or("");
    let mut assignment = NameAssignment::default();
    let mut fragment = walk(tree, graph_name, base_variant, &mut assignment)?;

    let mut heads = dedup_preserve_order(std::mem::take(&mut fragment.heads));
    let mut tails = dedup_preserve_order(std::mem::take(&mut fragment.tails));

    if heads.len() > 1 {
        let head_fqn = Fqn::format(graph_name, base_variant, DEFAULT_HEAD_SHORT);
        fragment
            .jobs
            .insert(head_fqn.clone(), Arc::new(DefaultHeadJob));
        for h in &heads {
            fragment.edges.push((head_fqn.clone(), h.clone()));
        }
        heads = vec![head_fqn];
    }

    if tails.len() > 1 {
        let tail_fqn = Fqn::format(graph_name, base_variant, DEFAULT_TAIL_SHORT);
        fragment
            .jobs
            .insert(tail_fqn.clone(), Arc::new(DefaultTailJob));
        for t in &tails {
            fragment.edges.push((t.clone(), tail_fqn.clone()));
        }
        tails = vec![tail_fqn];
    }

    let head = heads
        .into_iter()
        .next()
        .ok_or_else(|| GraphError::Configuration("DSL tree has no leaves".to_string()))?;
    let tail = tails
        .into_iter()
        .next()
        .ok_or_else(|| GraphError::Configuration("DSL tree has no leaves".to_string()))?;

    let mut successors: HashMap<Fqn, Vec<Fqn>> =
        fragment.jobs.keys().map(|f| (f.clone(), Vec::new())).collect();
    let mut expected_inputs: HashMap<Fqn, HashSet<Fqn>> =
        fragment.jobs.keys().map(|f| (f.clone(), HashSet::new())).collect();

    for (from, to) in &fragment.edges {
        successors.entry(from.clone()).or_default().push(to.clone());
        expected_inputs.entry(to.clone()).or_default().insert(from.clone());
    }

    let mut nodes = HashMap::with_capacity(fragment.jobs.len());
    for (fqn, job) in fragment.jobs {
        let node_successors = successors.remove(&fqn).unwrap_or_default();
        let node_expected = expected_inputs.remove(&fqn).unwrap_or_default();
        nodes.insert(
            fqn,
            NodeEntry {
                job,
                successors: node_successors,
                expected_inputs: node_expected,
            },
        );
    }

    let graph_fqn = assign_graph_fqn(graph_name, base_variant, head.short_name(), fqn_taken);

    Ok(CompiledGraph {
        fqn: graph_fqn,
        nodes,
        head,
        tail,
    })
}

fn assign_graph_fqn(
    graph_name: &str,
    base_variant: &str,
    head_short: &str,
    fqn_taken: &dyn Fn(&str) -> bool,
) -> Fqn {
    let candidate = Fqn::format(graph_name, base_variant, head_short);
    if !fqn_taken(candidate.as_str()) {
        return candidate;
    }
    let mut suffix_num = 1u32;
    loop {
        let variant = format!("{base_variant}_{suffix_num}");
        let candidate = Fqn::format(graph_name, &variant, head_short);
        if !fqn_taken(candidate.as_str()) {
            return candidate;
        }
        suffix_num += 1;
    }
}
