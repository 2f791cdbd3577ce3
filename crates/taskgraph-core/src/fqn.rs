//! Fully-qualified names: `<graph>$$<variant>$$<short>$$`.
//!
//! The FQN is the stable key used throughout execution and result delivery.
//! `$$` is the field delimiter and a trailing `$$` is mandatory; splitting on
//! it must yield exactly four fields (graph, variant, short, empty-trailer).
//! Any other shape is a [`GraphError::ParseError`](crate::error::GraphError::ParseError),
//! never a best-effort guess.

use std::fmt;

use crate::error::{GraphError, Result};

const SEP: &str = "$$";

/// A parsed, validated fully-qualified job or graph name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fqn {
    raw: String,
    graph_end: usize,
    variant_end: usize,
}

impl Fqn {
    /// Build and validate an FQN from its three components.
    pub fn format(graph: &str, variant: &str, short: &str) -> Self {
        let raw = format!("{graph}{SEP}{variant}{SEP}{short}{SEP}");
        // Recomputing the split here keeps `format` and `parse` in lockstep
        // instead of trusting the caller's inputs are separator-free.
        Self::parse(&raw).expect("format() must always produce a parseable FQN")
    }

    /// Parse a raw FQN string, enforcing the four-field shape.
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.split(SEP).collect();
        if fields.len() != 4 || !fields[3].is_empty() {
            return Err(GraphError::ParseError(raw.to_string()));
        }
        let graph_end = fields[0].len();
        let variant_end = graph_end + SEP.len() + fields[1].len();
        Ok(Self {
            raw: raw.to_string(),
            graph_end,
            variant_end,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn graph_name(&self) -> &str {
        &self.raw[..self.graph_end]
    }

    pub fn variant(&self) -> &str {
        &self.raw[self.graph_end + SEP.len()..self.variant_end]
    }

    pub fn short_name(&self) -> &str {
        &self.raw[self.variant_end + SEP.len()..self.raw.len() - SEP.len()]
    }

    /// `<graph>$$<variant>$$` — used by the compiler to probe for collisions
    /// before trying a variant suffix.
    pub fn base_prefix(&self) -> &str {
        &self.raw[..self.variant_end + SEP.len()]
    }
}

impl fmt::Display for Fqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for Fqn {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}
