//! Fact graph storage with forward and reverse edge indices.
//!
//! A [`FactGraphBuilder`] is private to one matching run. Finishing it
//! yields an immutable [`FactGraph`] that can be shared freely.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use planardl_foundation::{Error, FactId, NodeRef, Result, Value};

use crate::fact::{Edge, FactInstance};

#[cfg(feature = "serde")]
mod serde_support {
    use super::FactGraph;
    use crate::fact::{Edge, FactInstance};
    use serde::ser::SerializeStruct;
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

    impl Serialize for FactGraph {
        fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            // Indices are rebuilt on load
            let mut state = serializer.serialize_struct("FactGraph", 2)?;
            state.serialize_field("facts", &self.facts)?;
            state.serialize_field("edges", &self.edges)?;
            state.end()
        }
    }

    impl<'de> Deserialize<'de> for FactGraph {
        fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            #[derive(Deserialize)]
            struct Parts {
                facts: Vec<FactInstance>,
                edges: Vec<Edge>,
            }

            let parts = Parts::deserialize(deserializer)?;
            FactGraph::from_parts(parts.facts, parts.edges).map_err(de::Error::custom)
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// A position in a builder that can be rolled back to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    facts: usize,
    edges: usize,
}

/// Mutable fact graph under construction.
#[derive(Clone, Debug, Default)]
pub struct FactGraphBuilder {
    facts: Vec<FactInstance>,
    edges: Vec<Edge>,
}

impl FactGraphBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of facts added so far.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Number of edges added so far.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Adds a fact and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the graph cannot address more facts.
    pub fn add_fact(
        &mut self,
        fact: Arc<str>,
        fields: Vec<(Arc<str>, Value)>,
        origin: Option<NodeRef>,
    ) -> Result<FactId> {
        let id = u32::try_from(self.facts.len())
            .map(FactId)
            .map_err(|_| Error::internal("fact graph is full"))?;
        self.facts.push(FactInstance {
            id,
            fact,
            fields,
            origin,
        });
        Ok(id)
    }

    /// Adds a directed edge between two facts of this builder.
    ///
    /// # Errors
    ///
    /// Returns an internal error if either end is not a fact of this builder.
    pub fn add_edge(&mut self, from: FactId, to: FactId, kind: Option<Arc<str>>) -> Result<()> {
        for id in [from, to] {
            if id.index() >= self.facts.len() {
                return Err(Error::internal(format!("edge end {id} does not exist")));
            }
        }
        self.edges.push(Edge::new(from, to, kind));
        Ok(())
    }

    /// Gets a fact added to this builder.
    #[must_use]
    pub fn fact(&self, id: FactId) -> Option<&FactInstance> {
        self.facts.get(id.index())
    }

    /// Marks the current position.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            facts: self.facts.len(),
            edges: self.edges.len(),
        }
    }

    /// Discards everything added after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.facts.truncate(checkpoint.facts);
        self.edges.truncate(checkpoint.edges);
    }

    /// Finishes the graph.
    #[must_use]
    pub fn build(self) -> FactGraph {
        FactGraph::index(self.facts, self.edges)
    }
}

// =============================================================================
// Graph
// =============================================================================

/// Immutable output of one matching run over one subject file.
///
/// Maintains indices for efficient traversal:
/// - Forward: source fact -> edge positions
/// - Reverse: target fact -> edge positions
/// - By type: fact name -> fact ids
#[derive(Clone, Debug, Default)]
pub struct FactGraph {
    facts: Vec<FactInstance>,
    edges: Vec<Edge>,
    forward: HashMap<FactId, Vec<usize>>,
    reverse: HashMap<FactId, Vec<usize>>,
    by_type: HashMap<Arc<str>, Vec<FactId>>,
}

impl FactGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a graph from its facts and edges.
    ///
    /// # Errors
    ///
    /// Returns an internal error if fact ids are not dense and ordered, or if
    /// an edge refers to a missing fact.
    pub fn from_parts(facts: Vec<FactInstance>, edges: Vec<Edge>) -> Result<Self> {
        for (i, fact) in facts.iter().enumerate() {
            if fact.id.index() != i {
                return Err(Error::internal(format!(
                    "fact at position {i} has id {}",
                    fact.id
                )));
            }
        }
        if let Some(edge) = edges
            .iter()
            .find(|e| e.from.index() >= facts.len() || e.to.index() >= facts.len())
        {
            return Err(Error::internal(format!("dangling edge {edge}")));
        }
        Ok(Self::index(facts, edges))
    }

    fn index(facts: Vec<FactInstance>, edges: Vec<Edge>) -> Self {
        let mut forward: HashMap<FactId, Vec<usize>> = HashMap::new();
        let mut reverse: HashMap<FactId, Vec<usize>> = HashMap::new();
        let mut by_type: HashMap<Arc<str>, Vec<FactId>> = HashMap::new();

        for fact in &facts {
            by_type.entry(fact.fact.clone()).or_default().push(fact.id);
        }
        for (pos, edge) in edges.iter().enumerate() {
            forward.entry(edge.from).or_default().push(pos);
            reverse.entry(edge.to).or_default().push(pos);
        }

        Self {
            facts,
            edges,
            forward,
            reverse,
            by_type,
        }
    }

    /// Returns the number of facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if the graph has no facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// All facts in emission order.
    #[must_use]
    pub fn facts(&self) -> &[FactInstance] {
        &self.facts
    }

    /// All edges in emission order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Gets a fact by id.
    #[must_use]
    pub fn fact(&self, id: FactId) -> Option<&FactInstance> {
        self.facts.get(id.index())
    }

    /// Facts of the given declared name, in emission order.
    ///
    /// Accepts the fully-qualified name or its last segment.
    pub fn facts_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FactInstance> + 'a {
        self.facts.iter().filter(move |f| f.is_a(name))
    }

    /// Number of facts of the given fully-qualified name.
    #[must_use]
    pub fn count_of(&self, name: &str) -> usize {
        self.by_type.get(name).map_or(0, Vec::len)
    }

    /// Edges leaving a fact (forward traversal).
    pub fn outgoing(&self, id: FactId) -> impl Iterator<Item = &Edge> + '_ {
        self.forward
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&pos| &self.edges[pos])
    }

    /// Edges entering a fact (reverse traversal).
    pub fn incoming(&self, id: FactId) -> impl Iterator<Item = &Edge> + '_ {
        self.reverse
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&pos| &self.edges[pos])
    }

    /// Checks if a specific edge exists.
    #[must_use]
    pub fn has_edge(&self, from: FactId, to: FactId, kind: Option<&str>) -> bool {
        self.outgoing(from)
            .any(|e| e.to == to && e.kind.as_deref() == kind)
    }
}

impl PartialEq for FactGraph {
    fn eq(&self, other: &Self) -> bool {
        self.facts == other.facts && self.edges == other.edges
    }
}

impl Eq for FactGraph {}

impl fmt::Display for FactGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fact in &self.facts {
            writeln!(f, "{fact}")?;
        }
        for edge in &self.edges {
            writeln!(f, "{edge}")?;
        }
        Ok(())
    }
}
