//! Interface to externally parsed syntax trees.
//!
//! The engine never parses subject files itself. A [`GrammarParser`] turns
//! source text into a [`SyntaxTree`], and the tree answers structural
//! queries with ordered [`QueryMatch`]es. Nodes are opaque [`NodeRef`]s.
//!
//! [`MemoryTree`] is an in-memory tree whose query results are registered
//! up front, for hosts that already hold a parsed document and for tests.

use std::collections::HashMap;

use planardl_foundation::{NodeRef, Result, Span};

// =============================================================================
// Query results
// =============================================================================

/// One result of a structural query: capture name to node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryMatch {
    captures: Vec<(String, NodeRef)>,
}

impl QueryMatch {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `capture` to `node` (builder form).
    #[must_use]
    pub fn with(mut self, capture: impl Into<String>, node: NodeRef) -> Self {
        self.insert(capture, node);
        self
    }

    /// Binds `capture` to `node`, replacing an earlier binding.
    pub fn insert(&mut self, capture: impl Into<String>, node: NodeRef) {
        let capture = capture.into();
        match self.captures.iter_mut().find(|(name, _)| *name == capture) {
            Some(slot) => slot.1 = node,
            None => self.captures.push((capture, node)),
        }
    }

    /// The node bound to `capture`.
    #[must_use]
    pub fn get(&self, capture: &str) -> Option<NodeRef> {
        self.captures
            .iter()
            .find(|(name, _)| name == capture)
            .map(|(_, node)| *node)
    }

    /// Iterates bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeRef)> {
        self.captures.iter().map(|(name, node)| (name.as_str(), *node))
    }
}

// =============================================================================
// Traits
// =============================================================================

/// A parsed subject file.
pub trait SyntaxTree: Send + Sync {
    /// Runs a structural query, returning results in tree order.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` error if the query text is invalid for the grammar.
    fn query(&self, literal: &str) -> Result<Vec<QueryMatch>>;

    /// Source text of a node.
    fn text(&self, node: NodeRef) -> Option<&str>;

    /// The child stored under a named field.
    fn child(&self, node: NodeRef, field: &str) -> Option<NodeRef>;

    /// Grammar kind of a node.
    fn kind(&self, node: NodeRef) -> Option<&str>;
}

/// Parses subject files of one grammar.
pub trait GrammarParser: Send + Sync {
    /// Parses `source` into a syntax tree.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` error if the source cannot be parsed.
    fn parse(&self, source: &str) -> Result<Box<dyn SyntaxTree>>;
}

impl<F> GrammarParser for F
where
    F: Fn(&str) -> Result<Box<dyn SyntaxTree>> + Send + Sync,
{
    fn parse(&self, source: &str) -> Result<Box<dyn SyntaxTree>> {
        self(source)
    }
}

// =============================================================================
// MemoryTree
// =============================================================================

#[derive(Clone, Debug)]
struct MemoryNode {
    kind: String,
    text: String,
    span: Span,
    fields: Vec<(String, u64)>,
}

/// A syntax tree held in memory with pre-registered query results.
///
/// Queries that were never registered have no results.
#[derive(Clone, Debug, Default)]
pub struct MemoryTree {
    nodes: Vec<MemoryNode>,
    queries: HashMap<String, Vec<QueryMatch>>,
}

impl MemoryTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its handle.
    pub fn add_node(&mut self, kind: impl Into<String>, text: impl Into<String>) -> NodeRef {
        self.add_node_at(kind, text, Span::default())
    }

    /// Adds a node at a source position.
    pub fn add_node_at(
        &mut self,
        kind: impl Into<String>,
        text: impl Into<String>,
        span: Span,
    ) -> NodeRef {
        let id = self.nodes.len() as u64;
        self.nodes.push(MemoryNode {
            kind: kind.into(),
            text: text.into(),
            span,
            fields: Vec::new(),
        });
        NodeRef::new(id, span)
    }

    /// Stores `child` under `field` of `parent`.
    pub fn set_child(&mut self, parent: NodeRef, field: impl Into<String>, child: NodeRef) {
        if let Some(node) = self.node_mut(parent) {
            node.fields.push((field.into(), child.id));
        }
    }

    /// Appends a result for `literal`.
    pub fn add_match(&mut self, literal: impl Into<String>, result: QueryMatch) {
        self.queries.entry(literal.into()).or_default().push(result);
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, node: NodeRef) -> Option<&MemoryNode> {
        usize::try_from(node.id).ok().and_then(|i| self.nodes.get(i))
    }

    fn node_mut(&mut self, node: NodeRef) -> Option<&mut MemoryNode> {
        usize::try_from(node.id)
            .ok()
            .and_then(|i| self.nodes.get_mut(i))
    }
}

impl SyntaxTree for MemoryTree {
    fn query(&self, literal: &str) -> Result<Vec<QueryMatch>> {
        Ok(self.queries.get(literal).cloned().unwrap_or_default())
    }

    fn text(&self, node: NodeRef) -> Option<&str> {
        self.node(node).map(|n| n.text.as_str())
    }

    fn child(&self, node: NodeRef, field: &str) -> Option<NodeRef> {
        let parent = self.node(node)?;
        let (_, id) = parent.fields.iter().find(|(name, _)| name == field)?;
        let span = self.node(NodeRef::new(*id, Span::default()))?.span;
        Some(NodeRef::new(*id, span))
    }

    fn kind(&self, node: NodeRef) -> Option<&str> {
        self.node(node).map(|n| n.kind.as_str())
    }
}
