//! Handles for syntax nodes and emitted facts.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::span::Span;

/// Opaque reference to a node of an externally parsed syntax tree.
///
/// The core never inspects grammar internals: a `NodeRef` is compared by
/// its identity only. The span is carried along for diagnostics.
#[derive(Copy, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeRef {
    /// Identity assigned by the syntax tree that produced this node.
    pub id: u64,
    /// Position of the node in the subject file.
    pub span: Span,
}

impl NodeRef {
    /// Creates a new node reference.
    #[must_use]
    pub const fn new(id: u64, span: Span) -> Self {
        Self { id, span }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeRef {}

impl std::hash::Hash for NodeRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({}@{})", self.id, self.span)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.id)
    }
}

/// Index of a fact instance inside a single fact graph.
///
/// Ids are dense and allocated in emission order, so they double as the
/// position of the fact in the graph's fact list.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactId(pub u32);

impl FactId {
    /// Returns the raw index of this fact.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FactId({})", self.0)
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fact#{}", self.0)
    }
}
