//! Fact instances and the typed edges between them.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use planardl_foundation::{FactId, NodeRef, Value};

/// One emitted fact.
///
/// Fields keep their emission order for display; equality ignores it.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactInstance {
    /// Position of this fact in its graph.
    pub id: FactId,
    /// Fully-qualified name of the declared fact.
    pub fact: Arc<str>,
    /// Assigned fields, in emission order.
    pub fields: Vec<(Arc<str>, Value)>,
    /// The syntax node whose capture emitted this fact.
    pub origin: Option<NodeRef>,
}

impl FactInstance {
    /// Gets a field value by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Returns true if the field was assigned.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Returns true if this fact is an instance of the named fact.
    ///
    /// Accepts either the fully-qualified name or its last segment.
    #[must_use]
    pub fn is_a(&self, name: &str) -> bool {
        self.fact.as_ref() == name || self.fact.rsplit('.').next() == Some(name)
    }
}

impl PartialEq for FactInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.fact == other.fact
            && self.origin == other.origin
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(name, value)| other.field(name) == Some(value))
    }
}

impl Eq for FactInstance {}

impl fmt::Display for FactInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {{", self.id, self.fact)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {name}: {value:?}")?;
        }
        if self.fields.is_empty() {
            write!(f, "}}")
        } else {
            write!(f, " }}")
        }
    }
}

/// A directed, optionally named edge between two facts.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Edge {
    /// Source fact.
    pub from: FactId,
    /// Target fact.
    pub to: FactId,
    /// Relation kind for named relations.
    pub kind: Option<Arc<str>>,
}

impl Edge {
    /// Creates a new edge.
    #[must_use]
    pub fn new(from: FactId, to: FactId, kind: Option<Arc<str>>) -> Self {
        Self { from, to, kind }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{} -[{kind}]-> {}", self.from, self.to),
            None => write!(f, "{} -> {}", self.from, self.to),
        }
    }
}
