//! Canonical type descriptors.
//!
//! A [`Type`] is what a type reference resolves to once aliases are expanded
//! and generic applications are validated. Refinement predicates are kept
//! alongside the type by the language layer; this descriptor only carries
//! the structural shape.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Canonical, alias-free type descriptor.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Type {
    /// Boolean type.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// String type.
    String,
    /// A node of the subject syntax tree.
    Node,
    /// Homogeneous list type (the builtin generic `List<T>`).
    List(Box<Type>),
    /// A declared fact, by fully-qualified name.
    Fact(String),
    /// Anonymous record type from a nested type definition.
    Record(Vec<(String, Type)>),
    /// Any type (dynamic values whose type is unknown statically).
    Any,
}

impl Type {
    /// Creates a list type with the given element type.
    #[must_use]
    pub fn list(element: Type) -> Self {
        Self::List(Box::new(element))
    }

    /// Creates a fact type.
    #[must_use]
    pub fn fact(name: impl Into<String>) -> Self {
        Self::Fact(name.into())
    }

    /// Returns true if this type is `Int` or `Float`.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Returns true for the scalar types a syntax node's text can be coerced into.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Float | Self::String)
    }

    /// Returns true if this type is `Any`.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Result type of arithmetic between two numeric types.
    ///
    /// Returns `None` if either side is not numeric.
    #[must_use]
    pub fn numeric_join(&self, other: &Type) -> Option<Type> {
        match (self, other) {
            (Self::Int, Self::Int) => Some(Self::Int),
            (Self::Int | Self::Float, Self::Int | Self::Float) => Some(Self::Float),
            (Self::Any, t) | (t, Self::Any) if t.is_numeric() || t.is_any() => Some(Self::Any),
            _ => None,
        }
    }

    /// Checks if a value of `actual` type may be stored where `self` is expected.
    ///
    /// - `Any` on either side is accepted (checked dynamically instead)
    /// - `Float` accepts `Int` (numeric promotion)
    /// - scalars and facts accept `Node`; the engine coerces the node's text,
    ///   or resolves the node's associated fact, when the value is stored
    /// - lists and records are checked structurally
    #[must_use]
    pub fn accepts(&self, actual: &Type) -> bool {
        if self.is_any() || actual.is_any() {
            return true;
        }

        match (self, actual) {
            (Self::Bool, Self::Bool)
            | (Self::Int | Self::Float, Self::Int)
            | (Self::Float, Self::Float)
            | (Self::String, Self::String)
            | (Self::Node, Self::Node) => true,

            (expected, Self::Node) if expected.is_scalar() => true,
            (Self::Fact(_), Self::Node) => true,

            (Self::Fact(expected), Self::Fact(actual)) => expected == actual,
            (Self::List(expected), Self::List(actual)) => expected.accepts(actual),
            (Self::Record(expected), Self::Record(actual)) => {
                expected.len() == actual.len()
                    && expected.iter().all(|(name, ty)| {
                        actual
                            .iter()
                            .find(|(n, _)| n == name)
                            .is_some_and(|(_, t)| ty.accepts(t))
                    })
            }

            _ => false,
        }
    }

    /// Checks if two types can be compared with `==` / `!=`.
    #[must_use]
    pub fn equatable_with(&self, other: &Type) -> bool {
        (self.is_numeric() && other.is_numeric()) || self.accepts(other) || other.accepts(self)
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "Bool"),
            Self::Int => write!(f, "Int"),
            Self::Float => write!(f, "Float"),
            Self::String => write!(f, "String"),
            Self::Node => write!(f, "Node"),
            Self::List(t) => write!(f, "List<{t:?}>"),
            Self::Fact(name) => write!(f, "{name}"),
            Self::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty:?}")?;
                }
                write!(f, "}}")
            }
            Self::Any => write!(f, "Any"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
