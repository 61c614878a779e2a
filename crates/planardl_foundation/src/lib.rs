//! Core types, values, spans, and diagnostics for Planardl.
//!
//! This crate provides:
//! - [`Value`] - Runtime values produced while matching syntax trees
//! - [`Type`] - Canonical resolved types used by the checker and the engine
//! - [`NodeRef`] / [`FactId`] - Handles for syntax nodes and emitted facts
//! - [`Span`] - Source locations for diagnostics
//! - [`Error`] / [`Diagnostics`] - Carrier-typed errors with kind, message, and span
//! - Persistent collections ([`PdList`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod error;
pub mod ids;
pub mod span;
pub mod types;
pub mod value;

pub use collections::PdList;
pub use error::{Diagnostics, Error, ErrorCategory, ErrorContext, ErrorKind, SemanticLimit};
pub use ids::{FactId, NodeRef};
pub use span::Span;
pub use types::Type;
pub use value::Value;

/// Result type used across all Planardl crates.
pub type Result<T> = std::result::Result<T, Error>;
