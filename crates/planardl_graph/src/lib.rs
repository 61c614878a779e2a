//! Fact graph storage, typed edges, and sinks for Planardl.
//!
//! This crate provides:
//! - [`FactInstance`] / [`Edge`] - Emitted facts and the relations between them
//! - [`FactGraphBuilder`] - Mutable graph private to one matching run
//! - [`FactGraph`] - Immutable result with forward and reverse indices
//! - [`FactSink`] - Downstream consumers of finished graphs

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod fact;
pub mod graph;
pub mod sink;

pub use fact::{Edge, FactInstance};
pub use graph::{Checkpoint, FactGraph, FactGraphBuilder};
pub use sink::{CollectingSink, FactSink};
