//! Planardl - Typed fact extraction from syntax trees
//!
//! This crate re-exports all layers of the Planardl system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 4: planardl_runtime    — Sessions, parallel runs, serialization
//!          planardl_stdlib     — Builtin string externs
//! Layer 3: planardl_engine     — Match compiler, syntax-tree match engine
//! Layer 2: planardl_language   — AST, modules, name resolution, typing
//! Layer 1: planardl_graph      — Fact graph, builders, sinks
//! Layer 0: planardl_foundation — Core types (Value, Type, Error)
//! ```

pub use planardl_engine as engine;
pub use planardl_foundation as foundation;
pub use planardl_graph as graph;
pub use planardl_language as language;
pub use planardl_runtime as runtime;
pub use planardl_stdlib as stdlib;
