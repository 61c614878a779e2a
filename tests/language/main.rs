//! Integration tests for Layer 2: Language
//!
//! Tests for module loading, name resolution, externs, and refinements.

mod externs;
mod modules;
mod refinements;
