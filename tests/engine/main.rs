//! Integration tests for Layer 3: Engine
//!
//! Tests for match compilation, capture scoping, fault policies, and
//! relation emission over in-memory syntax trees.

mod fixtures;
mod matching;
mod relations;
mod scoping;
