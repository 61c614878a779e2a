//! Integration tests for the full pipeline
//!
//! Tests sessions from module declarations through parsing, matching, and
//! graph serialization.

mod compose;
mod parallel;
mod sinks;
