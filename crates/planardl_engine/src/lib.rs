//! Match compilation and execution for Planardl.
//!
//! This crate provides:
//! - [`MatchCompiler`] - Lowering node handlers into [`MatcherPlan`]s
//! - [`MatchEngine`] - Running plans over a [`SyntaxTree`] to build a fact graph
//! - [`HostFunctions`] - Host implementations of extern declarations
//! - [`Evaluator`] - Expression and refinement evaluation on concrete values
//! - [`EngineConfig`] - Refinement policy and run limits

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod compiler;
pub mod config;
pub mod engine;
pub mod eval;
pub mod host;
pub mod scope;
pub mod syntax;

pub use compiler::{
    BlockPlan, CapturePlan, ConstructPlan, EdgePlan, EmitPlan, FieldPlan, LetPlan, MatchCompiler,
    MatcherPlan, OperandPlan, PlanSet, StmtPlan,
};
pub use config::{EngineConfig, RefinementPolicy};
pub use engine::{MatchEngine, MatchOutcome};
pub use eval::{Evaluator, coerce, node_text};
pub use host::{HostFn, HostFunctions};
pub use scope::{FrameId, ScopeArena};
pub use syntax::{GrammarParser, MemoryTree, QueryMatch, SyntaxTree};
