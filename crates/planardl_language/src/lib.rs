//! Declarations, module loading, and static checking for Planardl.
//!
//! This crate provides:
//! - [`ast`] - The declaration tree every front end produces
//! - [`ModuleLoader`] - Loading a root module and its imports
//! - [`SymbolTable`] - Resolved types, fact/query/edge schemas, node handlers
//! - [`RefinementChecker`] / [`ExprTyper`] - Static typing of predicates and expressions
//! - [`ExternRegistry`] - Host function signatures and call resolution

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ast;
pub mod extern_registry;
pub mod module_registry;
pub mod refinement;
pub mod resolver;
pub mod typing;

pub use extern_registry::{ExternKey, ExternRegistry, ExternSignature};
pub use module_registry::{InMemoryModules, ModuleLoader, ModuleRegistry, ModuleResolver};
pub use refinement::{Predicate, RefinementChecker};
pub use resolver::{
    EdgeSchema, FactSchema, FieldSchema, NodeEntry, QuerySchema, ResolvedType, Symbol,
    SymbolKind, SymbolTable, primitive_arity, primitive_type,
};
pub use typing::{ExprTyper, RefinementScope, ScopeContext, TypeScope, TypedExpr, TypedExprKind};
