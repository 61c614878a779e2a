//! Refinement checking.
//!
//! A refinement is a boolean predicate over `it`. Checking happens once, at
//! compile time; the result is a [`Predicate`] holding the lowered
//! expression, which the match engine evaluates against emitted values.

use std::fmt;

use planardl_foundation::{Error, ErrorKind, Result, Type};

use crate::ast::{Expr, ExprKind};
use crate::extern_registry::ExternRegistry;
use crate::typing::{ExprTyper, RefinementScope, TypedExpr};

/// A type-checked refinement predicate.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    /// Source form, used in diagnostics.
    pub source: String,
    /// The lowered predicate; its type is `Bool` (or `Any`).
    pub typed: TypedExpr,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Type-checks refinements against the extern registry.
#[derive(Clone, Copy, Debug)]
pub struct RefinementChecker<'a> {
    typer: ExprTyper<'a>,
}

impl<'a> RefinementChecker<'a> {
    /// Creates a checker resolving calls through `externs`.
    #[must_use]
    pub const fn new(externs: &'a ExternRegistry) -> Self {
        Self {
            typer: ExprTyper::new(externs),
        }
    }

    /// Checks `refinement` with `it` bound to `subject`.
    ///
    /// A bare name is read as a predicate call on `it`, so `| is_pascal_case`
    /// means `is_pascal_case(it)`.
    ///
    /// # Errors
    ///
    /// Returns `RefinementType` if an operator does not apply or the
    /// predicate is not boolean, and the registry's own errors for calls
    /// that do not resolve.
    pub fn check(&self, refinement: &Expr, subject: &Type) -> Result<Predicate> {
        let expanded;
        let expr = match &refinement.kind {
            ExprKind::Name(name) => {
                expanded = Expr::call(name.clone(), vec![Expr::it().at(refinement.span)])
                    .at(refinement.span);
                &expanded
            }
            _ => refinement,
        };

        let scope = RefinementScope::new(subject.clone());
        let typed = self.typer.type_expr(expr, &scope)?;

        if !matches!(typed.ty, Type::Bool | Type::Any) {
            return Err(Error::new(ErrorKind::RefinementType {
                expr: refinement.to_string(),
                message: format!("predicate has type {}, expected Bool", typed.ty),
            })
            .with_span(refinement.span));
        }

        Ok(Predicate {
            source: refinement.to_string(),
            typed,
        })
    }
}
