//! Static typing of expressions.
//!
//! [`ExprTyper`] infers the type of an [`Expr`] and lowers it into a
//! [`TypedExpr`]: calls are bound to concrete extern signatures, operator
//! sections are expanded over `it`, and builtin operators are told apart
//! from extern overloads. The same typer serves refinements (where `it` is
//! bound) and match bodies (where captures and `let` names are bound).

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use planardl_foundation::{Error, ErrorKind, Result, Span, Type, Value};

use crate::ast::{BinaryOp, Expr, ExprKind, MembershipSet};
use crate::extern_registry::{ExternKey, ExternRegistry, ExternSignature};

// =============================================================================
// Typed expressions
// =============================================================================

/// An expression annotated with its static type.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedExpr {
    /// The lowered expression.
    pub kind: TypedExprKind,
    /// Static type; `Any` when only known at run time.
    pub ty: Type,
    /// Source span.
    pub span: Span,
}

/// Lowered expression forms.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedExprKind {
    /// The refined value.
    It,
    /// A constant.
    Literal(Value),
    /// List literal.
    List(Vec<TypedExpr>),
    /// A `let` binding.
    Name(String),
    /// A capture or one of its children.
    Capture {
        /// Capture name.
        name: String,
        /// Child field path.
        path: Vec<String>,
    },
    /// Operator implemented by the engine.
    Builtin {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<TypedExpr>,
        /// Right operand.
        right: Box<TypedExpr>,
    },
    /// Host call, including operator overloads.
    Call {
        /// The resolved signature.
        signature: Arc<ExternSignature>,
        /// Arguments.
        args: Vec<TypedExpr>,
    },
    /// Range membership.
    InRange {
        /// Tested value.
        subject: Box<TypedExpr>,
        /// Inclusive lower bound.
        start: Box<TypedExpr>,
        /// Upper bound; `None` is unbounded.
        end: Option<Box<TypedExpr>>,
        /// Whether `end` is included.
        inclusive: bool,
    },
    /// List membership.
    InList {
        /// Tested value.
        subject: Box<TypedExpr>,
        /// Candidate values.
        items: Vec<TypedExpr>,
    },
}

impl TypedExpr {
    fn new(kind: TypedExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    /// Collects the extern keys this expression calls.
    pub fn collect_externs(&self, keys: &mut BTreeSet<ExternKey>) {
        match &self.kind {
            TypedExprKind::It
            | TypedExprKind::Literal(_)
            | TypedExprKind::Name(_)
            | TypedExprKind::Capture { .. } => {}
            TypedExprKind::List(items) => {
                for item in items {
                    item.collect_externs(keys);
                }
            }
            TypedExprKind::Builtin { left, right, .. } => {
                left.collect_externs(keys);
                right.collect_externs(keys);
            }
            TypedExprKind::Call { signature, args } => {
                keys.insert(signature.key.clone());
                for arg in args {
                    arg.collect_externs(keys);
                }
            }
            TypedExprKind::InRange {
                subject, start, end, ..
            } => {
                subject.collect_externs(keys);
                start.collect_externs(keys);
                if let Some(end) = end {
                    end.collect_externs(keys);
                }
            }
            TypedExprKind::InList { subject, items } => {
                subject.collect_externs(keys);
                for item in items {
                    item.collect_externs(keys);
                }
            }
        }
    }
}

// =============================================================================
// Scopes
// =============================================================================

/// What kind of expression is being typed; selects the error kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeContext {
    /// A refinement predicate over `it`.
    Refinement,
    /// The value of a `let` binding.
    Let,
    /// A field value of an emitted fact.
    Emit,
}

/// Names visible to the typer.
pub trait TypeScope {
    /// The kind of expression being typed.
    fn context(&self) -> ScopeContext;

    /// Type of `it`, when bound.
    fn it_type(&self) -> Option<&Type>;

    /// Type of a `let` name, when bound.
    fn name_type(&self, name: &str) -> Option<Type>;

    /// Returns true if the capture is bound.
    fn has_capture(&self, name: &str) -> bool;
}

/// Scope of a refinement predicate: only `it` is bound.
#[derive(Clone, Debug)]
pub struct RefinementScope {
    it: Type,
}

impl RefinementScope {
    /// Binds `it` to `subject`.
    #[must_use]
    pub fn new(subject: Type) -> Self {
        Self { it: subject }
    }
}

impl TypeScope for RefinementScope {
    fn context(&self) -> ScopeContext {
        ScopeContext::Refinement
    }

    fn it_type(&self) -> Option<&Type> {
        Some(&self.it)
    }

    fn name_type(&self, _name: &str) -> Option<Type> {
        None
    }

    fn has_capture(&self, _name: &str) -> bool {
        false
    }
}

// =============================================================================
// ExprTyper
// =============================================================================

/// Infers types and lowers expressions against an extern registry.
#[derive(Clone, Copy)]
pub struct ExprTyper<'a> {
    externs: &'a ExternRegistry,
}

impl fmt::Debug for ExprTyper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprTyper")
            .field("externs", &self.externs.len())
            .finish()
    }
}

impl<'a> ExprTyper<'a> {
    /// Creates a typer resolving calls through `externs`.
    #[must_use]
    pub const fn new(externs: &'a ExternRegistry) -> Self {
        Self { externs }
    }

    /// Types and lowers `expr` in `scope`.
    ///
    /// # Errors
    ///
    /// Returns the first error found. Error kinds depend on the scope's
    /// context: refinements report `RefinementType`, `let` values report
    /// `UnboundName` and emitted fields report `UnboundCapture` for names
    /// that are not in scope.
    pub fn type_expr(&self, expr: &Expr, scope: &dyn TypeScope) -> Result<TypedExpr> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::It => {
                let ty = scope
                    .it_type()
                    .cloned()
                    .ok_or_else(|| unbound(scope, expr, "it"))?;
                Ok(TypedExpr::new(TypedExprKind::It, ty, span))
            }
            ExprKind::Bool(b) => Ok(literal(Value::Bool(*b), Type::Bool, span)),
            ExprKind::Int(n) => Ok(literal(Value::Int(*n), Type::Int, span)),
            ExprKind::Float(n) => Ok(literal(Value::Float(*n), Type::Float, span)),
            ExprKind::String(s) => Ok(literal(Value::from(s.as_str()), Type::String, span)),
            ExprKind::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.type_expr(item, scope))
                    .collect::<Result<Vec<_>>>()?;
                let element = join_element_types(&items);
                Ok(TypedExpr::new(
                    TypedExprKind::List(items),
                    Type::list(element),
                    span,
                ))
            }
            ExprKind::Name(name) => {
                let ty = scope
                    .name_type(name)
                    .ok_or_else(|| unbound(scope, expr, name))?;
                Ok(TypedExpr::new(TypedExprKind::Name(name.clone()), ty, span))
            }
            ExprKind::Capture { name, path } => {
                if !scope.has_capture(name) {
                    return Err(unbound(scope, expr, name));
                }
                Ok(TypedExpr::new(
                    TypedExprKind::Capture {
                        name: name.clone(),
                        path: path.clone(),
                    },
                    Type::Node,
                    span,
                ))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.type_expr(left, scope)?;
                let right = self.type_expr(right, scope)?;
                self.type_operator(expr, op, left, right, scope)
            }
            ExprKind::Section { op, right } => {
                let left = self.type_expr(&Expr::it().at(span), scope)?;
                let right = self.type_expr(right, scope)?;
                self.type_operator(expr, op, left, right, scope)
            }
            ExprKind::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.type_expr(arg, scope))
                    .collect::<Result<Vec<_>>>()?;
                let arg_types: Vec<Type> = args.iter().map(|a| a.ty.clone()).collect();
                let signature = self
                    .externs
                    .resolve_call(function, &arg_types)
                    .map_err(|e| e.with_span(span))?;
                let ty = signature.return_type.clone();
                Ok(TypedExpr::new(
                    TypedExprKind::Call { signature, args },
                    ty,
                    span,
                ))
            }
            ExprKind::In { subject, set } => {
                let subject = match subject {
                    Some(subject) => self.type_expr(subject, scope)?,
                    None => self.type_expr(&Expr::it().at(span), scope)?,
                };
                self.type_membership(expr, subject, set, scope)
            }
        }
    }

    fn type_operator(
        &self,
        expr: &Expr,
        op: &BinaryOp,
        left: TypedExpr,
        right: TypedExpr,
        scope: &dyn TypeScope,
    ) -> Result<TypedExpr> {
        let span = expr.span;
        if let Some(ty) = builtin_result(op, &left.ty, &right.ty) {
            return Ok(TypedExpr::new(
                TypedExprKind::Builtin {
                    op: op.clone(),
                    left: Box::new(left),
                    right: Box::new(right),
                },
                ty,
                span,
            ));
        }

        let arg_types = [left.ty.clone(), right.ty.clone()];
        match self.externs.resolve_call(op.symbol(), &arg_types) {
            Ok(signature) => {
                let ty = signature.return_type.clone();
                Ok(TypedExpr::new(
                    TypedExprKind::Call {
                        signature,
                        args: vec![left, right],
                    },
                    ty,
                    span,
                ))
            }
            Err(e) if matches!(e.kind, ErrorKind::AmbiguousExtern { .. }) => Err(e.with_span(span)),
            Err(_) => Err(operand_error(
                scope,
                expr,
                &format!(
                    "operator `{op}` does not apply to {} and {}",
                    left.ty, right.ty
                ),
                left.ty,
                right.ty,
            )),
        }
    }

    fn type_membership(
        &self,
        expr: &Expr,
        subject: TypedExpr,
        set: &MembershipSet,
        scope: &dyn TypeScope,
    ) -> Result<TypedExpr> {
        let span = expr.span;
        match set {
            MembershipSet::Range {
                start,
                end,
                inclusive,
            } => {
                let start = self.type_expr(start, scope)?;
                let end = end
                    .as_ref()
                    .map(|end| self.type_expr(end, scope))
                    .transpose()?;

                let bounds_numeric = is_numeric_like(&start.ty)
                    && end.as_ref().is_none_or(|e| is_numeric_like(&e.ty));
                if !bounds_numeric || !is_numeric_like(&subject.ty) {
                    let actual = if is_numeric_like(&subject.ty) {
                        start.ty.clone()
                    } else {
                        subject.ty.clone()
                    };
                    return Err(operand_error(
                        scope,
                        expr,
                        &format!(
                            "range membership needs numeric bounds and subject, got {} in [{}..]",
                            subject.ty, start.ty
                        ),
                        Type::Float,
                        actual,
                    ));
                }

                Ok(TypedExpr::new(
                    TypedExprKind::InRange {
                        subject: Box::new(subject),
                        start: Box::new(start),
                        end: end.map(Box::new),
                        inclusive: *inclusive,
                    },
                    Type::Bool,
                    span,
                ))
            }
            MembershipSet::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.type_expr(item, scope))
                    .collect::<Result<Vec<_>>>()?;
                let subject_ty = dynamic(&subject.ty);
                if let Some(bad) = items
                    .iter()
                    .find(|item| !subject_ty.equatable_with(&dynamic(&item.ty)))
                {
                    return Err(operand_error(
                        scope,
                        expr,
                        &format!("list item {} cannot be compared with {}", bad.ty, subject.ty),
                        subject.ty.clone(),
                        bad.ty.clone(),
                    ));
                }
                Ok(TypedExpr::new(
                    TypedExprKind::InList {
                        subject: Box::new(subject),
                        items,
                    },
                    Type::Bool,
                    span,
                ))
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn literal(value: Value, ty: Type, span: Span) -> TypedExpr {
    TypedExpr::new(TypedExprKind::Literal(value), ty, span)
}

/// Nodes are coerced from their text at run time, so operators treat them
/// as dynamically typed.
fn dynamic(ty: &Type) -> Type {
    match ty {
        Type::Node => Type::Any,
        other => other.clone(),
    }
}

fn is_numeric_like(ty: &Type) -> bool {
    let ty = dynamic(ty);
    ty.is_numeric() || ty.is_any()
}

fn is_bool_like(ty: &Type) -> bool {
    matches!(dynamic(ty), Type::Bool | Type::Any)
}

/// Result type of a builtin operator, or `None` if only an overload applies.
fn builtin_result(op: &BinaryOp, left: &Type, right: &Type) -> Option<Type> {
    let (l, r) = (dynamic(left), dynamic(right));
    if op.is_arithmetic() {
        l.numeric_join(&r)
    } else if op.is_ordering() {
        (is_numeric_like(&l) && is_numeric_like(&r)).then_some(Type::Bool)
    } else if op.is_equality() {
        l.equatable_with(&r).then_some(Type::Bool)
    } else if op.is_logical() {
        (is_bool_like(&l) && is_bool_like(&r)).then_some(Type::Bool)
    } else {
        None
    }
}

fn join_element_types(items: &[TypedExpr]) -> Type {
    let mut iter = items.iter().map(|i| i.ty.clone());
    let Some(first) = iter.next() else {
        return Type::Any;
    };
    iter.try_fold(first, |acc, ty| {
        if acc == ty {
            Some(acc)
        } else {
            acc.numeric_join(&ty)
        }
    })
    .unwrap_or(Type::Any)
}

fn unbound(scope: &dyn TypeScope, expr: &Expr, name: &str) -> Error {
    let kind = match scope.context() {
        ScopeContext::Refinement => ErrorKind::RefinementType {
            expr: expr.to_string(),
            message: format!("`{name}` is not bound in a refinement"),
        },
        ScopeContext::Let => ErrorKind::UnboundName(name.to_string()),
        ScopeContext::Emit => ErrorKind::UnboundCapture(name.to_string()),
    };
    Error::new(kind).with_span(expr.span)
}

fn operand_error(
    scope: &dyn TypeScope,
    expr: &Expr,
    message: &str,
    expected: Type,
    actual: Type,
) -> Error {
    let kind = match scope.context() {
        ScopeContext::Refinement => ErrorKind::RefinementType {
            expr: expr.to_string(),
            message: message.to_string(),
        },
        ScopeContext::Let | ScopeContext::Emit => ErrorKind::TypeMismatch {
            subject: format!("`{expr}`"),
            expected,
            actual,
        },
    };
    Error::new(kind).with_span(expr.span)
}
