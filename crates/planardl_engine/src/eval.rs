//! Evaluation of typed expressions.
//!
//! The [`Evaluator`] runs lowered expressions against a scope frame, the
//! subject syntax tree and the host function table. It also evaluates
//! refinement predicates on concrete values.
//!
//! Syntax nodes are coerced from their source text wherever a scalar is
//! needed. Quotes around the text are stripped first.

use std::cmp::Ordering;
use std::sync::Arc;

use planardl_foundation::{Error, ErrorKind, NodeRef, Result, Span, Type, Value};
use planardl_language::ast::BinaryOp;
use planardl_language::{Predicate, ResolvedType, TypedExpr, TypedExprKind};

use crate::host::HostFunctions;
use crate::scope::{FrameId, ScopeArena};
use crate::syntax::SyntaxTree;

// =============================================================================
// Evaluator
// =============================================================================

/// Evaluates [`TypedExpr`]s.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    host: &'a HostFunctions,
    tree: Option<&'a dyn SyntaxTree>,
    scope: Option<(&'a ScopeArena, FrameId)>,
    it: Option<&'a Value>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator with no tree, scope or `it`.
    #[must_use]
    pub const fn new(host: &'a HostFunctions) -> Self {
        Self {
            host,
            tree: None,
            scope: None,
            it: None,
        }
    }

    /// Resolves node text through `tree`.
    #[must_use]
    pub const fn with_tree(mut self, tree: &'a dyn SyntaxTree) -> Self {
        self.tree = Some(tree);
        self
    }

    /// Resolves captures and `let` names from `frame`.
    #[must_use]
    pub const fn with_scope(mut self, arena: &'a ScopeArena, frame: FrameId) -> Self {
        self.scope = Some((arena, frame));
        self
    }

    /// Binds `it`.
    #[must_use]
    pub fn with_it<'b>(&self, it: &'b Value) -> Evaluator<'b>
    where
        'a: 'b,
    {
        Evaluator {
            host: self.host,
            tree: self.tree,
            scope: self.scope,
            it: Some(it),
        }
    }

    /// Evaluates `expr`.
    ///
    /// # Errors
    ///
    /// Returns `UnboundName`, `DivisionByZero`, `ExternCall` or
    /// `ValueConversion` errors, spanned at the failing sub-expression.
    pub fn eval(&self, expr: &TypedExpr) -> Result<Value> {
        self.eval_inner(expr).map_err(|e| spanned(e, expr.span))
    }

    fn eval_inner(&self, expr: &TypedExpr) -> Result<Value> {
        match &expr.kind {
            TypedExprKind::It => self
                .it
                .cloned()
                .ok_or_else(|| Error::unbound_name("it")),
            TypedExprKind::Literal(value) => Ok(value.clone()),
            TypedExprKind::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<_>>()
                .map(Value::List),
            TypedExprKind::Name(name) => self
                .scope
                .and_then(|(arena, frame)| arena.local(frame, name))
                .cloned()
                .ok_or_else(|| Error::unbound_name(name.as_str())),
            TypedExprKind::Capture { name, path } => self.capture(name, path).map(Value::Node),
            TypedExprKind::Builtin { op, left, right } => self.builtin(op, left, right),
            TypedExprKind::Call { signature, args } => {
                let mut values = Vec::with_capacity(args.len());
                for (arg, (_, param)) in args.iter().zip(&signature.params) {
                    values.push(coerce(self.eval(arg)?, param, self.tree)?);
                }
                let result = self.host.invoke(&signature.key, &values)?;
                if result.is_nil() && !signature.nullable {
                    return Err(Error::extern_call(
                        &*signature.key.name,
                        "returned nil from a non-nullable extern",
                    ));
                }
                Ok(result)
            }
            TypedExprKind::InRange {
                subject,
                start,
                end,
                inclusive,
            } => {
                let subject = self.number(subject)?;
                let start = self.number(start)?;
                if compare(&subject, &start).is_none_or(Ordering::is_lt) {
                    return Ok(Value::Bool(false));
                }
                let Some(end) = end else {
                    return Ok(Value::Bool(true));
                };
                let end = self.number(end)?;
                let below = match compare(&subject, &end) {
                    Some(Ordering::Less) => true,
                    Some(Ordering::Equal) => *inclusive,
                    _ => false,
                };
                Ok(Value::Bool(below))
            }
            TypedExprKind::InList { subject, items } => {
                let subject = self.eval(subject)?;
                for item in items {
                    let item = self.eval(item)?;
                    if self.equal(&subject, &item)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
        }
    }

    fn capture(&self, name: &str, path: &[String]) -> Result<NodeRef> {
        let mut node = self
            .scope
            .and_then(|(arena, frame)| arena.capture(frame, name))
            .ok_or_else(|| Error::unbound_name(format!("@{name}")))?;
        for (i, field) in path.iter().enumerate() {
            node = self
                .tree
                .and_then(|tree| tree.child(node, field))
                .ok_or_else(|| {
                    Error::unbound_name(format!("@{name}.{}", path[..=i].join(".")))
                })?;
        }
        Ok(node)
    }

    fn builtin(&self, op: &BinaryOp, left: &TypedExpr, right: &TypedExpr) -> Result<Value> {
        if op.is_logical() {
            let l = self.boolean(left)?;
            return match op {
                BinaryOp::And if !l => Ok(Value::Bool(false)),
                BinaryOp::Or if l => Ok(Value::Bool(true)),
                _ => self.boolean(right).map(Value::Bool),
            };
        }

        if op.is_equality() {
            let l = self.eval(left)?;
            let r = self.eval(right)?;
            let equal = self.equal(&l, &r)?;
            return Ok(Value::Bool(if *op == BinaryOp::Eq { equal } else { !equal }));
        }

        let l = self.number(left)?;
        let r = self.number(right)?;
        if op.is_ordering() {
            let result = compare(&l, &r).is_some_and(|ord| match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            });
            return Ok(Value::Bool(result));
        }
        arithmetic(op, &l, &r)
    }

    fn number(&self, expr: &TypedExpr) -> Result<Value> {
        let value = self.eval(expr)?;
        to_number(value, self.tree).map_err(|e| spanned(e, expr.span))
    }

    fn boolean(&self, expr: &TypedExpr) -> Result<bool> {
        match coerce(self.eval(expr)?, &Type::Bool, self.tree).map_err(|e| spanned(e, expr.span))? {
            Value::Bool(b) => Ok(b),
            other => Err(conversion(other.to_string(), &Type::Bool).with_span(expr.span)),
        }
    }

    fn equal(&self, left: &Value, right: &Value) -> Result<bool> {
        let (l, r) = match (left, right) {
            (Value::Node(a), Value::Node(b)) => {
                return Ok(node_text(*a, self.tree)? == node_text(*b, self.tree)?);
            }
            (Value::Node(_), other) => (coerce(left.clone(), &other.value_type(), self.tree)?, right.clone()),
            (other, Value::Node(_)) => (left.clone(), coerce(right.clone(), &other.value_type(), self.tree)?),
            _ => (left.clone(), right.clone()),
        };
        Ok(match (&l, &r) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                compare(&l, &r) == Some(Ordering::Equal)
            }
            _ => l == r,
        })
    }

    /// Evaluates the refinements of `ty` on `value`, list elements included.
    ///
    /// Returns the first violated predicate.
    ///
    /// # Errors
    ///
    /// Returns the evaluation error of a predicate that cannot be decided.
    pub fn violated_refinement<'t>(
        &self,
        ty: &'t ResolvedType,
        value: &Value,
    ) -> Result<Option<&'t Arc<Predicate>>> {
        let scoped = self.with_it(value);
        for predicate in &ty.refinements {
            match scoped.eval(&predicate.typed)? {
                Value::Bool(true) => {}
                Value::Bool(false) => return Ok(Some(predicate)),
                other => return Err(conversion(other.to_string(), &Type::Bool)),
            }
        }
        if let (Some(element), Value::List(items)) = (&ty.element, value) {
            for item in items {
                if let Some(predicate) = self.violated_refinement(element, item)? {
                    return Ok(Some(predicate));
                }
            }
        }
        Ok(None)
    }
}

// =============================================================================
// Coercion
// =============================================================================

/// Source text of `node`.
///
/// # Errors
///
/// Returns `ValueConversion` if there is no tree or the node is unknown.
pub fn node_text(node: NodeRef, tree: Option<&dyn SyntaxTree>) -> Result<&str> {
    tree.and_then(|t| t.text(node))
        .ok_or_else(|| conversion(node.to_string(), &Type::String))
}

/// Converts `value` to the representation `target` expects.
///
/// Nodes become scalars parsed from their text, `Int` widens to `Float`,
/// and list elements are converted one by one. Everything else is returned
/// unchanged.
///
/// # Errors
///
/// Returns `ValueConversion` if a node's text does not parse as `target`,
/// or if a scalar value does not fit a scalar `target`.
pub fn coerce(value: Value, target: &Type, tree: Option<&dyn SyntaxTree>) -> Result<Value> {
    match (value, target) {
        (Value::Node(node), target) if target.is_scalar() => {
            let text = node_text(node, tree)?;
            parse_scalar(text, target).ok_or_else(|| conversion(text, target))
        }
        #[allow(clippy::cast_precision_loss)]
        (Value::Int(n), Type::Float) => Ok(Value::Float(n as f64)),
        (Value::List(items), Type::List(element)) => items
            .iter()
            .map(|item| coerce(item.clone(), element, tree))
            .collect::<Result<_>>()
            .map(Value::List),
        (value @ (Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)), target)
            if target.is_scalar() && !target.accepts(&value.value_type()) =>
        {
            Err(conversion(value.to_string(), target))
        }
        (value, _) => Ok(value),
    }
}

fn unquote(text: &str) -> &str {
    let text = text.trim();
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

fn parse_scalar(text: &str, target: &Type) -> Option<Value> {
    let text = unquote(text);
    match target {
        Type::Int => text.parse::<i64>().ok().map(Value::Int),
        Type::Float => text.parse::<f64>().ok().map(Value::Float),
        Type::Bool => match text {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        Type::String => Some(Value::from(text)),
        _ => None,
    }
}

fn to_number(value: Value, tree: Option<&dyn SyntaxTree>) -> Result<Value> {
    match value {
        Value::Int(_) | Value::Float(_) => Ok(value),
        Value::Node(node) => {
            let text = node_text(node, tree)?;
            parse_scalar(text, &Type::Int)
                .or_else(|| parse_scalar(text, &Type::Float))
                .ok_or_else(|| conversion(text, &Type::Float))
        }
        other => Err(conversion(other.to_string(), &Type::Float)),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    left.partial_cmp(right)
}

fn arithmetic(op: &BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let (a, b) = (*a, *b);
        if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0 {
            return Err(Error::new(ErrorKind::DivisionByZero));
        }
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return result
            .map(Value::Int)
            .ok_or_else(|| conversion(format!("{a} {op} {b}"), &Type::Int));
    }

    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(conversion(format!("{left} {op} {right}"), &Type::Float));
    };
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0.0 {
        return Err(Error::new(ErrorKind::DivisionByZero));
    }
    Ok(Value::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    }))
}

fn conversion(text: impl Into<String>, target: &Type) -> Error {
    Error::new(ErrorKind::ValueConversion {
        text: text.into(),
        target: target.clone(),
    })
}

fn spanned(error: Error, span: Span) -> Error {
    if error.span.is_some() {
        error
    } else {
        error.with_span(span)
    }
}
