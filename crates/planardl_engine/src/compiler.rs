//! Match compilation.
//!
//! The [`MatchCompiler`] turns the node handlers of a [`SymbolTable`] into
//! [`MatcherPlan`]s: queries are resolved, captures are checked against the
//! captures each query declares, expressions are typed and lowered, fact
//! constructors are checked against their schemas, and named relations are
//! checked against declared edges.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use planardl_foundation::{Diagnostics, Error, ErrorKind, Span, Type};
use planardl_language::ast::{
    Capture, CaptureStmt, Direction, Emit, EmitOperand, FactConstructor, MatchBlock, QueryRef,
};
use planardl_language::{
    ExprTyper, ExternKey, FactSchema, NodeEntry, QuerySchema, ResolvedType, ScopeContext,
    SymbolTable, TypeScope, TypedExpr,
};
use tracing::debug;

// =============================================================================
// Plans
// =============================================================================

/// Compiled handlers for every node kind of a unit.
#[derive(Clone, Debug, Default)]
pub struct PlanSet {
    /// Matchers in node-declaration order.
    pub matchers: Vec<MatcherPlan>,
    /// Every extern the plans may call, refinements included.
    pub externs: BTreeSet<ExternKey>,
}

impl PlanSet {
    /// Number of matchers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Returns true if there are no matchers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// The matcher for a node kind.
    #[must_use]
    pub fn matcher(&self, node_kind: &str) -> Option<&MatcherPlan> {
        self.matchers.iter().find(|m| m.node_kind == node_kind)
    }
}

/// Compiled handler for one node kind.
#[derive(Clone, Debug)]
pub struct MatcherPlan {
    /// Node kind.
    pub node_kind: String,
    /// Defining module.
    pub module: String,
    /// Match blocks in declaration order.
    pub blocks: Vec<BlockPlan>,
}

/// One `match` block.
#[derive(Clone, Debug)]
pub struct BlockPlan {
    /// The query to run.
    pub query: Arc<QuerySchema>,
    /// Top-level captures.
    pub captures: Vec<CapturePlan>,
}

/// A capture and the statements run when it binds.
#[derive(Clone, Debug)]
pub struct CapturePlan {
    /// Capture name.
    pub binding: String,
    /// Statements in declaration order.
    pub body: Vec<StmtPlan>,
    /// Source span.
    pub span: Span,
}

/// A compiled capture statement.
#[derive(Clone, Debug)]
pub enum StmtPlan {
    /// Nested capture.
    Capture(CapturePlan),
    /// `let name = expr`
    Let(LetPlan),
    /// `emit ...`
    Emit(EmitPlan),
}

/// A compiled `let`.
#[derive(Clone, Debug)]
pub struct LetPlan {
    /// Bound name.
    pub name: String,
    /// Value.
    pub expr: TypedExpr,
    /// Source span.
    pub span: Span,
}

/// A compiled `emit`.
#[derive(Clone, Debug)]
pub struct EmitPlan {
    /// Left operand.
    pub left: OperandPlan,
    /// Relation to a right operand.
    pub edge: Option<EdgePlan>,
    /// Source span.
    pub span: Span,
}

/// The relation part of an `emit`.
#[derive(Clone, Debug)]
pub struct EdgePlan {
    /// Edge direction.
    pub direction: Direction,
    /// Relation kind, if named.
    pub kind: Option<Arc<str>>,
    /// Right operand.
    pub right: OperandPlan,
}

/// An emit operand.
#[derive(Clone, Debug)]
pub enum OperandPlan {
    /// A fresh fact.
    Construct(ConstructPlan),
    /// The fact associated with a captured node.
    Capture {
        /// Capture name.
        name: String,
        /// Source span.
        span: Span,
    },
    /// The fact (or node's fact) held by a `let` name.
    Local {
        /// Bound name.
        name: String,
        /// Source span.
        span: Span,
    },
}

impl OperandPlan {
    fn fact_name(&self) -> Option<&str> {
        match self {
            Self::Construct(c) => Some(&c.fact.name),
            Self::Capture { .. } | Self::Local { .. } => None,
        }
    }
}

/// A compiled fact constructor.
#[derive(Clone, Debug)]
pub struct ConstructPlan {
    /// The fact's schema.
    pub fact: Arc<FactSchema>,
    /// Assigned fields, in source order.
    pub fields: Vec<FieldPlan>,
    /// Source span.
    pub span: Span,
}

/// One field assignment.
#[derive(Clone, Debug)]
pub struct FieldPlan {
    /// Field name.
    pub name: Arc<str>,
    /// Declared type.
    pub ty: ResolvedType,
    /// Value expression.
    pub value: TypedExpr,
}

// =============================================================================
// Compile-time scope
// =============================================================================

#[derive(Debug, Default)]
struct Names {
    captures: Vec<String>,
    lets: Vec<(String, Type)>,
}

struct BodyScope<'s> {
    frames: &'s [Names],
    context: ScopeContext,
}

impl TypeScope for BodyScope<'_> {
    fn context(&self) -> ScopeContext {
        self.context
    }

    fn it_type(&self) -> Option<&Type> {
        None
    }

    fn name_type(&self, name: &str) -> Option<Type> {
        self.frames.iter().rev().find_map(|frame| {
            frame
                .lets
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, ty)| ty.clone())
        })
    }

    fn has_capture(&self, name: &str) -> bool {
        self.frames
            .iter()
            .any(|frame| frame.captures.iter().any(|c| c == name))
    }
}

// =============================================================================
// MatchCompiler
// =============================================================================

/// Compiles node handlers into matcher plans.
pub struct MatchCompiler<'t> {
    table: &'t SymbolTable,
    typer: ExprTyper<'t>,
}

/// Per-handler compilation state.
struct Unit<'u> {
    module: &'u str,
    query: Arc<QuerySchema>,
    frames: Vec<Names>,
    diagnostics: &'u mut Diagnostics,
}

impl<'t> MatchCompiler<'t> {
    /// Creates a compiler over a resolved table.
    #[must_use]
    pub fn new(table: &'t SymbolTable) -> Self {
        Self {
            table,
            typer: ExprTyper::new(table.externs()),
        }
    }

    /// Compiles every visible node handler.
    ///
    /// # Errors
    ///
    /// Returns every static error found; no plan is produced if any exist.
    pub fn compile(&self) -> std::result::Result<PlanSet, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let matchers: Vec<MatcherPlan> = self
            .table
            .nodes()
            .iter()
            .map(|entry| self.compile_node(entry, &mut diagnostics))
            .collect();

        let mut externs = BTreeSet::new();
        for matcher in &matchers {
            for block in &matcher.blocks {
                for capture in &block.captures {
                    collect_capture_externs(capture, &mut externs);
                }
            }
        }

        debug!(
            matchers = matchers.len(),
            externs = externs.len(),
            errors = diagnostics.len(),
            "match plans compiled"
        );
        diagnostics.into_result(PlanSet { matchers, externs })
    }

    fn compile_node(&self, entry: &NodeEntry, diagnostics: &mut Diagnostics) -> MatcherPlan {
        let mut blocks = Vec::with_capacity(entry.decl.matches.len());
        for block in &entry.decl.matches {
            match self.resolve_query(entry, block) {
                Ok(query) => {
                    let mut unit = Unit {
                        module: &entry.module,
                        query,
                        frames: Vec::new(),
                        diagnostics: &mut *diagnostics,
                    };
                    let mut siblings = HashSet::new();
                    let captures = block
                        .captures
                        .iter()
                        .filter_map(|capture| {
                            if !siblings.insert(capture.binding.as_str()) {
                                unit.diagnostics.push(
                                    Error::new(ErrorKind::DuplicateCapture(capture.binding.clone()))
                                        .with_span(capture.span),
                                );
                                return None;
                            }
                            Some(self.compile_capture(&mut unit, capture))
                        })
                        .collect();
                    blocks.push(BlockPlan {
                        query: unit.query,
                        captures,
                    });
                }
                Err(e) => diagnostics.push(e),
            }
        }
        MatcherPlan {
            node_kind: entry.decl.kind.clone(),
            module: entry.module.clone(),
            blocks,
        }
    }

    fn resolve_query(&self, entry: &NodeEntry, block: &MatchBlock) -> planardl_foundation::Result<Arc<QuerySchema>> {
        match &block.query {
            QueryRef::Literal(literal) => Ok(Arc::new(QuerySchema::from_literal("", literal.clone()))),
            QueryRef::Named(name) => {
                if let Some(local) = entry.decl.queries.iter().find(|q| q.name == *name) {
                    return Ok(Arc::new(QuerySchema::from_literal(
                        format!("{}.{}.{name}", entry.module, entry.decl.kind),
                        local.literal.clone(),
                    )));
                }
                self.table
                    .query_in(&entry.module, name)
                    .cloned()
                    .ok_or_else(|| {
                        Error::new(ErrorKind::UnknownQuery(name.clone())).with_span(block.span)
                    })
            }
        }
    }

    fn compile_capture(&self, unit: &mut Unit<'_>, capture: &Capture) -> CapturePlan {
        if !unit.query.has_capture(&capture.binding) {
            unit.diagnostics
                .push(Error::unbound_capture(capture.binding.as_str()).with_span(capture.span));
        }

        unit.frames.push(Names {
            captures: vec![capture.binding.clone()],
            lets: Vec::new(),
        });
        let body = self.compile_body(unit, &capture.body);
        unit.frames.pop();

        CapturePlan {
            binding: capture.binding.clone(),
            body,
            span: capture.span,
        }
    }

    fn compile_body(&self, unit: &mut Unit<'_>, stmts: &[CaptureStmt]) -> Vec<StmtPlan> {
        let mut siblings: HashSet<&str> = HashSet::new();
        let mut plans = Vec::with_capacity(stmts.len());

        for stmt in stmts {
            match stmt {
                CaptureStmt::Capture(capture) => {
                    if !siblings.insert(&capture.binding) {
                        unit.diagnostics.push(
                            Error::new(ErrorKind::DuplicateCapture(capture.binding.clone()))
                                .with_span(capture.span),
                        );
                        continue;
                    }
                    plans.push(StmtPlan::Capture(self.compile_capture(unit, capture)));
                }
                CaptureStmt::Let(binding) => {
                    if !siblings.insert(&binding.name) {
                        unit.diagnostics.push(
                            Error::new(ErrorKind::DuplicateCapture(binding.name.clone()))
                                .with_span(binding.span),
                        );
                        continue;
                    }
                    let scope = BodyScope {
                        frames: &unit.frames,
                        context: ScopeContext::Let,
                    };
                    let typed = self.typer.type_expr(&binding.expr, &scope);
                    let ty = typed.as_ref().map_or(Type::Any, |t| t.ty.clone());
                    if let Some(frame) = unit.frames.last_mut() {
                        frame.lets.push((binding.name.clone(), ty));
                    }
                    if let Some(expr) = unit.diagnostics.record(typed) {
                        plans.push(StmtPlan::Let(LetPlan {
                            name: binding.name.clone(),
                            expr,
                            span: binding.span,
                        }));
                    }
                }
                CaptureStmt::Emit(emit) => {
                    if let Some(plan) = self.compile_emit(unit, emit) {
                        plans.push(StmtPlan::Emit(plan));
                    }
                }
            }
        }
        plans
    }

    fn compile_emit(&self, unit: &mut Unit<'_>, emit: &Emit) -> Option<EmitPlan> {
        let left = self.compile_operand(unit, &emit.left);
        let edge = emit.edge.as_ref().map(|edge| {
            let right = self.compile_operand(unit, &edge.right);
            (edge, right)
        });

        let left = left?;
        let edge = match edge {
            None => None,
            Some((edge, right)) => {
                let right = right?;
                let kind = edge.relation.kind.as_deref();
                if let Some(kind) = kind {
                    if let Err(e) = self.check_relation(unit.module, kind, edge.relation.direction, &left, &right) {
                        unit.diagnostics.push(e.with_span(edge.relation.span));
                        return None;
                    }
                }
                Some(EdgePlan {
                    direction: edge.relation.direction,
                    kind: kind.map(Arc::from),
                    right,
                })
            }
        };

        Some(EmitPlan {
            left,
            edge,
            span: emit.span,
        })
    }

    fn compile_operand(&self, unit: &mut Unit<'_>, operand: &EmitOperand) -> Option<OperandPlan> {
        match operand {
            EmitOperand::Construct(constructor) => self
                .compile_constructor(unit, constructor)
                .map(OperandPlan::Construct),
            EmitOperand::Reference { name, span } => {
                let scope = BodyScope {
                    frames: &unit.frames,
                    context: ScopeContext::Emit,
                };
                let bare = name.trim_start_matches('@');
                let explicit_capture = name.starts_with('@');

                if !explicit_capture {
                    if let Some(ty) = scope.name_type(bare) {
                        if !matches!(ty, Type::Node | Type::Fact(_) | Type::Any) {
                            unit.diagnostics.push(
                                Error::type_mismatch(format!("relation operand `{bare}`"), Type::Node, ty)
                                    .with_span(*span),
                            );
                            return None;
                        }
                        return Some(OperandPlan::Local {
                            name: bare.to_string(),
                            span: *span,
                        });
                    }
                }
                if scope.has_capture(bare) {
                    return Some(OperandPlan::Capture {
                        name: bare.to_string(),
                        span: *span,
                    });
                }
                unit.diagnostics
                    .push(Error::unbound_capture(bare).with_span(*span));
                None
            }
        }
    }

    fn compile_constructor(
        &self,
        unit: &mut Unit<'_>,
        constructor: &FactConstructor,
    ) -> Option<ConstructPlan> {
        let Some(fact) = self.table.fact_in(unit.module, &constructor.fact) else {
            unit.diagnostics.push(
                Error::unresolved_type(constructor.fact.as_str()).with_span(constructor.span),
            );
            return None;
        };

        let mut ok = true;
        let mut assigned: HashSet<&str> = HashSet::new();
        let mut fields = Vec::with_capacity(constructor.fields.len());
        for assign in &constructor.fields {
            if !assigned.insert(&assign.name) {
                unit.diagnostics.push(
                    Error::duplicate_symbol(format!("{}.{}", fact.name, assign.name))
                        .with_span(assign.span),
                );
                ok = false;
                continue;
            }
            let Some(schema) = fact.field(&assign.name) else {
                unit.diagnostics.push(
                    Error::new(ErrorKind::UnknownField {
                        fact: fact.name.clone(),
                        field: assign.name.clone(),
                    })
                    .with_span(assign.span),
                );
                ok = false;
                continue;
            };

            let scope = BodyScope {
                frames: &unit.frames,
                context: ScopeContext::Emit,
            };
            let Some(value) = unit
                .diagnostics
                .record(self.typer.type_expr(&assign.value, &scope))
            else {
                ok = false;
                continue;
            };
            if !schema.ty.ty.accepts(&value.ty) {
                unit.diagnostics.push(
                    Error::type_mismatch(
                        format!("field {}.{}", fact.name, assign.name),
                        schema.ty.ty.clone(),
                        value.ty.clone(),
                    )
                    .with_span(assign.span),
                );
                ok = false;
                continue;
            }

            fields.push(FieldPlan {
                name: Arc::from(assign.name.as_str()),
                ty: schema.ty.clone(),
                value,
            });
        }

        ok.then(|| ConstructPlan {
            fact: Arc::clone(fact),
            fields,
            span: constructor.span,
        })
    }

    /// Named relations that refer to a declared edge must connect facts of
    /// its endpoint types. Operands whose fact is only known at run time are
    /// not checked.
    fn check_relation(
        &self,
        module: &str,
        kind: &str,
        direction: Direction,
        left: &OperandPlan,
        right: &OperandPlan,
    ) -> planardl_foundation::Result<()> {
        let Some(edge) = self.table.edge_for_relation(module, kind) else {
            return Ok(());
        };

        let check = |actual: Option<&str>, expected: &str| match actual {
            Some(actual) if actual != expected => Err(Error::type_mismatch(
                format!("relation `{kind}`"),
                Type::fact(expected),
                Type::fact(actual),
            )),
            _ => Ok(()),
        };

        let (l, r) = (left.fact_name(), right.fact_name());
        if matches!(direction, Direction::Forward | Direction::Both) {
            check(l, edge.from.as_str())?;
            check(r, edge.to.as_str())?;
        }
        if matches!(direction, Direction::Backward | Direction::Both) {
            check(r, edge.from.as_str())?;
            check(l, edge.to.as_str())?;
        }
        Ok(())
    }
}

// =============================================================================
// Extern collection
// =============================================================================

fn collect_capture_externs(capture: &CapturePlan, keys: &mut BTreeSet<ExternKey>) {
    for stmt in &capture.body {
        match stmt {
            StmtPlan::Capture(nested) => collect_capture_externs(nested, keys),
            StmtPlan::Let(binding) => binding.expr.collect_externs(keys),
            StmtPlan::Emit(emit) => {
                collect_operand_externs(&emit.left, keys);
                if let Some(edge) = &emit.edge {
                    collect_operand_externs(&edge.right, keys);
                }
            }
        }
    }
}

fn collect_operand_externs(operand: &OperandPlan, keys: &mut BTreeSet<ExternKey>) {
    if let OperandPlan::Construct(construct) = operand {
        for field in &construct.fields {
            field.value.collect_externs(keys);
            collect_type_externs(&field.ty, keys);
        }
    }
}

fn collect_type_externs(ty: &ResolvedType, keys: &mut BTreeSet<ExternKey>) {
    for predicate in &ty.refinements {
        predicate.typed.collect_externs(keys);
    }
    if let Some(element) = &ty.element {
        collect_type_externs(element, keys);
    }
}
