//! Match execution.
//!
//! A [`MatchEngine`] runs a [`PlanSet`] over one syntax tree and produces a
//! [`FactGraph`]. Each run owns its builder, scope arena and node-to-fact
//! associations, so one engine can serve many trees concurrently.
//!
//! Runtime faults are scoped: a failed `emit` is rolled back and skipped, a
//! failed `let` abandons the rest of the current match result. Fatal errors
//! abort the run and no graph is produced.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use planardl_foundation::{
    Diagnostics, Error, ErrorCategory, ErrorKind, FactId, NodeRef, Result, SemanticLimit, Type,
    Value,
};
use planardl_graph::{FactGraph, FactGraphBuilder};
use planardl_language::ast::Direction;
use tracing::{debug, warn};

use crate::compiler::{CapturePlan, ConstructPlan, EmitPlan, OperandPlan, PlanSet, StmtPlan};
use crate::config::{EngineConfig, RefinementPolicy};
use crate::eval::{Evaluator, coerce};
use crate::host::HostFunctions;
use crate::scope::{FrameId, ScopeArena};
use crate::syntax::{QueryMatch, SyntaxTree};

/// The result of one run.
#[derive(Clone, Debug)]
pub struct MatchOutcome {
    /// Emitted facts and edges.
    pub graph: FactGraph,
    /// Runtime errors that were contained.
    pub diagnostics: Diagnostics,
}

/// Runs compiled plans over syntax trees.
#[derive(Clone, Debug)]
pub struct MatchEngine {
    plans: Arc<PlanSet>,
    host: Arc<HostFunctions>,
    config: EngineConfig,
}

impl MatchEngine {
    /// Creates an engine, checking that every extern the plans use is bound.
    ///
    /// # Errors
    ///
    /// Returns `UnboundExtern` if the host table lacks a used extern.
    pub fn new(plans: Arc<PlanSet>, host: Arc<HostFunctions>, config: EngineConfig) -> Result<Self> {
        host.verify(&plans.externs)?;
        Ok(Self {
            plans,
            host,
            config,
        })
    }

    /// The plans this engine runs.
    #[must_use]
    pub fn plans(&self) -> &Arc<PlanSet> {
        &self.plans
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Matches every handler against `tree`.
    ///
    /// # Errors
    ///
    /// Returns fatal errors only: a rejected query, an exceeded fact limit,
    /// or a host table failure. Runtime errors are collected in the outcome.
    pub fn run(&self, tree: &dyn SyntaxTree) -> Result<MatchOutcome> {
        let mut run = Run {
            engine: self,
            tree,
            builder: FactGraphBuilder::new(),
            arena: ScopeArena::new(),
            associations: HashMap::new(),
            associated: Vec::new(),
            diagnostics: Diagnostics::new(),
        };

        for matcher in &self.plans.matchers {
            for block in &matcher.blocks {
                let results = tree.query(&block.query.literal)?;
                for result in &results {
                    run.match_result(&block.captures, result)?;
                }
            }
        }

        let graph = run.builder.build();
        debug!(
            facts = graph.len(),
            edges = graph.edges().len(),
            errors = run.diagnostics.len(),
            "match run finished"
        );
        Ok(MatchOutcome {
            graph,
            diagnostics: run.diagnostics,
        })
    }
}

// =============================================================================
// Run state
// =============================================================================

enum Interrupt {
    /// Stop processing the current match result.
    Abandon(Error),
    /// Stop the run.
    Fatal(Error),
}

impl From<Error> for Interrupt {
    fn from(error: Error) -> Self {
        if error.category() == ErrorCategory::Fatal {
            Self::Fatal(error)
        } else {
            Self::Abandon(error)
        }
    }
}

struct Run<'r> {
    engine: &'r MatchEngine,
    tree: &'r dyn SyntaxTree,
    builder: FactGraphBuilder,
    arena: ScopeArena,
    /// First fact tagged to each node.
    associations: HashMap<NodeRef, FactId>,
    /// Nodes in the order they gained an association.
    associated: Vec<NodeRef>,
    diagnostics: Diagnostics,
}

impl Run<'_> {
    fn match_result(&mut self, captures: &[CapturePlan], result: &QueryMatch) -> Result<()> {
        self.arena.reset();
        let root = self.arena.root();

        for capture in captures {
            let Some(node) = result.get(&capture.binding) else {
                continue;
            };
            let frame = self.arena.bind_capture(root, &capture.binding, node);
            match self.exec_body(&capture.body, frame, result) {
                Ok(()) => {}
                Err(Interrupt::Abandon(e)) => {
                    warn!(error = %e, capture = %capture.binding, "match result abandoned");
                    self.diagnostics.push(e);
                    return Ok(());
                }
                Err(Interrupt::Fatal(e)) => return Err(e),
            }
        }
        Ok(())
    }

    fn exec_body(
        &mut self,
        body: &[StmtPlan],
        frame: FrameId,
        result: &QueryMatch,
    ) -> std::result::Result<(), Interrupt> {
        let mut frame = frame;
        for stmt in body {
            match stmt {
                StmtPlan::Capture(capture) => {
                    if let Some(node) = result.get(&capture.binding) {
                        let child = self.arena.bind_capture(frame, &capture.binding, node);
                        self.exec_body(&capture.body, child, result)?;
                    }
                }
                StmtPlan::Let(binding) => {
                    let value = self.evaluator(frame).eval(&binding.expr)?;
                    frame = self.arena.bind_let(frame, &binding.name, value);
                }
                StmtPlan::Emit(emit) => {
                    if let Err(e) = self.exec_emit(emit, frame) {
                        if e.category() == ErrorCategory::Fatal {
                            return Err(Interrupt::Fatal(e));
                        }
                        warn!(error = %e, "emit discarded");
                        self.diagnostics.push(e);
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluator(&self, frame: FrameId) -> Evaluator<'_> {
        Evaluator::new(&self.engine.host)
            .with_tree(self.tree)
            .with_scope(&self.arena, frame)
    }

    /// Runs one emit, leaving the graph untouched if it fails.
    fn exec_emit(&mut self, emit: &EmitPlan, frame: FrameId) -> Result<()> {
        let checkpoint = self.builder.checkpoint();
        let mark = self.associated.len();
        let reported = self.diagnostics.len();

        let result = self.try_emit(emit, frame);
        if result.is_err() {
            self.builder.rollback(checkpoint);
            for node in self.associated.drain(mark..) {
                self.associations.remove(&node);
            }
            // Dropped fields of a discarded fact were never stored
            self.diagnostics.truncate(reported);
        }
        result.map_err(|e| if e.span.is_some() { e } else { e.with_span(emit.span) })
    }

    fn try_emit(&mut self, emit: &EmitPlan, frame: FrameId) -> Result<()> {
        let left = self.operand(&emit.left, frame)?;
        let Some(edge) = &emit.edge else {
            return Ok(());
        };
        let right = self.operand(&edge.right, frame)?;

        match edge.direction {
            Direction::Forward => self.builder.add_edge(left, right, edge.kind.clone()),
            Direction::Backward => self.builder.add_edge(right, left, edge.kind.clone()),
            Direction::Both => {
                self.builder.add_edge(left, right, edge.kind.clone())?;
                self.builder.add_edge(right, left, edge.kind.clone())
            }
        }
    }

    fn operand(&mut self, operand: &OperandPlan, frame: FrameId) -> Result<FactId> {
        match operand {
            OperandPlan::Construct(construct) => self.construct(construct, frame),
            OperandPlan::Capture { name, span } => self
                .arena
                .capture(frame, name)
                .and_then(|node| self.associations.get(&node).copied())
                .ok_or_else(|| Error::unbound_name(format!("@{name}")).with_span(*span)),
            OperandPlan::Local { name, span } => {
                let fact = match self.arena.local(frame, name) {
                    Some(Value::Fact(id)) => Some(*id),
                    Some(Value::Node(node)) => self.associations.get(node).copied(),
                    _ => None,
                };
                fact.ok_or_else(|| Error::unbound_name(name.as_str()).with_span(*span))
            }
        }
    }

    fn construct(&mut self, construct: &ConstructPlan, frame: FrameId) -> Result<FactId> {
        let config = &self.engine.config;
        let schema = &construct.fact;
        let eval = Evaluator::new(&self.engine.host)
            .with_tree(self.tree)
            .with_scope(&self.arena, frame);

        let mut fields = Vec::with_capacity(construct.fields.len());
        for field in &construct.fields {
            let raw = eval.eval(&field.value)?;
            let value = self.store(raw, &field.ty.ty)?;

            if config.check_refinements && (field.ty.is_refined() || field.ty.element.is_some()) {
                if let Some(predicate) = eval.violated_refinement(&field.ty, &value)? {
                    let violation = Error::new(ErrorKind::RefinementViolation {
                        fact: schema.name.clone(),
                        field: field.name.to_string(),
                        value,
                        predicate: predicate.to_string(),
                    })
                    .with_span(field.value.span);
                    match config.refinement_policy {
                        RefinementPolicy::DropField => {
                            warn!(error = %violation, "field dropped");
                            self.diagnostics.push(violation);
                            continue;
                        }
                        RefinementPolicy::DiscardEmit => return Err(violation),
                    }
                }
            }
            fields.push((Arc::clone(&field.name), value));
        }

        if let Some(limit) = config.max_facts {
            if self.builder.fact_count() >= limit {
                return Err(Error::limit_exceeded(SemanticLimit::MaxFacts { limit }));
            }
        }

        let origin = self.arena.innermost_node(frame);
        let id = self
            .builder
            .add_fact(Arc::from(schema.name.as_str()), fields, origin)?;
        if let Some(node) = origin {
            if let Entry::Vacant(slot) = self.associations.entry(node) {
                slot.insert(id);
                self.associated.push(node);
            }
        }
        Ok(id)
    }

    /// Converts a field value to its stored form.
    fn store(&self, value: Value, target: &Type) -> Result<Value> {
        match (&value, target) {
            (Value::Node(node), Type::Fact(_)) => self
                .associations
                .get(node)
                .map(|id| Value::Fact(*id))
                .ok_or_else(|| {
                    Error::new(ErrorKind::ValueConversion {
                        text: node.to_string(),
                        target: target.clone(),
                    })
                }),
            _ => coerce(value, target, Some(self.tree)),
        }
    }
}
