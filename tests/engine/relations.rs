//! Integration tests for relations
//!
//! Tests edge emission for each direction, declared edge endpoint checks,
//! and `let`-bound relation operands.

use planardl_engine::EngineConfig;
use planardl_foundation::{ErrorCategory, ErrorKind, FactId};
use planardl_language::ast::{
    Capture, Direction, Emit, EmitOperand, Expr, FactConstructor, LetBinding, MatchBlock,
    NodeDecl, Relation,
};

use crate::fixtures::{compile, engine, web_and_db};

fn service() -> Emit {
    Emit::single(EmitOperand::Construct(
        FactConstructor::new("Service").set("name", Expr::capture("service", &["name"])),
    ))
}

fn image() -> EmitOperand {
    EmitOperand::Construct(
        FactConstructor::new("Image").set("name", Expr::capture("service", &["image"])),
    )
}

fn handler(stmts: Vec<Emit>) -> NodeDecl {
    let capture = stmts
        .into_iter()
        .fold(Capture::new("service").with(service()), |c, s| c.with(s));
    NodeDecl::new("service").with_match(MatchBlock::named("services").capture(capture))
}

#[test]
fn backward_relation_points_at_the_left_operand() {
    let node = handler(vec![Emit::related(
        image(),
        Relation::named(Direction::Backward, "uses"),
        EmitOperand::reference("@service"),
    )]);
    let outcome = engine(node, EngineConfig::default()).run(&web_and_db()).unwrap();
    let graph = &outcome.graph;

    assert!(graph.has_edge(FactId(0), FactId(1), Some("uses")));
    assert!(!graph.has_edge(FactId(1), FactId(0), Some("uses")));
    assert_eq!(graph.incoming(FactId(1)).count(), 1);
}

#[test]
fn unnamed_relations_have_no_kind() {
    let node = handler(vec![Emit::related(
        EmitOperand::reference("@service"),
        Relation::new(Direction::Both),
        image(),
    )]);
    let outcome = engine(node, EngineConfig::default()).run(&web_and_db()).unwrap();
    let graph = &outcome.graph;

    assert_eq!(graph.edges().len(), 4);
    assert!(graph.edges().iter().all(|e| e.kind.is_none()));
    assert!(graph.has_edge(FactId(2), FactId(3), None));
    assert!(graph.has_edge(FactId(3), FactId(2), None));
}

#[test]
fn let_bound_nodes_resolve_to_their_facts() {
    let node = NodeDecl::new("service").with_match(
        MatchBlock::named("services").capture(
            Capture::new("service")
                .with(service())
                .with(LetBinding::new("svc", Expr::capture("service", &[])))
                .with(Emit::related(
                    EmitOperand::reference("svc"),
                    Relation::named(Direction::Forward, "uses"),
                    image(),
                )),
        ),
    );
    let outcome = engine(node, EngineConfig::default()).run(&web_and_db()).unwrap();
    assert!(outcome.graph.has_edge(FactId(0), FactId(1), Some("uses")));
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn declared_edge_rejects_swapped_endpoints() {
    let node = handler(vec![Emit::related(
        image(),
        Relation::named(Direction::Forward, "uses"),
        EmitOperand::Construct(FactConstructor::new("Service")),
    )]);
    let diags = compile(node).unwrap_err();

    assert!(diags.iter().all(|e| e.category() == ErrorCategory::Static));
    assert!(diags
        .iter()
        .any(|e| matches!(e.kind, ErrorKind::TypeMismatch { .. })));
}

#[test]
fn scalar_locals_cannot_be_relation_operands() {
    let node = NodeDecl::new("service").with_match(
        MatchBlock::named("services").capture(
            Capture::new("service")
                .with(LetBinding::new("n", Expr::int(3)))
                .with(Emit::related(
                    EmitOperand::reference("n"),
                    Relation::new(Direction::Forward),
                    image(),
                )),
        ),
    );
    let diags = compile(node).unwrap_err();
    assert!(matches!(
        diags.iter().next().unwrap().kind,
        ErrorKind::TypeMismatch { ref subject, .. } if subject.contains("`n`")
    ));
}
