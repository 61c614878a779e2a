//! Integration tests for capture scoping
//!
//! Nested captures see the bindings of their enclosing captures; sibling
//! captures never see each other's.

use planardl_engine::{EngineConfig, MemoryTree, QueryMatch};
use planardl_foundation::{ErrorCategory, ErrorKind, FactId, Value};
use planardl_language::ast::{
    BinaryOp, Capture, Direction, Emit, EmitOperand, Expr, FactConstructor, LetBinding,
    MatchBlock, NodeDecl, Relation,
};

use crate::fixtures::{SERVICES, compile, engine, web_and_db};

fn image(name: Expr) -> EmitOperand {
    EmitOperand::Construct(FactConstructor::new("Image").set("name", name))
}

#[test]
fn outer_lets_flow_into_nested_captures() {
    let node = NodeDecl::new("service").with_match(
        MatchBlock::named("services").capture(
            Capture::new("service")
                .with(LetBinding::new(
                    "shout",
                    Expr::call("upper", vec![Expr::capture("service", &["image"])]),
                ))
                .with(Capture::new("name").with(Emit::single(image(Expr::name("shout"))))),
        ),
    );
    let outcome = engine(node, EngineConfig::default()).run(&web_and_db()).unwrap();

    let names: Vec<_> = outcome
        .graph
        .facts()
        .iter()
        .filter_map(|f| f.field("name").cloned())
        .collect();
    assert_eq!(names, vec![Value::from("NGINX"), Value::from("POSTGRES")]);
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn facts_are_tagged_with_the_innermost_capture() {
    let node = NodeDecl::new("service").with_match(
        MatchBlock::named("services").capture(
            Capture::new("service")
                .with(Capture::new("name").with(Emit::single(image(Expr::capture("name", &[]))))),
        ),
    );
    let outcome = engine(node, EngineConfig::default()).run(&web_and_db()).unwrap();

    // Node 0 is the first service, node 1 its name.
    let image = outcome.graph.fact(FactId(0)).unwrap();
    assert_eq!(image.field("name"), Some(&Value::from("web")));
    assert_eq!(image.origin.map(|n| n.id), Some(1));
}

#[test]
fn nested_captures_reference_outer_facts() {
    let node = NodeDecl::new("service").with_match(
        MatchBlock::named("services").capture(
            Capture::new("service")
                .with(Emit::single(EmitOperand::Construct(
                    FactConstructor::new("Service").set("name", Expr::capture("service", &["name"])),
                )))
                .with(Capture::new("name").with(Emit::related(
                    EmitOperand::reference("@service"),
                    Relation::named(Direction::Forward, "uses"),
                    image(Expr::capture("service", &["image"])),
                ))),
        ),
    );
    let outcome = engine(node, EngineConfig::default()).run(&web_and_db()).unwrap();
    let graph = &outcome.graph;

    assert_eq!(graph.count_of("compose.Service"), 2);
    assert_eq!(graph.count_of("compose.Image"), 2);
    assert!(graph.has_edge(FactId(0), FactId(1), Some("uses")));
    assert!(graph.has_edge(FactId(2), FactId(3), Some("uses")));
    assert_eq!(graph.edges().len(), 2);
}

#[test]
fn sibling_lets_are_rejected_before_running() {
    let node = NodeDecl::new("service").with_match(
        MatchBlock::named("services")
            .capture(Capture::new("name").with(LetBinding::new("x", Expr::int(1))))
            .capture(Capture::new("body").with(LetBinding::new(
                "y",
                Expr::binary(BinaryOp::Add, Expr::name("x"), Expr::int(1)),
            ))),
    );
    let diags = compile(node).unwrap_err();

    let err = diags.iter().next().unwrap();
    assert_eq!(err.kind, ErrorKind::UnboundName("x".into()));
    assert_eq!(err.category(), ErrorCategory::Runtime);
}

#[test]
fn unmatched_captures_are_skipped() {
    let mut tree = MemoryTree::new();
    let service = tree.add_node("block_mapping_pair", "web");
    let name = tree.add_node("flow_node", "web");
    tree.add_match(SERVICES, QueryMatch::new().with("service", service).with("name", name));

    let node = NodeDecl::new("service").with_match(
        MatchBlock::named("services")
            .capture(Capture::new("name").with(Emit::single(image(Expr::capture("name", &[])))))
            .capture(Capture::new("body").with(Emit::single(image(Expr::string("unreachable"))))),
    );
    let outcome = engine(node, EngineConfig::default()).run(&tree).unwrap();

    assert_eq!(outcome.graph.len(), 1);
    assert_eq!(outcome.graph.facts()[0].field("name"), Some(&Value::from("web")));
}
