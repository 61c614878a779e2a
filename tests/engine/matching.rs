//! Integration tests for matching
//!
//! Tests graph construction, refinement fault policies, and determinism.

use planardl_engine::{EngineConfig, MemoryTree, RefinementPolicy};
use planardl_foundation::{ErrorCategory, ErrorKind, Value};
use planardl_language::ast::{
    Capture, Direction, Emit, EmitOperand, Expr, FactConstructor, MatchBlock, NodeDecl, Relation,
};
use proptest::prelude::*;

use crate::fixtures::{ServiceSpec, engine, service_handler, tree, web_and_db};

#[test]
fn empty_tree_yields_empty_graph() {
    let outcome = engine(service_handler(), EngineConfig::default())
        .run(&MemoryTree::new())
        .unwrap();
    assert!(outcome.graph.is_empty());
    assert!(outcome.graph.edges().is_empty());
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn facts_follow_match_order_and_keep_origins() {
    let outcome = engine(service_handler(), EngineConfig::default())
        .run(&web_and_db())
        .unwrap();
    let graph = &outcome.graph;

    assert_eq!(graph.count_of("compose.Service"), 2);
    let names: Vec<_> = graph.facts().iter().map(|f| f.field("name").cloned()).collect();
    assert_eq!(names, vec![Some(Value::from("web")), Some(Value::from("db"))]);

    let lines: Vec<_> = graph
        .facts()
        .iter()
        .map(|f| f.origin.map(|n| n.span.line))
        .collect();
    assert_eq!(lines, vec![Some(2), Some(6)]);
}

// =============================================================================
// Fault policies
// =============================================================================

#[test]
fn out_of_range_port_drops_only_that_field() {
    let outcome = engine(service_handler(), EngineConfig::default())
        .run(&web_and_db())
        .unwrap();

    let db = &outcome.graph.facts()[1];
    assert!(db.has_field("name"));
    assert!(!db.has_field("port"));

    let errors: Vec<_> = outcome.diagnostics.iter().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category(), ErrorCategory::Runtime);
    assert!(matches!(
        &errors[0].kind,
        ErrorKind::RefinementViolation { fact, field, value, .. }
            if fact == "compose.Service" && field == "port" && *value == Value::Int(70000)
    ));
}

#[test]
fn discard_policy_drops_the_whole_fact() {
    let config = EngineConfig::default().with_refinement_policy(RefinementPolicy::DiscardEmit);
    let outcome = engine(service_handler(), config).run(&web_and_db()).unwrap();

    assert_eq!(outcome.graph.len(), 1);
    assert_eq!(outcome.graph.facts()[0].field("name"), Some(&Value::from("web")));
    assert_eq!(outcome.diagnostics.len(), 1);
}

#[test]
fn failed_emit_forgets_its_dropped_fields() {
    // Nothing is ever tagged to `@service`, so every emit fails after the
    // constructor has already dropped db's port.
    let node = NodeDecl::new("service").with_match(MatchBlock::named("services").capture(
        Capture::new("service").with(Capture::new("name").with(Emit::related(
            EmitOperand::Construct(
                FactConstructor::new("Service")
                    .set("name", Expr::capture("service", &["name"]))
                    .set("port", Expr::capture("service", &["port"])),
            ),
            Relation::new(Direction::Forward),
            EmitOperand::reference("@service"),
        ))),
    ));
    let outcome = engine(node, EngineConfig::default()).run(&web_and_db()).unwrap();

    assert!(outcome.graph.is_empty());
    let kinds: Vec<_> = outcome.diagnostics.iter().map(|e| e.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            ErrorKind::UnboundName("@service".into()),
            ErrorKind::UnboundName("@service".into()),
        ]
    );
}

#[test]
fn unchecked_refinements_keep_raw_values() {
    let config = EngineConfig::default().with_check_refinements(false);
    let outcome = engine(service_handler(), config).run(&web_and_db()).unwrap();
    assert_eq!(outcome.graph.facts()[1].field("port"), Some(&Value::Int(70000)));
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn unparsable_port_is_a_runtime_diagnostic() {
    let services = [
        ServiceSpec::new("web", "eighty", "nginx"),
        ServiceSpec::new("db", 5432, "postgres"),
    ];
    let outcome = engine(service_handler(), EngineConfig::default())
        .run(&tree(&services))
        .unwrap();

    assert_eq!(outcome.graph.count_of("compose.Service"), 1);
    assert_eq!(outcome.graph.facts()[0].field("port"), Some(&Value::Int(5432)));
    assert!(outcome
        .diagnostics
        .iter()
        .all(|e| e.category() == ErrorCategory::Runtime));
    assert_eq!(outcome.diagnostics.len(), 1);
}

// =============================================================================
// Properties
// =============================================================================

fn services() -> impl Strategy<Value = Vec<ServiceSpec>> {
    prop::collection::vec(
        ("[a-z]{1,8}", 0i64..=70_000, "[a-z]{1,8}")
            .prop_map(|(name, port, image)| ServiceSpec::new(&name, port, &image)),
        0..12,
    )
}

proptest! {
    #[test]
    fn port_field_kept_iff_in_range(port in 0i64..=70_000) {
        let services = [ServiceSpec::new("svc", port, "img")];
        let outcome = engine(service_handler(), EngineConfig::default())
            .run(&tree(&services))
            .unwrap();

        let fact = &outcome.graph.facts()[0];
        let in_range = (1..=65_535).contains(&port);
        prop_assert_eq!(fact.has_field("port"), in_range);
        prop_assert_eq!(outcome.diagnostics.is_empty(), in_range);
    }

    #[test]
    fn runs_are_idempotent(services in services()) {
        let engine = engine(service_handler(), EngineConfig::default());
        let tree = tree(&services);

        let first = engine.run(&tree).unwrap();
        let second = engine.run(&tree).unwrap();
        prop_assert_eq!(&first.graph, &second.graph);
        prop_assert_eq!(first.diagnostics.len(), second.diagnostics.len());
        prop_assert_eq!(first.graph.len(), services.len());
    }
}
