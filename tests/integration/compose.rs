//! A small docker-compose schema and grammar used by the pipeline tests.
//!
//! The grammar understands just enough YAML for a `services:` mapping whose
//! entries carry `image:` and `ports:` keys.

use planardl_engine::{MemoryTree, QueryMatch, SyntaxTree};
use planardl_foundation::{Error, ErrorCategory, ErrorKind, FactId, Result, Span, Value};
use planardl_graph::{FactGraph, FactInstance};
use planardl_language::InMemoryModules;
use planardl_language::ast::{
    Capture, Direction, EdgeDecl, Emit, EmitOperand, Expr, FactConstructor, FactDecl, Import,
    MatchBlock, Module, NodeDecl, QueryDecl, Relation, SchemaHeader, TypeDecl, TypeRef,
};
use planardl_runtime::{CompiledUnit, Session, SessionConfig};

pub const SERVICES: &str = "(block_mapping_pair key: (_) @name value: (block_node) @body) @service";

pub const COMPOSE_FILE: &str = "\
services:
  web:
    image: nginx
    ports: 8080
  db:
    image: postgres
    ports: 70000
";

/// Parses the `services:` section of a compose file into a tree.
pub fn parse_compose(source: &str) -> Result<Box<dyn SyntaxTree>> {
    let mut tree = MemoryTree::new();
    let mut current = None;

    for (index, line) in source.lines().enumerate() {
        let number = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "services:" {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        let (key, value) = trimmed
            .split_once(':')
            .ok_or_else(|| Error::new(ErrorKind::Parse(format!("line {number}: expected `key:`"))))?;

        match indent {
            2 => {
                let span = Span::new(0, 0, number, 3);
                let service = tree.add_node_at("block_mapping_pair", trimmed, span);
                let name = tree.add_node_at("flow_node", key, span);
                let body = tree.add_node("block_node", "");
                tree.set_child(service, "name", name);
                tree.add_match(
                    SERVICES,
                    QueryMatch::new()
                        .with("service", service)
                        .with("name", name)
                        .with("body", body),
                );
                current = Some(service);
            }
            4 => {
                let service = current.ok_or_else(|| {
                    Error::new(ErrorKind::Parse(format!("line {number}: key outside a service")))
                })?;
                let field = match key {
                    "ports" => "port",
                    other => other,
                };
                let node = tree.add_node_at("flow_node", value.trim(), Span::new(0, 0, number, 5));
                tree.set_child(service, field, node);
            }
            _ => {
                return Err(Error::new(ErrorKind::Parse(format!(
                    "line {number}: unexpected indentation"
                ))));
            }
        }
    }
    Ok(Box::new(tree))
}

/// The `docker.compose` schema module.
pub fn schema() -> Module {
    Module::new("docker.compose")
        .with(SchemaHeader::new("docker.compose", "compose_yaml"))
        .with(
            TypeDecl::new(
                "Port",
                TypeRef::named("Int")
                    .refined(Expr::in_range(Expr::int(1), Some(Expr::int(65535)), true)),
            )
            .public(),
        )
        .with(
            FactDecl::new("Service")
                .field("name", TypeRef::named("String"))
                .field("port", TypeRef::named("Port"))
                .public(),
        )
        .with(
            FactDecl::new("Image")
                .field("name", TypeRef::named("String"))
                .public(),
        )
        .with(EdgeDecl::new(
            "uses",
            TypeRef::named("Service"),
            TypeRef::named("Image"),
            "uses",
        ))
        .with(QueryDecl::new("services", SERVICES).public())
}

/// Root module: one `Service -[uses]-> Image` emit per service.
pub fn app() -> Module {
    Module::new("app").with(Import::new("docker.compose")).with(
        NodeDecl::new("service").with_match(MatchBlock::named("services").capture(
            Capture::new("service").with(Emit::related(
                EmitOperand::Construct(
                    FactConstructor::new("Service")
                        .set("name", Expr::capture("service", &["name"]))
                        .set("port", Expr::capture("service", &["port"])),
                ),
                Relation::named(Direction::Forward, "uses"),
                EmitOperand::Construct(
                    FactConstructor::new("Image").set("name", Expr::capture("service", &["image"])),
                ),
            )),
        )),
    )
}

pub fn session(config: SessionConfig) -> Session {
    Session::new(InMemoryModules::new().with(schema()))
        .with_config(config)
        .unwrap()
        .with_grammar("compose_yaml", parse_compose)
}

pub fn unit(session: &Session) -> CompiledUnit {
    session.compile(app()).unwrap()
}

fn service<'g>(graph: &'g FactGraph, name: &str) -> &'g FactInstance {
    graph
        .facts_of("docker.compose.Service")
        .find(|f| f.field("name") == Some(&Value::from(name)))
        .unwrap()
}

// =============================================================================
// End to end
// =============================================================================

#[test]
fn out_of_range_port_is_scoped_to_its_field() {
    let session = session(SessionConfig::sequential());
    let unit = unit(&session);
    let outcome = session.run_source(&unit, COMPOSE_FILE).unwrap();
    let graph = &outcome.graph;

    assert_eq!(graph.count_of("docker.compose.Service"), 2);
    assert_eq!(graph.count_of("docker.compose.Image"), 2);
    assert_eq!(graph.edges().len(), 2);

    let web = service(graph, "web");
    assert_eq!(web.field("port"), Some(&Value::Int(8080)));
    let db = service(graph, "db");
    assert!(!db.has_field("port"));
    assert!(graph.has_edge(db.id, FactId(3), Some("uses")));

    assert_eq!(outcome.diagnostics.len(), 1);
    let err = outcome.diagnostics.iter().next().unwrap();
    assert_eq!(err.category(), ErrorCategory::Runtime);
    assert!(matches!(
        &err.kind,
        ErrorKind::RefinementViolation { fact, field, value, .. }
            if fact == "docker.compose.Service" && field == "port" && *value == Value::Int(70000)
    ));
}

#[test]
fn unit_reports_grammar_and_handlers() {
    let session = session(SessionConfig::default());
    let unit = unit(&session);

    assert_eq!(unit.name(), "app");
    assert_eq!(unit.grammar(), Some("compose_yaml"));
    assert_eq!(unit.plans().len(), 1);
    assert!(unit.table().fact("docker.compose.Service").is_some());
}

#[test]
fn static_errors_stop_compilation() {
    let session = session(SessionConfig::default());
    let broken = Module::new("app").with(Import::new("docker.compose")).with(
        NodeDecl::new("service").with_match(MatchBlock::named("services").capture(
            Capture::new("service").with(Emit::single(EmitOperand::Construct(
                FactConstructor::new("Service").set("replicas", Expr::int(2)),
            ))),
        )),
    );

    let diags = session.compile(broken).unwrap_err();
    assert!(diags
        .iter()
        .any(|e| matches!(e.kind, ErrorKind::UnknownField { ref field, .. } if field == "replicas")));
}

#[test]
fn malformed_subject_is_fatal() {
    let session = session(SessionConfig::sequential());
    let unit = unit(&session);
    let err = session
        .run_source(&unit, "services:\n   web:\n")
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Fatal);
}
