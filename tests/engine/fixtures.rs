//! Shared schema and syntax trees for engine tests.

use std::sync::Arc;

use planardl_engine::{
    EngineConfig, HostFunctions, MatchCompiler, MatchEngine, MemoryTree, PlanSet, QueryMatch,
};
use planardl_foundation::{Diagnostics, Span};
use planardl_language::ast::{
    Capture, EdgeDecl, Emit, EmitOperand, Expr, FactConstructor, FactDecl, MatchBlock, Module,
    NodeDecl, QueryDecl, TypeDecl, TypeRef,
};
use planardl_language::{InMemoryModules, ModuleLoader, SymbolTable};
use planardl_stdlib::{builtin_externs, builtin_host};

pub const SERVICES: &str =
    "(block_mapping_pair key: (_) @name value: (block_node) @body) @service";

/// A cut-down compose schema: services with a refined port, and images.
pub fn schema() -> Module {
    Module::new("compose")
        .with(builtin_externs())
        .with(TypeDecl::new(
            "Port",
            TypeRef::named("Int").refined(Expr::in_range(Expr::int(1), Some(Expr::int(65535)), true)),
        ))
        .with(
            FactDecl::new("Service")
                .field("name", TypeRef::named("String"))
                .field("port", TypeRef::named("Port")),
        )
        .with(FactDecl::new("Image").field("name", TypeRef::named("String")))
        .with(EdgeDecl::new(
            "uses",
            TypeRef::named("Service"),
            TypeRef::named("Image"),
            "uses",
        ))
        .with(QueryDecl::new("services", SERVICES))
}

/// Compiles the schema plus `node`.
pub fn compile(node: NodeDecl) -> Result<Arc<PlanSet>, Diagnostics> {
    let registry = ModuleLoader::new(&InMemoryModules::new()).load(schema().with(node))?;
    let table = SymbolTable::build(&registry)?;
    MatchCompiler::new(&table).compile().map(Arc::new)
}

pub fn engine(node: NodeDecl, config: EngineConfig) -> MatchEngine {
    let host: Arc<HostFunctions> = Arc::new(builtin_host());
    MatchEngine::new(compile(node).unwrap(), host, config).unwrap()
}

/// One service entry in a compose file.
#[derive(Clone, Debug)]
pub struct ServiceSpec {
    pub name: String,
    pub port: String,
    pub image: String,
}

impl ServiceSpec {
    pub fn new(name: &str, port: impl ToString, image: &str) -> Self {
        Self {
            name: name.to_string(),
            port: port.to_string(),
            image: image.to_string(),
        }
    }
}

/// Builds a tree with one `block_mapping_pair` per service. Each service
/// node has `name`, `port` and `image` children.
pub fn tree(services: &[ServiceSpec]) -> MemoryTree {
    let mut tree = MemoryTree::new();
    for (i, spec) in services.iter().enumerate() {
        let line = u32::try_from(i).unwrap() * 4 + 2;
        let service = tree.add_node_at("block_mapping_pair", &spec.name, Span::new(0, 0, line, 3));
        let key = tree.add_node("flow_node", spec.name.clone());
        let body = tree.add_node("block_node", "...");
        let port = tree.add_node("flow_node", format!("\"{}\"", spec.port));
        let image = tree.add_node("flow_node", spec.image.clone());
        tree.set_child(service, "name", key);
        tree.set_child(service, "port", port);
        tree.set_child(service, "image", image);
        tree.add_match(
            SERVICES,
            QueryMatch::new()
                .with("service", service)
                .with("name", key)
                .with("body", body),
        );
    }
    tree
}

pub fn web_and_db() -> MemoryTree {
    tree(&[
        ServiceSpec::new("web", 8080, "nginx"),
        ServiceSpec::new("db", 70000, "postgres"),
    ])
}

/// `services` handler emitting one `Service` per match.
pub fn service_handler() -> NodeDecl {
    NodeDecl::new("service").with_match(MatchBlock::named("services").capture(
        Capture::new("service").with(Emit::single(EmitOperand::Construct(
            FactConstructor::new("Service")
                .set("name", Expr::capture("service", &["name"]))
                .set("port", Expr::capture("service", &["port"])),
        ))),
    ))
}
