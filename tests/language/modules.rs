//! Integration tests for module loading and name resolution
//!
//! Tests import graphs, visibility, and grammar propagation across modules.

use planardl_foundation::{Diagnostics, ErrorCategory, ErrorKind, Type};
use planardl_language::ast::{
    EdgeDecl, FactDecl, GrammarUse, Import, Module, QueryDecl, SchemaHeader, TypeDecl, TypeRef,
};
use planardl_language::{InMemoryModules, ModuleLoader, ModuleRegistry, SymbolTable};

fn load(root: Module, others: Vec<Module>) -> Result<ModuleRegistry, Diagnostics> {
    let resolver = others
        .into_iter()
        .fold(InMemoryModules::new(), InMemoryModules::with);
    ModuleLoader::new(&resolver).load(root)
}

fn build(root: Module, others: Vec<Module>) -> Result<SymbolTable, Diagnostics> {
    SymbolTable::build(&load(root, others)?)
}

fn compose() -> Module {
    Module::new("docker.compose")
        .with(SchemaHeader::new("docker.compose", "yaml"))
        .with(TypeDecl::new("Name", TypeRef::named("String")).public())
        .with(
            FactDecl::new("Service")
                .field("name", TypeRef::named("Name"))
                .field("image", TypeRef::named("String"))
                .public(),
        )
        .with(QueryDecl::new("services", "(block_mapping_pair) @service").public())
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn modules_load_in_dependency_order() {
    let base = Module::new("base").with(TypeDecl::new("Id", TypeRef::named("Int")).public());
    let mid = Module::new("mid").with(Import::new("base"));
    let root = Module::new("app")
        .with(Import::new("mid"))
        .with(Import::new("base"));

    let registry = load(root, vec![base, mid]).unwrap();
    let names: Vec<_> = registry.modules().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["base", "mid", "app"]);
    assert_eq!(registry.root().unwrap().name, "app");
}

#[test]
fn import_cycle_names_the_chain() {
    let a = Module::new("a").with(Import::new("b"));
    let b = Module::new("b").with(Import::new("a"));

    let diags = load(a.clone(), vec![a, b]).unwrap_err();
    assert_eq!(diags.len(), 1);
    assert_eq!(
        diags.iter().next().unwrap().kind,
        ErrorKind::Cycle(vec!["a".into(), "b".into(), "a".into()])
    );
}

#[test]
fn missing_module_is_static() {
    let diags = load(Module::new("app").with(Import::new("nowhere")), Vec::new()).unwrap_err();
    let err = diags.iter().next().unwrap();
    assert_eq!(err.kind, ErrorKind::UnresolvedModule("nowhere".into()));
    assert_eq!(err.category(), ErrorCategory::Static);
}

#[test]
fn duplicate_declarations_in_one_module() {
    let root = Module::new("m")
        .with(FactDecl::new("Service"))
        .with(TypeDecl::new("Service", TypeRef::named("String")));
    let diags = load(root, Vec::new()).unwrap_err();
    assert_eq!(diags.iter().next().unwrap().kind, ErrorKind::DuplicateSymbol("m.Service".into()));
}

// =============================================================================
// Resolution across modules
// =============================================================================

#[test]
fn imported_facts_are_fully_qualified() {
    let root = Module::new("app")
        .with(Import::new("docker.compose"))
        .with(FactDecl::new("Deployment").field("service", TypeRef::named("Service")));
    let table = build(root, vec![compose()]).unwrap();

    let deployment = table.fact_in("app", "Deployment").unwrap();
    assert_eq!(
        deployment.field("service").unwrap().ty.ty,
        Type::fact("docker.compose.Service")
    );
    assert_eq!(
        table.fact_in("app", "Service").unwrap().name,
        "docker.compose.Service"
    );
    assert!(table.query_in("app", "services").is_some());
}

#[test]
fn grammar_comes_from_imported_schema() {
    let root = Module::new("app").with(Import::new("docker.compose"));
    let table = build(root, vec![compose()]).unwrap();
    assert_eq!(table.grammar(), Some("yaml"));
}

#[test]
fn conflicting_grammars_across_modules() {
    let root = Module::new("app")
        .with(Import::new("docker.compose"))
        .with(GrammarUse::new("json"));
    let diags = build(root, vec![compose()]).unwrap_err();
    assert!(diags
        .iter()
        .any(|e| matches!(e.kind, ErrorKind::GrammarConflict { .. })));
}

#[test]
fn errors_are_collected_not_short_circuited() {
    let root = Module::new("app")
        .with(FactDecl::new("A").field("x", TypeRef::named("Nope")))
        .with(FactDecl::new("B").field("y", TypeRef::named("AlsoNope")))
        .with(EdgeDecl::new("e", TypeRef::named("A"), TypeRef::named("Missing"), "e"));
    let diags = build(root, Vec::new()).unwrap_err();

    assert!(diags.len() >= 3);
    assert!(diags.iter().all(|e| e.category() == ErrorCategory::Static));
}

#[test]
fn private_names_stay_private() {
    let base = Module::new("base")
        .with(FactDecl::new("Hidden"))
        .with(QueryDecl::new("internal", "(x) @x"));
    let root = Module::new("app")
        .with(Import::new("base"))
        .with(FactDecl::new("Uses").field("h", TypeRef::named("Hidden")));

    let diags = build(root, vec![base]).unwrap_err();
    assert_eq!(diags.iter().next().unwrap().kind, ErrorKind::UnresolvedType("Hidden".into()));
}
