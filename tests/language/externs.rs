//! Integration tests for extern declarations
//!
//! Tests registration of extern blocks across modules and agreement between
//! the builtin signatures and their host implementations.

use planardl_foundation::{ErrorKind, Type, Value};
use planardl_language::ast::{ExternDecl, ExternFn, Import, Module};
use planardl_language::{ExternKey, ExternRegistry, InMemoryModules, ModuleLoader, SymbolTable};
use planardl_stdlib::{builtin_externs, builtin_host};

fn text(module: &str) -> Module {
    Module::new(module).with(
        ExternDecl::new(Some("text".into()))
            .function(ExternFn::new("shout").param("s", "String").returns("String")),
    )
}

// =============================================================================
// Builtins
// =============================================================================

#[test]
fn every_builtin_signature_has_a_host_function() {
    let mut registry = ExternRegistry::new();
    registry.register_decl(None, &builtin_externs()).unwrap();

    let host = builtin_host();
    let keys: Vec<ExternKey> = registry.signatures().map(|s| s.key.clone()).collect();
    assert!(!keys.is_empty());
    host.verify(&keys).unwrap();
}

#[test]
fn builtins_are_bare_and_operators_keep_their_symbol() {
    let mut registry = ExternRegistry::new();
    registry.register_decl(Some("anywhere"), &builtin_externs()).unwrap();

    assert!(registry.get(&ExternKey::new("lower", 1)).is_some());
    assert!(registry.get(&ExternKey::new("anywhere.lower", 1)).is_none());

    let plus = registry.get(&ExternKey::new("+", 2)).unwrap();
    assert!(plus.operator);
    assert_eq!(plus.return_type, Type::String);
}

#[test]
fn builtin_predicates_default_to_bool() {
    let mut registry = ExternRegistry::new();
    registry.register_decl(None, &builtin_externs()).unwrap();

    let sig = registry.resolve_call("is_snake_case", &[Type::String]).unwrap();
    assert_eq!(sig.return_type, Type::Bool);
    let to_int = registry.resolve_call("to_int", &[Type::String]).unwrap();
    assert!(to_int.nullable);
}

#[test]
fn builtin_host_functions_run() {
    let host = builtin_host();
    assert_eq!(
        host.invoke(&ExternKey::new("upper", 1), &[Value::from("web")]).unwrap(),
        Value::from("WEB")
    );
    assert_eq!(
        host.invoke(&ExternKey::new("+", 2), &[Value::from("a"), Value::from("b")]).unwrap(),
        Value::from("ab")
    );
}

// =============================================================================
// Registration across modules
// =============================================================================

#[test]
fn same_namespace_in_two_modules_collides() {
    let root = text("app").with(Import::new("other"));
    let resolver = InMemoryModules::new().with(text("other"));
    let registry = ModuleLoader::new(&resolver).load(root).unwrap();

    let diags = SymbolTable::build(&registry).unwrap_err();
    assert!(diags.iter().any(|e| e.kind
        == ErrorKind::DuplicateExtern {
            name: "text.shout".into(),
            arity: 1
        }));
}

#[test]
fn arity_overloads_coexist() {
    let root = Module::new("app").with(
        ExternDecl::new(None)
            .function(ExternFn::new("join").param("a", "String").returns("String"))
            .function(
                ExternFn::new("join")
                    .param("a", "String")
                    .param("b", "String")
                    .returns("String"),
            ),
    );
    let registry = ModuleLoader::new(&InMemoryModules::new()).load(root).unwrap();
    let table = SymbolTable::build(&registry).unwrap();

    let externs = table.externs();
    assert!(externs.get(&ExternKey::new("app.join", 1)).is_some());
    assert!(externs.get(&ExternKey::new("app.join", 2)).is_some());
    assert_eq!(
        externs
            .resolve_call("join", &[Type::String, Type::String])
            .unwrap()
            .key
            .arity,
        2
    );
}

#[test]
fn unbound_host_function_is_reported() {
    let err = builtin_host()
        .verify(&[ExternKey::new("text.shout", 1)])
        .unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::UnboundExtern {
            name: "text.shout".into(),
            arity: 1
        }
    );
}
