//! Integration tests for refinement types
//!
//! Tests static checking of refinement predicates against the builtin
//! externs, and how refinements travel through aliases and fact fields.

use planardl_foundation::{Diagnostics, ErrorCategory, ErrorKind, Type};
use planardl_language::ast::{BinaryOp, Expr, FactDecl, Module, TypeDecl, TypeRef};
use planardl_language::{
    ExternRegistry, InMemoryModules, ModuleLoader, RefinementChecker, SymbolTable,
};
use planardl_stdlib::builtin_externs;
use proptest::prelude::*;

fn builtins() -> ExternRegistry {
    let mut registry = ExternRegistry::new();
    registry.register_decl(None, &builtin_externs()).unwrap();
    registry
}

fn build(root: Module) -> Result<SymbolTable, Diagnostics> {
    let registry = ModuleLoader::new(&InMemoryModules::new())
        .load(root.with(builtin_externs()))
        .unwrap();
    SymbolTable::build(&registry)
}

fn port() -> TypeDecl {
    TypeDecl::new(
        "Port",
        TypeRef::named("Int").refined(Expr::in_range(Expr::int(1), Some(Expr::int(65535)), true)),
    )
}

// =============================================================================
// Checking
// =============================================================================

#[test]
fn predicates_over_strings() {
    let externs = builtins();
    let checker = RefinementChecker::new(&externs);

    for refinement in [
        Expr::name("is_pascal_case"),
        Expr::call("starts_with", vec![Expr::it(), Expr::string("app_")]),
        Expr::binary(
            BinaryOp::And,
            Expr::call("is_snake_case", vec![Expr::it()]),
            Expr::binary(
                BinaryOp::Lt,
                Expr::call("len", vec![Expr::it()]),
                Expr::int(64),
            ),
        ),
    ] {
        let predicate = checker.check(&refinement, &Type::String).unwrap();
        assert_eq!(predicate.typed.ty, Type::Bool);
    }
}

#[test]
fn list_membership_needs_comparable_items() {
    let externs = builtins();
    let checker = RefinementChecker::new(&externs);
    let protocols = Expr::in_list(vec![Expr::string("tcp"), Expr::string("udp")]);

    assert!(checker.check(&protocols, &Type::String).is_ok());
    let err = checker.check(&protocols, &Type::Int).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Static);
}

#[test]
fn range_on_strings_is_ill_typed() {
    let externs = builtins();
    let checker = RefinementChecker::new(&externs);

    let err = checker
        .check(&Expr::in_range(Expr::int(1), None, false), &Type::String)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Static);
}

#[test]
fn unknown_predicate_is_reported() {
    let externs = builtins();
    let checker = RefinementChecker::new(&externs);

    let err = checker
        .check(&Expr::name("is_kebab_case"), &Type::String)
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NoMatchingExtern { ref name, .. } if name == "is_kebab_case"));
}

// =============================================================================
// Propagation
// =============================================================================

#[test]
fn fact_fields_inherit_alias_refinements() {
    let root = Module::new("compose")
        .with(port())
        .with(TypeDecl::new(
            "PrivilegedPort",
            TypeRef::named("Port").refined(Expr::section(BinaryOp::Lt, Expr::int(1024))),
        ))
        .with(
            FactDecl::new("Listener")
                .field("port", TypeRef::named("PrivilegedPort"))
                .field(
                    "name",
                    TypeRef::named("String").refined(Expr::name("is_snake_case")),
                ),
        );
    let table = build(root).unwrap();

    let listener = table.fact_in("compose", "Listener").unwrap();
    let port = &listener.field("port").unwrap().ty;
    assert_eq!(port.ty, Type::Int);
    assert_eq!(port.refinements.len(), 2);
    assert_eq!(listener.field("name").unwrap().ty.refinements.len(), 1);
}

#[test]
fn every_bad_refinement_is_reported() {
    let root = Module::new("m")
        .with(TypeDecl::new(
            "A",
            TypeRef::named("Int").refined(Expr::name("is_pascal_case")),
        ))
        .with(TypeDecl::new(
            "B",
            TypeRef::named("String").refined(Expr::call("len", vec![Expr::it()])),
        ));
    let diags = build(root).unwrap_err();

    assert_eq!(diags.len(), 2);
    assert!(diags
        .iter()
        .any(|e| matches!(e.kind, ErrorKind::RefinementType { .. })));
}

proptest! {
    #[test]
    fn numeric_sections_check_on_ints_and_floats(bound in -1000i64..1000, float in any::<bool>()) {
        let externs = builtins();
        let checker = RefinementChecker::new(&externs);
        let subject = if float { Type::Float } else { Type::Int };

        for op in [BinaryOp::Lt, BinaryOp::Le, BinaryOp::Gt, BinaryOp::Ge] {
            let predicate = checker.check(&Expr::section(op, Expr::int(bound)), &subject);
            prop_assert!(predicate.is_ok());
        }
    }

    #[test]
    fn ranges_check_with_any_bounds(start in -1000i64..1000, len in 0i64..1000, inclusive in any::<bool>()) {
        let externs = builtins();
        let checker = RefinementChecker::new(&externs);
        let range = Expr::in_range(Expr::int(start), Some(Expr::int(start + len)), inclusive);
        prop_assert!(checker.check(&range, &Type::Int).is_ok());
    }
}
