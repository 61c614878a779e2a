//! Builtin externs for Planardl.
//!
//! This crate provides:
//! - [`builtin_externs`] - The `#builtin` extern block declaring every builtin
//! - [`register_builtins`] - Host implementations for that block
//!
//! Builtins live outside any module namespace, so schemas call them by their
//! bare names (`lower(@s.name)`, `it | is_pascal_case`).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod strings;

use planardl_engine::HostFunctions;
use planardl_language::ExternKey;
use planardl_language::ast::{ExternDecl, ExternFn};

/// The `#builtin` extern block.
#[must_use]
pub fn builtin_externs() -> ExternDecl {
    ExternDecl::new(None)
        .with_attribute("builtin")
        .function(ExternFn::new("len").param("s", "String").returns("Int"))
        .function(ExternFn::new("lower").param("s", "String").returns("String"))
        .function(ExternFn::new("upper").param("s", "String").returns("String"))
        .function(ExternFn::new("trim").param("s", "String").returns("String"))
        .function(
            ExternFn::new("starts_with")
                .param("s", "String")
                .param("prefix", "String"),
        )
        .function(
            ExternFn::new("ends_with")
                .param("s", "String")
                .param("suffix", "String"),
        )
        .function(
            ExternFn::new("contains")
                .param("s", "String")
                .param("needle", "String"),
        )
        .function(ExternFn::new("is_pascal_case").param("s", "String"))
        .function(ExternFn::new("is_snake_case").param("s", "String"))
        .function(
            ExternFn::new("to_int")
                .param("s", "String")
                .returns("Int")
                .nullable(),
        )
        .function(
            ExternFn::operator("+")
                .param("left", "String")
                .param("right", "String")
                .returns("String"),
        )
}

/// Registers every builtin implementation.
pub fn register_builtins(host: &mut HostFunctions) {
    host.register(ExternKey::new("len", 1), strings::len);
    host.register(ExternKey::new("lower", 1), strings::lower);
    host.register(ExternKey::new("upper", 1), strings::upper);
    host.register(ExternKey::new("trim", 1), strings::trim);
    host.register(ExternKey::new("starts_with", 2), strings::starts_with);
    host.register(ExternKey::new("ends_with", 2), strings::ends_with);
    host.register(ExternKey::new("contains", 2), strings::contains);
    host.register(ExternKey::new("is_pascal_case", 1), strings::is_pascal_case);
    host.register(ExternKey::new("is_snake_case", 1), strings::is_snake_case);
    host.register(ExternKey::new("to_int", 1), strings::to_int);
    host.register(ExternKey::new("+", 2), strings::concat);
}

/// A host table holding only the builtins.
#[must_use]
pub fn builtin_host() -> HostFunctions {
    let mut host = HostFunctions::new();
    register_builtins(&mut host);
    host
}
