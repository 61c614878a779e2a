//! Signature table for host-implemented extern functions.
//!
//! The registry holds no executable code. Calls are resolved against it at
//! compile time; the engine later invokes the host function bound to the
//! same [`ExternKey`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use planardl_foundation::{Diagnostics, Error, ErrorKind, Result, Span, Type};
use tracing::trace;

use crate::ast::{ExternDecl, ExternName, TypeRef};
use crate::resolver::primitive_type;

/// Host table key: full extern name plus parameter count.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternKey {
    /// Full name: `module.fn`, or the bare name for builtins.
    pub name: Arc<str>,
    /// Number of parameters.
    pub arity: usize,
}

impl ExternKey {
    /// Creates a key.
    pub fn new(name: impl Into<Arc<str>>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

impl fmt::Display for ExternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// A registered extern signature.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternSignature {
    /// Host table key.
    pub key: ExternKey,
    /// Name without the module prefix.
    pub short_name: String,
    /// Whether this is an operator overload.
    pub operator: bool,
    /// Parameter names and types.
    pub params: Vec<(String, Type)>,
    /// Return type.
    pub return_type: Type,
    /// Whether the host may return nil.
    pub nullable: bool,
    /// Source span of the declaration.
    pub span: Span,
}

impl ExternSignature {
    /// Returns true if every parameter accepts the matching argument type.
    #[must_use]
    pub fn accepts(&self, args: &[Type]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|((_, param), arg)| param.accepts(arg))
    }

}

/// Pure signature table keyed by full name and arity.
#[derive(Clone, Debug, Default)]
pub struct ExternRegistry {
    signatures: Vec<Arc<ExternSignature>>,
    by_key: HashMap<ExternKey, usize>,
    by_full_name: HashMap<Arc<str>, Vec<usize>>,
    by_short_name: HashMap<String, Vec<usize>>,
}

impl ExternRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// All signatures in registration order.
    pub fn signatures(&self) -> impl Iterator<Item = &Arc<ExternSignature>> {
        self.signatures.iter()
    }

    /// Gets a signature by key.
    #[must_use]
    pub fn get(&self, key: &ExternKey) -> Option<&Arc<ExternSignature>> {
        self.by_key.get(key).map(|&i| &self.signatures[i])
    }

    /// Registers one signature.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateExtern` if the name and arity are already taken.
    pub fn register(&mut self, signature: ExternSignature) -> Result<()> {
        if self.by_key.contains_key(&signature.key) {
            return Err(Error::new(ErrorKind::DuplicateExtern {
                name: signature.key.name.to_string(),
                arity: signature.key.arity,
            })
            .with_span(signature.span));
        }

        trace!(key = %signature.key, "registering extern");
        let index = self.signatures.len();
        self.by_key.insert(signature.key.clone(), index);
        self.by_full_name
            .entry(signature.key.name.clone())
            .or_default()
            .push(index);
        self.by_short_name
            .entry(signature.short_name.clone())
            .or_default()
            .push(index);
        self.signatures.push(Arc::new(signature));
        Ok(())
    }

    /// Registers every function of an extern block.
    ///
    /// Parameter and return types are limited to builtin primitives.
    ///
    /// # Errors
    ///
    /// Returns every registration and type error found in the block.
    pub fn register_decl(
        &mut self,
        module: Option<&str>,
        decl: &ExternDecl,
    ) -> std::result::Result<(), Diagnostics> {
        let mut resolve = |r: &TypeRef| {
            primitive_type(&r.name, &[])
                .ok_or_else(|| Error::unresolved_type(&r.name).with_span(r.span))
        };
        let mut diagnostics = Diagnostics::new();
        self.register_decl_with(module, decl, &mut resolve, &mut diagnostics);
        diagnostics.into_result(())
    }

    /// Registers every function of an extern block, resolving parameter
    /// types with `resolve`. Errors are recorded, not returned.
    pub fn register_decl_with(
        &mut self,
        module: Option<&str>,
        decl: &ExternDecl,
        resolve: &mut dyn FnMut(&TypeRef) -> Result<Type>,
        diagnostics: &mut Diagnostics,
    ) {
        let namespace = if decl.is_builtin() {
            None
        } else {
            decl.module.as_deref().or(module)
        };

        for function in &decl.functions {
            let short_name = function.name.as_str().to_string();
            let full_name = match namespace {
                Some(ns) => format!("{ns}.{short_name}"),
                None => short_name.clone(),
            };

            let mut params = Vec::with_capacity(function.params.len());
            let mut ok = true;
            for param in &function.params {
                match resolve(&param.ty) {
                    Ok(ty) => params.push((param.name.clone(), ty)),
                    Err(e) => {
                        diagnostics.push(e);
                        ok = false;
                    }
                }
            }
            let return_type = match &function.return_type {
                Some(r) => match resolve(r) {
                    Ok(ty) => ty,
                    Err(e) => {
                        diagnostics.push(e);
                        ok = false;
                        Type::Any
                    }
                },
                None => Type::Bool,
            };
            if !ok {
                continue;
            }

            let signature = ExternSignature {
                key: ExternKey::new(full_name, params.len()),
                short_name,
                operator: matches!(function.name, ExternName::Operator(_)),
                params,
                return_type,
                nullable: function.nullable_return,
                span: function.span,
            };
            diagnostics.record(self.register(signature));
        }
    }

    /// Resolves a call by name and argument types.
    ///
    /// Tries `name` as a full name first, then as a short name across all
    /// modules. Exactly one signature of the right arity may accept the
    /// arguments.
    ///
    /// # Errors
    ///
    /// Returns `NoMatchingExtern` if nothing accepts the arguments and
    /// `AmbiguousExtern` if several do.
    pub fn resolve_call(&self, name: &str, args: &[Type]) -> Result<Arc<ExternSignature>> {
        let candidates = self
            .by_full_name
            .get(name)
            .or_else(|| self.by_short_name.get(name))
            .map_or(&[][..], Vec::as_slice);

        let mut accepted: Vec<Arc<ExternSignature>> = candidates
            .iter()
            .map(|&i| &self.signatures[i])
            .filter(|sig| sig.accepts(args))
            .cloned()
            .collect();

        match accepted.len() {
            0 => Err(Error::new(ErrorKind::NoMatchingExtern {
                name: name.to_string(),
                args: args.to_vec(),
            })),
            1 => Ok(accepted.swap_remove(0)),
            _ => Err(Error::new(ErrorKind::AmbiguousExtern {
                name: name.to_string(),
                candidates: accepted.iter().map(|s| s.key.to_string()).collect(),
            })),
        }
    }
}
