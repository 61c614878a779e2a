//! Name and type resolution.
//!
//! [`SymbolTable::build`] takes every loaded module and produces a closed,
//! read-only table: aliases are expanded to canonical [`ResolvedType`]s,
//! refinements are checked and lowered, fact/query/edge schemas are
//! recorded, and extern blocks are collected into an [`ExternRegistry`].
//!
//! Names are looked up per module: local declarations first, then the `pub`
//! declarations of directly imported modules (qualified and unqualified),
//! then the builtin primitives.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use planardl_foundation::{Diagnostics, Error, ErrorKind, Result, Span, Type};
use tracing::{debug, trace};

use crate::ast::{Declaration, NodeDecl, TypeAnnotation, TypeDecl, TypeDef, TypeRef, Visibility};
use crate::extern_registry::ExternRegistry;
use crate::module_registry::ModuleRegistry;
use crate::refinement::{Predicate, RefinementChecker};

// =============================================================================
// Builtin primitives
// =============================================================================

fn builtin_name(name: &str) -> &str {
    name.strip_prefix("builtin.").unwrap_or(name)
}

/// Number of type arguments a builtin takes, or `None` if `name` is not a
/// builtin.
#[must_use]
pub fn primitive_arity(name: &str) -> Option<usize> {
    match builtin_name(name) {
        "String" | "str" | "Int" | "i64" | "Float" | "f64" | "Bool" | "bool" | "Node" => Some(0),
        "List" | "list" => Some(1),
        _ => None,
    }
}

/// Builds a builtin type from its name and arguments.
///
/// Returns `None` if `name` is not a builtin or `args` has the wrong length.
#[must_use]
pub fn primitive_type(name: &str, args: &[Type]) -> Option<Type> {
    match (builtin_name(name), args) {
        ("String" | "str", []) => Some(Type::String),
        ("Int" | "i64", []) => Some(Type::Int),
        ("Float" | "f64", []) => Some(Type::Float),
        ("Bool" | "bool", []) => Some(Type::Bool),
        ("Node", []) => Some(Type::Node),
        ("List" | "list", [element]) => Some(Type::list(element.clone())),
        _ => None,
    }
}

// =============================================================================
// Resolved schemas
// =============================================================================

/// A type with every alias expanded.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedType {
    /// Canonical type.
    pub ty: Type,
    /// Predicates from the alias chain, outermost last.
    pub refinements: Vec<Arc<Predicate>>,
    /// Resolved element type of a list, carrying its own refinements.
    pub element: Option<Box<ResolvedType>>,
}

impl ResolvedType {
    /// A type without refinements.
    #[must_use]
    pub fn plain(ty: Type) -> Self {
        Self {
            ty,
            refinements: Vec::new(),
            element: None,
        }
    }

    /// Returns true if values of this type need run-time checks.
    #[must_use]
    pub fn is_refined(&self) -> bool {
        !self.refinements.is_empty() || self.element.as_ref().is_some_and(|e| e.is_refined())
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)?;
        for predicate in &self.refinements {
            write!(f, " | {predicate}")?;
        }
        Ok(())
    }
}

/// A resolved fact field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSchema {
    /// Field name.
    pub name: String,
    /// Declared type.
    pub ty: ResolvedType,
    /// Attribute names.
    pub attributes: Vec<String>,
}

/// A resolved fact declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct FactSchema {
    /// Fully-qualified name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldSchema>,
    /// Attribute names.
    pub attributes: Vec<String>,
}

impl FactSchema {
    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A query and the capture names it declares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySchema {
    /// Fully-qualified name; empty for inline queries.
    pub name: String,
    /// Raw query text.
    pub literal: String,
    /// Capture names, in order of first appearance.
    pub captures: Vec<String>,
}

impl QuerySchema {
    /// Extracts the `@name` captures of a raw query.
    #[must_use]
    pub fn from_literal(name: impl Into<String>, literal: impl Into<String>) -> Self {
        let literal = literal.into();
        let mut captures: Vec<String> = Vec::new();
        let mut rest = literal.as_str();
        while let Some(at) = rest.find('@') {
            rest = &rest[at + 1..];
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let capture = &rest[..end];
            if !capture.is_empty() && !captures.iter().any(|c| c == capture) {
                captures.push(capture.to_string());
            }
            rest = &rest[end..];
        }
        Self {
            name: name.into(),
            literal,
            captures,
        }
    }

    /// Returns true if the query declares `capture`.
    #[must_use]
    pub fn has_capture(&self, capture: &str) -> bool {
        self.captures.iter().any(|c| c == capture)
    }
}

/// A resolved edge declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeSchema {
    /// Fully-qualified name.
    pub name: String,
    /// Source fact.
    pub from: String,
    /// Target fact.
    pub to: String,
    /// Relation kind the edge is tagged with.
    pub kind: String,
}

/// A node handler together with its defining module.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeEntry {
    /// Defining module.
    pub module: String,
    /// The handler.
    pub decl: NodeDecl,
}

/// What a name refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    /// A type alias or record.
    Type,
    /// A fact.
    Fact,
    /// An edge.
    Edge,
    /// A query.
    Query,
}

/// A name visible in a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    /// What the name refers to.
    pub kind: SymbolKind,
    /// Fully-qualified name of the declaration.
    pub fq: String,
}

// =============================================================================
// SymbolTable
// =============================================================================

/// The closed result of resolving a compilation unit.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: HashMap<String, HashMap<String, Symbol>>,
    types: HashMap<String, ResolvedType>,
    facts: HashMap<String, Arc<FactSchema>>,
    queries: HashMap<String, Arc<QuerySchema>>,
    edges: HashMap<String, Arc<EdgeSchema>>,
    nodes: Vec<NodeEntry>,
    externs: Arc<ExternRegistry>,
    grammar: Option<String>,
}

impl SymbolTable {
    /// Resolves every module in `registry`.
    ///
    /// # Errors
    ///
    /// Returns all resolution, refinement, extern and grammar errors.
    pub fn build(registry: &ModuleRegistry) -> std::result::Result<Self, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let index = DeclIndex::build(registry);
        let grammar = check_grammar(registry, &mut diagnostics);

        // Extern parameter types only need their shape.
        let mut externs = ExternRegistry::new();
        {
            let mut shapes = TypeResolver::new(&index, None);
            let mut extern_diags = Diagnostics::new();
            for module in registry.modules() {
                for decl in &module.declarations {
                    if let Declaration::Extern(decl) = decl {
                        externs.register_decl_with(
                            Some(&module.name),
                            decl,
                            &mut |r: &TypeRef| shapes.resolve_ref(&module.name, r).map(|t| t.ty),
                            &mut extern_diags,
                        );
                    }
                }
            }
            push_all(&mut diagnostics, extern_diags);
        }

        let mut types = HashMap::new();
        let mut facts = HashMap::new();
        let mut queries = HashMap::new();
        let mut edges = HashMap::new();
        {
            let mut resolver = TypeResolver::new(&index, Some(RefinementChecker::new(&externs)));

            let mut type_names: Vec<&String> = index.types.keys().collect();
            type_names.sort();
            for fq in type_names {
                match resolver.resolve_type_decl(fq) {
                    Ok(resolved) => {
                        types.insert(fq.clone(), resolved);
                    }
                    Err(e) => push_unique(&mut diagnostics, e),
                }
            }

            for module in registry.modules() {
                for decl in &module.declarations {
                    match decl {
                        Declaration::Fact(fact) => {
                            let fq = qualify(&module.name, &fact.name);
                            let mut fields: Vec<FieldSchema> = Vec::with_capacity(fact.fields.len());
                            for field in &fact.fields {
                                if fields.iter().any(|f| f.name == field.name) {
                                    push_unique(
                                        &mut diagnostics,
                                        Error::duplicate_symbol(format!("{fq}.{}", field.name))
                                            .with_span(field.span),
                                    );
                                    continue;
                                }
                                match resolver.resolve_annotation(&module.name, &field.ty) {
                                    Ok(ty) => fields.push(FieldSchema {
                                        name: field.name.clone(),
                                        ty,
                                        attributes: attribute_names(&field.attributes),
                                    }),
                                    Err(e) => push_unique(&mut diagnostics, e),
                                }
                            }
                            facts.insert(
                                fq.clone(),
                                Arc::new(FactSchema {
                                    name: fq,
                                    fields,
                                    attributes: attribute_names(&fact.attributes),
                                }),
                            );
                        }
                        Declaration::Query(query) => {
                            let fq = qualify(&module.name, &query.name);
                            let schema = QuerySchema::from_literal(fq.clone(), query.literal.clone());
                            queries.insert(fq, Arc::new(schema));
                        }
                        Declaration::Edge(edge) => {
                            let from = resolver.resolve_fact_ref(&module.name, &edge.from);
                            let to = resolver.resolve_fact_ref(&module.name, &edge.to);
                            match (from, to) {
                                (Ok(from), Ok(to)) => {
                                    let fq = qualify(&module.name, &edge.name);
                                    edges.insert(
                                        fq.clone(),
                                        Arc::new(EdgeSchema {
                                            name: fq,
                                            from,
                                            to,
                                            kind: edge.relation_kind.clone(),
                                        }),
                                    );
                                }
                                (from, to) => {
                                    for e in [from.err(), to.err()].into_iter().flatten() {
                                        push_unique(&mut diagnostics, e);
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        let nodes = visible_nodes(registry);
        let table = Self {
            scopes: index.owned_scopes(),
            types,
            facts,
            queries,
            edges,
            nodes,
            externs: Arc::new(externs),
            grammar,
        };
        debug!(
            types = table.types.len(),
            facts = table.facts.len(),
            queries = table.queries.len(),
            edges = table.edges.len(),
            nodes = table.nodes.len(),
            externs = table.externs.len(),
            errors = diagnostics.len(),
            "symbol table built"
        );
        diagnostics.into_result(table)
    }

    /// Looks up `name` as seen from `module`.
    #[must_use]
    pub fn lookup(&self, module: &str, name: &str) -> Option<&Symbol> {
        self.scopes.get(module).and_then(|scope| scope.get(name))
    }

    /// Resolved type of a declared type, by fully-qualified name.
    #[must_use]
    pub fn resolved_type(&self, fq: &str) -> Option<&ResolvedType> {
        self.types.get(fq)
    }

    /// Fact schema by fully-qualified name.
    #[must_use]
    pub fn fact(&self, fq: &str) -> Option<&Arc<FactSchema>> {
        self.facts.get(fq)
    }

    /// Fact schema for `name` as seen from `module`.
    #[must_use]
    pub fn fact_in(&self, module: &str, name: &str) -> Option<&Arc<FactSchema>> {
        match self.lookup(module, name)? {
            Symbol {
                kind: SymbolKind::Fact,
                fq,
            } => self.facts.get(fq),
            _ => None,
        }
    }

    /// All fact schemas, in no particular order.
    pub fn facts(&self) -> impl Iterator<Item = &Arc<FactSchema>> {
        self.facts.values()
    }

    /// Query schema for `name` as seen from `module`.
    #[must_use]
    pub fn query_in(&self, module: &str, name: &str) -> Option<&Arc<QuerySchema>> {
        match self.lookup(module, name)? {
            Symbol {
                kind: SymbolKind::Query,
                fq,
            } => self.queries.get(fq),
            _ => None,
        }
    }

    /// The edge a named relation refers to, as seen from `module`.
    ///
    /// Matches an edge declared under that name first, then any edge whose
    /// relation kind is `kind`.
    #[must_use]
    pub fn edge_for_relation(&self, module: &str, kind: &str) -> Option<&Arc<EdgeSchema>> {
        if let Some(Symbol {
            kind: SymbolKind::Edge,
            fq,
        }) = self.lookup(module, kind)
        {
            return self.edges.get(fq);
        }
        let mut matching: Vec<&Arc<EdgeSchema>> =
            self.edges.values().filter(|e| e.kind == kind).collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        matching.into_iter().next()
    }

    /// Node handlers, in matching order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeEntry] {
        &self.nodes
    }

    /// The extern signature table.
    #[must_use]
    pub fn externs(&self) -> &Arc<ExternRegistry> {
        &self.externs
    }

    /// The grammar named by the unit, if any.
    #[must_use]
    pub fn grammar(&self) -> Option<&str> {
        self.grammar.as_deref()
    }
}

// =============================================================================
// Declaration index
// =============================================================================

struct DeclIndex<'r> {
    types: HashMap<String, (&'r str, &'r TypeDecl)>,
    facts: HashSet<String>,
    scopes: HashMap<&'r str, HashMap<String, Symbol>>,
}

impl<'r> DeclIndex<'r> {
    fn build(registry: &'r ModuleRegistry) -> Self {
        let mut types = HashMap::new();
        let mut facts = HashSet::new();
        let mut scopes: HashMap<&'r str, HashMap<String, Symbol>> = HashMap::new();

        for module in registry.modules() {
            for decl in &module.declarations {
                match decl {
                    Declaration::Type(t) => {
                        types.insert(qualify(&module.name, &t.name), (module.name.as_str(), t));
                    }
                    Declaration::Fact(f) => {
                        facts.insert(qualify(&module.name, &f.name));
                    }
                    _ => {}
                }
            }
        }

        for module in registry.modules() {
            let mut scope = HashMap::new();
            for (name, symbol) in symbols_of(&module.name, &module.declarations, false) {
                scope.insert(qualify(&module.name, &name), symbol.clone());
                scope.insert(name, symbol);
            }
            for import in module.imports() {
                let Some(imported) = registry.get(import) else {
                    continue;
                };
                for (name, symbol) in symbols_of(&imported.name, &imported.declarations, true) {
                    scope
                        .entry(qualify(import, &name))
                        .or_insert_with(|| symbol.clone());
                    scope.entry(name).or_insert(symbol);
                }
            }
            trace!(module = %module.name, names = scope.len(), "scope built");
            scopes.insert(module.name.as_str(), scope);
        }

        Self {
            types,
            facts,
            scopes,
        }
    }

    fn lookup(&self, module: &str, name: &str) -> Option<&Symbol> {
        self.scopes.get(module).and_then(|s| s.get(name))
    }

    fn owned_scopes(&self) -> HashMap<String, HashMap<String, Symbol>> {
        self.scopes
            .iter()
            .map(|(module, scope)| ((*module).to_string(), scope.clone()))
            .collect()
    }
}

fn symbols_of(module: &str, decls: &[Declaration], public_only: bool) -> Vec<(String, Symbol)> {
    decls
        .iter()
        .filter(|d| !public_only || d.visibility() == Visibility::Pub)
        .filter_map(|d| {
            let kind = match d {
                Declaration::Type(_) => SymbolKind::Type,
                Declaration::Fact(_) => SymbolKind::Fact,
                Declaration::Edge(_) => SymbolKind::Edge,
                Declaration::Query(_) => SymbolKind::Query,
                _ => return None,
            };
            let name = d.symbol()?;
            Some((
                name.to_string(),
                Symbol {
                    kind,
                    fq: qualify(module, name),
                },
            ))
        })
        .collect()
}

// =============================================================================
// TypeResolver
// =============================================================================

/// Expands aliases with memoization; a stack of in-progress names catches
/// alias cycles. Without a checker, refinements are skipped.
struct TypeResolver<'r> {
    index: &'r DeclIndex<'r>,
    checker: Option<RefinementChecker<'r>>,
    memo: HashMap<String, Result<ResolvedType>>,
    resolving: Vec<String>,
}

impl<'r> TypeResolver<'r> {
    fn new(index: &'r DeclIndex<'r>, checker: Option<RefinementChecker<'r>>) -> Self {
        Self {
            index,
            checker,
            memo: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    fn resolve_type_decl(&mut self, fq: &str) -> Result<ResolvedType> {
        if let Some(result) = self.memo.get(fq) {
            return result.clone();
        }
        let Some(&(module, decl)) = self.index.types.get(fq) else {
            return Err(Error::unresolved_type(fq));
        };

        if let Some(pos) = self.resolving.iter().position(|n| n == fq) {
            let mut path = self.resolving[pos..].to_vec();
            path.push(fq.to_string());
            return Err(Error::new(ErrorKind::Cycle(path)).with_span(decl.span));
        }

        self.resolving.push(fq.to_string());
        let result = self.resolve_typedef(module, &decl.body, fq);
        self.resolving.pop();
        self.memo.insert(fq.to_string(), result.clone());
        result
    }

    fn resolve_typedef(&mut self, module: &str, def: &TypeDef, owner: &str) -> Result<ResolvedType> {
        match def {
            TypeDef::Annotation(annotation) => self.resolve_annotation(module, annotation),
            TypeDef::Record(fields) => {
                let mut resolved: Vec<(String, Type)> = Vec::with_capacity(fields.len());
                for field in fields {
                    if resolved.iter().any(|(n, _)| *n == field.name) {
                        return Err(Error::duplicate_symbol(format!("{owner}.{}", field.name))
                            .with_span(field.span));
                    }
                    let ty = self.resolve_typedef(module, &field.def, owner)?;
                    resolved.push((field.name.clone(), ty.ty));
                }
                Ok(ResolvedType::plain(Type::Record(resolved)))
            }
        }
    }

    fn resolve_annotation(&mut self, module: &str, annotation: &TypeAnnotation) -> Result<ResolvedType> {
        let mut resolved = self.resolve_ref(module, &annotation.base)?;
        if let (Some(refinement), Some(checker)) = (&annotation.refinement, &self.checker) {
            let predicate = checker.check(refinement, &resolved.ty)?;
            resolved.refinements.push(Arc::new(predicate));
        }
        Ok(resolved)
    }

    fn resolve_ref(&mut self, module: &str, r: &TypeRef) -> Result<ResolvedType> {
        match self.index.lookup(module, &r.name) {
            Some(symbol) => {
                let (kind, fq) = (symbol.kind, symbol.fq.clone());
                match kind {
                    SymbolKind::Type | SymbolKind::Fact if !r.args.is_empty() => {
                        Err(arity_error(r, 0))
                    }
                    SymbolKind::Type => self.resolve_type_decl(&fq),
                    SymbolKind::Fact => Ok(ResolvedType::plain(Type::Fact(fq))),
                    SymbolKind::Edge | SymbolKind::Query => {
                        Err(Error::unresolved_type(&r.name).with_span(r.span))
                    }
                }
            }
            None => self.resolve_builtin(module, r),
        }
    }

    fn resolve_builtin(&mut self, module: &str, r: &TypeRef) -> Result<ResolvedType> {
        let arity = primitive_arity(&r.name)
            .ok_or_else(|| Error::unresolved_type(&r.name).with_span(r.span))?;
        if arity != r.args.len() {
            return Err(arity_error(r, arity));
        }

        let mut args = Vec::with_capacity(r.args.len());
        for arg in &r.args {
            args.push(self.resolve_annotation(module, arg)?);
        }
        let arg_types: Vec<Type> = args.iter().map(|a| a.ty.clone()).collect();
        let ty = primitive_type(&r.name, &arg_types)
            .ok_or_else(|| Error::unresolved_type(&r.name).with_span(r.span))?;

        let mut resolved = ResolvedType::plain(ty);
        if matches!(resolved.ty, Type::List(_)) {
            resolved.element = args.pop().map(Box::new);
        }
        Ok(resolved)
    }

    fn resolve_fact_ref(&mut self, module: &str, r: &TypeRef) -> Result<String> {
        match self.resolve_ref(module, r)?.ty {
            Type::Fact(fq) if self.index.facts.contains(&fq) => Ok(fq),
            other => Err(Error::unresolved_type(format!(
                "{} (edge endpoints must be facts, found {other})",
                r.name
            ))
            .with_span(r.span)),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn qualify(module: &str, name: &str) -> String {
    format!("{module}.{name}")
}

fn arity_error(r: &TypeRef, expected: usize) -> Error {
    Error::new(ErrorKind::Arity {
        name: r.name.clone(),
        expected,
        actual: r.args.len(),
    })
    .with_span(r.span)
}

fn attribute_names(attributes: &[crate::ast::Attribute]) -> Vec<String> {
    attributes.iter().map(|a| a.name.clone()).collect()
}

fn push_unique(diagnostics: &mut Diagnostics, error: Error) {
    if !diagnostics.iter().any(|e| *e == error) {
        diagnostics.push(error);
    }
}

fn push_all(diagnostics: &mut Diagnostics, other: Diagnostics) {
    for error in other {
        push_unique(diagnostics, error);
    }
}

/// The grammar named by the unit. Each module names it at most once, and
/// all modules that name one must agree.
fn check_grammar(registry: &ModuleRegistry, diagnostics: &mut Diagnostics) -> Option<String> {
    let mut unit: Option<(String, String)> = None;
    // Root first so its choice is the one reported as "first".
    for module in registry.modules().iter().rev() {
        let mut named: Option<(&str, Span)> = None;
        for decl in &module.declarations {
            let (grammar, span) = match decl {
                Declaration::SchemaHeader(h) => (h.grammar_ref.as_str(), h.span),
                Declaration::GrammarUse(g) => (g.name.as_str(), g.span),
                _ => continue,
            };
            if let Some((first, _)) = named {
                diagnostics.push(
                    Error::new(ErrorKind::GrammarConflict {
                        first: first.to_string(),
                        second: grammar.to_string(),
                    })
                    .with_span(span),
                );
                continue;
            }
            named = Some((grammar, span));
        }

        if let Some((grammar, span)) = named {
            match &unit {
                Some((first, _)) if first != grammar => diagnostics.push(
                    Error::new(ErrorKind::GrammarConflict {
                        first: first.clone(),
                        second: grammar.to_string(),
                    })
                    .with_span(span),
                ),
                Some(_) => {}
                None => unit = Some((grammar.to_string(), module.name.clone())),
            }
        }
    }
    unit.map(|(grammar, _)| grammar)
}

/// Root module handlers plus public handlers of the other loaded modules,
/// in load order.
fn visible_nodes(registry: &ModuleRegistry) -> Vec<NodeEntry> {
    let root = registry.root().map(|m| m.name.as_str());
    registry
        .modules()
        .iter()
        .flat_map(|module| {
            let is_root = Some(module.name.as_str()) == root;
            module.declarations.iter().filter_map(move |decl| match decl {
                Declaration::Node(node) if is_root || node.vis == Visibility::Pub => Some(NodeEntry {
                    module: module.name.clone(),
                    decl: node.clone(),
                }),
                _ => None,
            })
        })
        .collect()
}
