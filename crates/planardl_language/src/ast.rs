//! Declaration and expression trees for Planardl modules.
//!
//! The AST is the input of the compiler: whatever front end reads Planardl
//! source produces these trees. Every category is a closed enum so each
//! compiler stage handles every case exhaustively.
//!
//! Constructors default spans to [`Span::default`]; front ends attach real
//! positions with the `at` methods.

use std::fmt;

use planardl_foundation::Span;

// =============================================================================
// Modules and declarations
// =============================================================================

/// Declaration visibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Visible only inside the declaring module.
    #[default]
    Private,
    /// Visible to importing modules.
    Pub,
}

/// An attribute such as `#builtin`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name without the `#`.
    pub name: String,
    /// Source span.
    pub span: Span,
}

impl Attribute {
    /// Creates an attribute.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: Span::default(),
        }
    }
}

/// Returns true if `attributes` contains one named `name`.
#[must_use]
pub fn has_attribute(attributes: &[Attribute], name: &str) -> bool {
    attributes.iter().any(|a| a.name == name)
}

/// A compilation unit: a fully-qualified name plus ordered declarations.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    /// Fully-qualified module name (e.g. `compose.services`).
    pub name: String,
    /// Declarations in source order.
    pub declarations: Vec<Declaration>,
}

impl Module {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declarations: Vec::new(),
        }
    }

    /// Appends a declaration.
    #[must_use]
    pub fn with(mut self, declaration: impl Into<Declaration>) -> Self {
        self.declarations.push(declaration.into());
        self
    }

    /// Names of the modules this module imports, in order.
    pub fn imports(&self) -> impl Iterator<Item = &str> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Import(import) => Some(import.module.as_str()),
            _ => None,
        })
    }
}

/// A top-level declaration.
#[derive(Clone, Debug, PartialEq)]
pub enum Declaration {
    /// `schema NAME grammar = "ref"`
    SchemaHeader(SchemaHeader),
    /// `import fqmn`
    Import(Import),
    /// `using fqmn`
    GrammarUse(GrammarUse),
    /// `type Name = ...`
    Type(TypeDecl),
    /// `fact Name { ... }`
    Fact(FactDecl),
    /// `node kind { match ... }`
    Node(NodeDecl),
    /// `edge name = From -> To : kind`
    Edge(EdgeDecl),
    /// `query name = `...``
    Query(QueryDecl),
    /// `extern module { ... }`
    Extern(ExternDecl),
}

impl Declaration {
    /// Returns the source span of this declaration.
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::SchemaHeader(d) => d.span,
            Self::Import(d) => d.span,
            Self::GrammarUse(d) => d.span,
            Self::Type(d) => d.span,
            Self::Fact(d) => d.span,
            Self::Node(d) => d.span,
            Self::Edge(d) => d.span,
            Self::Query(d) => d.span,
            Self::Extern(d) => d.span,
        }
    }

    /// Returns the symbol this declaration introduces, if any.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Type(d) => Some(&d.name),
            Self::Fact(d) => Some(&d.name),
            Self::Edge(d) => Some(&d.name),
            Self::Query(d) => Some(&d.name),
            Self::SchemaHeader(_)
            | Self::Import(_)
            | Self::GrammarUse(_)
            | Self::Node(_)
            | Self::Extern(_) => None,
        }
    }

    /// Returns the visibility of this declaration.
    #[must_use]
    pub const fn visibility(&self) -> Visibility {
        match self {
            Self::Type(d) => d.vis,
            Self::Fact(d) => d.vis,
            Self::Node(d) => d.vis,
            Self::Edge(d) => d.vis,
            Self::Query(d) => d.vis,
            Self::Extern(d) => d.vis,
            Self::SchemaHeader(_) | Self::Import(_) | Self::GrammarUse(_) => Visibility::Private,
        }
    }
}

macro_rules! impl_into_declaration {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Declaration {
                fn from(d: $ty) -> Self {
                    Self::$variant(d)
                }
            }
        )*
    };
}

impl_into_declaration!(
    SchemaHeader(SchemaHeader),
    Import(Import),
    GrammarUse(GrammarUse),
    Type(TypeDecl),
    Fact(FactDecl),
    Node(NodeDecl),
    Edge(EdgeDecl),
    Query(QueryDecl),
    Extern(ExternDecl),
);

/// Schema header naming the external grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaHeader {
    /// Schema name.
    pub name: String,
    /// Grammar reference.
    pub grammar_ref: String,
    /// Source span.
    pub span: Span,
}

impl SchemaHeader {
    /// Creates a schema header.
    pub fn new(name: impl Into<String>, grammar_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grammar_ref: grammar_ref.into(),
            span: Span::default(),
        }
    }
}

/// Import of another module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    /// Fully-qualified module name.
    pub module: String,
    /// Source span.
    pub span: Span,
}

impl Import {
    /// Creates an import.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            span: Span::default(),
        }
    }
}

/// `using` declaration naming the external grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarUse {
    /// Grammar name.
    pub name: String,
    /// Source span.
    pub span: Span,
}

impl GrammarUse {
    /// Creates a grammar use.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: Span::default(),
        }
    }
}

// =============================================================================
// Types
// =============================================================================

/// A type alias or record type declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDecl {
    /// Declared name.
    pub name: String,
    /// Visibility.
    pub vis: Visibility,
    /// Definition.
    pub body: TypeDef,
    /// Attributes.
    pub attributes: Vec<Attribute>,
    /// Source span.
    pub span: Span,
}

impl TypeDecl {
    /// Creates a private type declaration.
    pub fn new(name: impl Into<String>, body: impl Into<TypeDef>) -> Self {
        Self {
            name: name.into(),
            vis: Visibility::Private,
            body: body.into(),
            attributes: Vec::new(),
            span: Span::default(),
        }
    }

    /// Makes the declaration public.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.vis = Visibility::Pub;
        self
    }

    /// Sets the source span.
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Body of a type declaration.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDef {
    /// Alias of an annotated type.
    Annotation(TypeAnnotation),
    /// Nested anonymous record.
    Record(Vec<RecordField>),
}

impl From<TypeAnnotation> for TypeDef {
    fn from(a: TypeAnnotation) -> Self {
        Self::Annotation(a)
    }
}

impl From<TypeRef> for TypeDef {
    fn from(r: TypeRef) -> Self {
        Self::Annotation(r.into())
    }
}

/// A field of a record type.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordField {
    /// Field name.
    pub name: String,
    /// Field definition.
    pub def: TypeDef,
    /// Source span.
    pub span: Span,
}

impl RecordField {
    /// Creates a record field.
    pub fn new(name: impl Into<String>, def: impl Into<TypeDef>) -> Self {
        Self {
            name: name.into(),
            def: def.into(),
            span: Span::default(),
        }
    }
}

/// A type reference with an optional refinement: `Int | > 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeAnnotation {
    /// The referenced type.
    pub base: TypeRef,
    /// Predicate over `it`.
    pub refinement: Option<Expr>,
    /// Source span.
    pub span: Span,
}

impl TypeAnnotation {
    /// Attaches a refinement predicate.
    #[must_use]
    pub fn refined(mut self, predicate: Expr) -> Self {
        self.refinement = Some(predicate);
        self
    }
}

impl From<TypeRef> for TypeAnnotation {
    fn from(base: TypeRef) -> Self {
        let span = base.span;
        Self {
            base,
            refinement: None,
            span,
        }
    }
}

/// A fully-qualified type name, optionally applied to type arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeRef {
    /// Fully-qualified name.
    pub name: String,
    /// Generic arguments.
    pub args: Vec<TypeAnnotation>,
    /// Source span.
    pub span: Span,
}

impl TypeRef {
    /// Creates a reference without arguments.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            span: Span::default(),
        }
    }

    /// Creates a generic application.
    pub fn apply(name: impl Into<String>, args: Vec<TypeAnnotation>) -> Self {
        Self {
            name: name.into(),
            args,
            span: Span::default(),
        }
    }

    /// Wraps this reference in an annotation with a refinement.
    #[must_use]
    pub fn refined(self, predicate: Expr) -> TypeAnnotation {
        TypeAnnotation::from(self).refined(predicate)
    }

    /// Sets the source span.
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg.base)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

// =============================================================================
// Facts and edges
// =============================================================================

/// A closed record shape for emitted facts.
#[derive(Clone, Debug, PartialEq)]
pub struct FactDecl {
    /// Declared name.
    pub name: String,
    /// Visibility.
    pub vis: Visibility,
    /// Fields in declaration order.
    pub fields: Vec<FactField>,
    /// Attributes.
    pub attributes: Vec<Attribute>,
    /// Source span.
    pub span: Span,
}

impl FactDecl {
    /// Creates a private fact without fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vis: Visibility::Private,
            fields: Vec::new(),
            attributes: Vec::new(),
            span: Span::default(),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: impl Into<TypeAnnotation>) -> Self {
        self.fields.push(FactField {
            name: name.into(),
            ty: ty.into(),
            attributes: Vec::new(),
            span: Span::default(),
        });
        self
    }

    /// Makes the declaration public.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.vis = Visibility::Pub;
        self
    }

    /// Sets the source span.
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// A field of a fact.
#[derive(Clone, Debug, PartialEq)]
pub struct FactField {
    /// Field name.
    pub name: String,
    /// Declared type.
    pub ty: TypeAnnotation,
    /// Attributes.
    pub attributes: Vec<Attribute>,
    /// Source span.
    pub span: Span,
}

/// A declared relation between two fact types.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeDecl {
    /// Declared name.
    pub name: String,
    /// Visibility.
    pub vis: Visibility,
    /// Source fact type.
    pub from: TypeRef,
    /// Target fact type.
    pub to: TypeRef,
    /// Kind tag used by named relations.
    pub relation_kind: String,
    /// Source span.
    pub span: Span,
}

impl EdgeDecl {
    /// Creates a private edge declaration.
    pub fn new(
        name: impl Into<String>,
        from: TypeRef,
        to: TypeRef,
        relation_kind: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vis: Visibility::Private,
            from,
            to,
            relation_kind: relation_kind.into(),
            span: Span::default(),
        }
    }
}

// =============================================================================
// Queries and node handlers
// =============================================================================

/// A named structural query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryDecl {
    /// Declared name.
    pub name: String,
    /// Visibility.
    pub vis: Visibility,
    /// Raw query text for the external grammar.
    pub literal: String,
    /// Source span.
    pub span: Span,
}

impl QueryDecl {
    /// Creates a private query.
    pub fn new(name: impl Into<String>, literal: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vis: Visibility::Private,
            literal: literal.into(),
            span: Span::default(),
        }
    }

    /// Makes the query visible to importing modules.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.vis = Visibility::Pub;
        self
    }
}

/// Handlers for one syntax node kind.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDecl {
    /// Node kind, e.g. `docker_compose.service`.
    pub kind: String,
    /// Visibility.
    pub vis: Visibility,
    /// Match blocks in declaration order.
    pub matches: Vec<MatchBlock>,
    /// Queries visible only to this node's match blocks.
    pub queries: Vec<QueryDecl>,
    /// Source span.
    pub span: Span,
}

impl NodeDecl {
    /// Creates a private node handler without match blocks.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            vis: Visibility::Private,
            matches: Vec::new(),
            queries: Vec::new(),
            span: Span::default(),
        }
    }

    /// Appends a match block.
    #[must_use]
    pub fn with_match(mut self, block: MatchBlock) -> Self {
        self.matches.push(block);
        self
    }

    /// Appends a node-local query.
    #[must_use]
    pub fn with_query(mut self, query: QueryDecl) -> Self {
        self.queries.push(query);
        self
    }
}

/// How a match block names its query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryRef {
    /// Inline raw query text.
    Literal(String),
    /// Reference to a declared query.
    Named(String),
}

/// `match <query> { @cap { ... } ... }`
#[derive(Clone, Debug, PartialEq)]
pub struct MatchBlock {
    /// The query to run.
    pub query: QueryRef,
    /// Top-level captures.
    pub captures: Vec<Capture>,
    /// Source span.
    pub span: Span,
}

impl MatchBlock {
    /// Creates a match block over a raw query.
    pub fn literal(query: impl Into<String>) -> Self {
        Self {
            query: QueryRef::Literal(query.into()),
            captures: Vec::new(),
            span: Span::default(),
        }
    }

    /// Creates a match block over a named query.
    pub fn named(query: impl Into<String>) -> Self {
        Self {
            query: QueryRef::Named(query.into()),
            captures: Vec::new(),
            span: Span::default(),
        }
    }

    /// Appends a top-level capture.
    #[must_use]
    pub fn capture(mut self, capture: Capture) -> Self {
        self.captures.push(capture);
        self
    }
}

/// `@name { ... }`: statements executed with `@name` bound.
#[derive(Clone, Debug, PartialEq)]
pub struct Capture {
    /// Capture name without the `@`.
    pub binding: String,
    /// Statements in declaration order.
    pub body: Vec<CaptureStmt>,
    /// Source span.
    pub span: Span,
}

impl Capture {
    /// Creates a capture with an empty body.
    pub fn new(binding: impl Into<String>) -> Self {
        Self {
            binding: binding.into(),
            body: Vec::new(),
            span: Span::default(),
        }
    }

    /// Appends a statement.
    #[must_use]
    pub fn with(mut self, stmt: impl Into<CaptureStmt>) -> Self {
        self.body.push(stmt.into());
        self
    }

    /// Sets the source span.
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// A statement inside a capture body.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureStmt {
    /// Nested capture.
    Capture(Capture),
    /// `let name = expr`
    Let(LetBinding),
    /// `emit ...`
    Emit(Emit),
}

impl From<Capture> for CaptureStmt {
    fn from(c: Capture) -> Self {
        Self::Capture(c)
    }
}

impl From<LetBinding> for CaptureStmt {
    fn from(l: LetBinding) -> Self {
        Self::Let(l)
    }
}

impl From<Emit> for CaptureStmt {
    fn from(e: Emit) -> Self {
        Self::Emit(e)
    }
}

/// `let name = expr`
#[derive(Clone, Debug, PartialEq)]
pub struct LetBinding {
    /// Bound name.
    pub name: String,
    /// Value expression.
    pub expr: Expr,
    /// Source span.
    pub span: Span,
}

impl LetBinding {
    /// Creates a let binding.
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
            span: Span::default(),
        }
    }
}

/// `emit Left` or `emit Left <relation> Right`
#[derive(Clone, Debug, PartialEq)]
pub struct Emit {
    /// Left operand.
    pub left: EmitOperand,
    /// Optional relation to a right operand.
    pub edge: Option<EmitEdge>,
    /// Source span.
    pub span: Span,
}

impl Emit {
    /// Emits a single operand without a relation.
    #[must_use]
    pub fn single(left: EmitOperand) -> Self {
        Self {
            left,
            edge: None,
            span: Span::default(),
        }
    }

    /// Emits two operands connected by a relation.
    #[must_use]
    pub fn related(left: EmitOperand, relation: Relation, right: EmitOperand) -> Self {
        Self {
            left,
            edge: Some(EmitEdge { relation, right }),
            span: Span::default(),
        }
    }

    /// Sets the source span.
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Relation and right operand of an emit.
#[derive(Clone, Debug, PartialEq)]
pub struct EmitEdge {
    /// Relation between the operands.
    pub relation: Relation,
    /// Right operand.
    pub right: EmitOperand,
}

/// One side of an emit.
#[derive(Clone, Debug, PartialEq)]
pub enum EmitOperand {
    /// A freshly constructed fact.
    Construct(FactConstructor),
    /// A capture (`@s`) or `let` name whose associated fact is used.
    Reference {
        /// Referenced name (captures without the `@`).
        name: String,
        /// Source span.
        span: Span,
    },
}

impl EmitOperand {
    /// Creates a reference operand.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference {
            name: name.into(),
            span: Span::default(),
        }
    }

    /// Returns the source span of this operand.
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Construct(c) => c.span,
            Self::Reference { span, .. } => *span,
        }
    }
}

impl From<FactConstructor> for EmitOperand {
    fn from(c: FactConstructor) -> Self {
        Self::Construct(c)
    }
}

/// `Fact { field: expr, ... }`
#[derive(Clone, Debug, PartialEq)]
pub struct FactConstructor {
    /// Name of the constructed fact.
    pub fact: String,
    /// Field assignments in source order.
    pub fields: Vec<FieldAssign>,
    /// Source span.
    pub span: Span,
}

impl FactConstructor {
    /// Creates a constructor without assignments.
    pub fn new(fact: impl Into<String>) -> Self {
        Self {
            fact: fact.into(),
            fields: Vec::new(),
            span: Span::default(),
        }
    }

    /// Appends a field assignment.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: Expr) -> Self {
        self.fields.push(FieldAssign {
            name: name.into(),
            value,
            span: Span::default(),
        });
        self
    }
}

/// `field: expr`
#[derive(Clone, Debug, PartialEq)]
pub struct FieldAssign {
    /// Field name.
    pub name: String,
    /// Value expression.
    pub value: Expr,
    /// Source span.
    pub span: Span,
}

/// Direction of a relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `->`
    Forward,
    /// `<-`
    Backward,
    /// `<->`
    Both,
}

/// `->`, `<-`, `<->` or a named `-[kind]->` form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    /// Direction of the edge(s).
    pub direction: Direction,
    /// Kind tag of a named relation.
    pub kind: Option<String>,
    /// Source span.
    pub span: Span,
}

impl Relation {
    /// Creates an unnamed relation.
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            kind: None,
            span: Span::default(),
        }
    }

    /// Creates a named relation.
    pub fn named(direction: Direction, kind: impl Into<String>) -> Self {
        Self {
            direction,
            kind: Some(kind.into()),
            span: Span::default(),
        }
    }
}

// =============================================================================
// Externs
// =============================================================================

/// A block of extern function signatures.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternDecl {
    /// Namespace of the block; defaults to the declaring module.
    pub module: Option<String>,
    /// Attributes (`#builtin` registers bare names).
    pub attributes: Vec<Attribute>,
    /// Visibility.
    pub vis: Visibility,
    /// Signatures.
    pub functions: Vec<ExternFn>,
    /// Source span.
    pub span: Span,
}

impl ExternDecl {
    /// Creates an empty extern block.
    #[must_use]
    pub fn new(module: Option<String>) -> Self {
        Self {
            module,
            attributes: Vec::new(),
            vis: Visibility::Private,
            functions: Vec::new(),
            span: Span::default(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: &str) -> Self {
        self.attributes.push(Attribute::new(name));
        self
    }

    /// Appends a signature.
    #[must_use]
    pub fn function(mut self, function: ExternFn) -> Self {
        self.functions.push(function);
        self
    }

    /// Returns true for `#builtin` blocks.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        has_attribute(&self.attributes, "builtin")
    }
}

/// Name of an extern function.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExternName {
    /// A plain identifier.
    Ident(String),
    /// `operator <symbol>`
    Operator(String),
}

impl ExternName {
    /// Returns the identifier or operator symbol.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ident(s) | Self::Operator(s) => s,
        }
    }
}

/// A parameter of an extern function.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternParam {
    /// Parameter name.
    pub name: String,
    /// Parameter type.
    pub ty: TypeRef,
}

/// `name :: a: T, b: U -> R?`
#[derive(Clone, Debug, PartialEq)]
pub struct ExternFn {
    /// Function name or operator symbol.
    pub name: ExternName,
    /// Parameters in order.
    pub params: Vec<ExternParam>,
    /// Return type; `None` declares a predicate returning `Bool`.
    pub return_type: Option<TypeRef>,
    /// Whether the host may return nil.
    pub nullable_return: bool,
    /// Source span.
    pub span: Span,
}

impl ExternFn {
    /// Creates a function signature without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_name(ExternName::Ident(name.into()))
    }

    /// Creates an operator overload signature.
    pub fn operator(symbol: impl Into<String>) -> Self {
        Self::with_name(ExternName::Operator(symbol.into()))
    }

    fn with_name(name: ExternName) -> Self {
        Self {
            name,
            params: Vec::new(),
            return_type: None,
            nullable_return: false,
            span: Span::default(),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.params.push(ExternParam {
            name: name.into(),
            ty: TypeRef::named(ty),
        });
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.return_type = Some(TypeRef::named(ty));
        self
    }

    /// Marks the return value nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable_return = true;
        self
    }
}

// =============================================================================
// Expressions
// =============================================================================

/// Binary operators.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
    /// Any other symbol; only meaningful through an extern overload.
    Custom(String),
}

impl BinaryOp {
    /// Returns the operator symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Custom(s) => s,
        }
    }

    /// Parses an operator symbol.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "&&" => Self::And,
            "||" => Self::Or,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Returns true for `+ - * / %`.
    #[must_use]
    pub const fn is_arithmetic(&self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem)
    }

    /// Returns true for `< <= > >=`.
    #[must_use]
    pub const fn is_ordering(&self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    /// Returns true for `== !=`.
    #[must_use]
    pub const fn is_equality(&self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }

    /// Returns true for `&& ||`.
    #[must_use]
    pub const fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The set of a membership test.
#[derive(Clone, Debug, PartialEq)]
pub enum MembershipSet {
    /// `start..end`, `start..=end` or `start..`
    Range {
        /// Inclusive lower bound.
        start: Box<Expr>,
        /// Upper bound; `None` is unbounded.
        end: Option<Box<Expr>>,
        /// Whether `end` itself is included.
        inclusive: bool,
    },
    /// `[a, b, c]`
    List(Vec<Expr>),
}

/// An expression with its source span.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// The expression.
    pub kind: ExprKind,
    /// Source span.
    pub span: Span,
}

/// Expression forms shared by refinements, `let` and field values.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// The refined value.
    It,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    String(String),
    /// List literal.
    List(Vec<Expr>),
    /// A `let` name or a fully-qualified name.
    Name(String),
    /// `@name.path.to.child`
    Capture {
        /// Capture name without the `@`.
        name: String,
        /// Child field path.
        path: Vec<String>,
    },
    /// `left op right`
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Operator section `op right`, meaning `it op right`.
    Section {
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `function(args...)`
    Call {
        /// Called name, possibly qualified.
        function: String,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `subject in [set]`; a missing subject is `it`.
    In {
        /// Tested value.
        subject: Option<Box<Expr>>,
        /// Range or list.
        set: MembershipSet,
    },
}

impl Expr {
    /// Creates an expression with a default span.
    #[must_use]
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    /// Sets the source span.
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// `it`
    #[must_use]
    pub fn it() -> Self {
        Self::new(ExprKind::It)
    }

    /// Boolean literal.
    #[must_use]
    pub fn bool(b: bool) -> Self {
        Self::new(ExprKind::Bool(b))
    }

    /// Integer literal.
    #[must_use]
    pub fn int(n: i64) -> Self {
        Self::new(ExprKind::Int(n))
    }

    /// Float literal.
    #[must_use]
    pub fn float(n: f64) -> Self {
        Self::new(ExprKind::Float(n))
    }

    /// String literal.
    pub fn string(s: impl Into<String>) -> Self {
        Self::new(ExprKind::String(s.into()))
    }

    /// Name reference.
    pub fn name(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Name(name.into()))
    }

    /// Capture reference with a child path.
    pub fn capture(name: impl Into<String>, path: &[&str]) -> Self {
        Self::new(ExprKind::Capture {
            name: name.into(),
            path: path.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    /// Binary operation.
    #[must_use]
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Operator section over `it`.
    #[must_use]
    pub fn section(op: BinaryOp, right: Expr) -> Self {
        Self::new(ExprKind::Section {
            op,
            right: Box::new(right),
        })
    }

    /// Function call.
    pub fn call(function: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            function: function.into(),
            args,
        })
    }

    /// `in [start..end]` over `it`.
    #[must_use]
    pub fn in_range(start: Expr, end: Option<Expr>, inclusive: bool) -> Self {
        Self::new(ExprKind::In {
            subject: None,
            set: MembershipSet::Range {
                start: Box::new(start),
                end: end.map(Box::new),
                inclusive,
            },
        })
    }

    /// `in [items]` over `it`.
    #[must_use]
    pub fn in_list(items: Vec<Expr>) -> Self {
        Self::new(ExprKind::In {
            subject: None,
            set: MembershipSet::List(items),
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::It => write!(f, "it"),
            ExprKind::Bool(b) => write!(f, "{b}"),
            ExprKind::Int(n) => write!(f, "{n}"),
            ExprKind::Float(n) => write!(f, "{n}"),
            ExprKind::String(s) => write!(f, "{s:?}"),
            ExprKind::List(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            ExprKind::Name(name) => write!(f, "{name}"),
            ExprKind::Capture { name, path } => {
                write!(f, "@{name}")?;
                for segment in path {
                    write!(f, ".{segment}")?;
                }
                Ok(())
            }
            ExprKind::Binary { op, left, right } => write!(f, "{left} {op} {right}"),
            ExprKind::Section { op, right } => write!(f, "{op} {right}"),
            ExprKind::Call { function, args } => {
                write!(f, "{function}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::In { subject, set } => {
                if let Some(subject) = subject {
                    write!(f, "{subject} ")?;
                }
                write!(f, "in [")?;
                match set {
                    MembershipSet::Range {
                        start,
                        end,
                        inclusive,
                    } => {
                        write!(f, "{start}..")?;
                        if *inclusive {
                            write!(f, "=")?;
                        }
                        if let Some(end) = end {
                            write!(f, "{end}")?;
                        }
                    }
                    MembershipSet::List(items) => write_list(f, items)?,
                }
                write!(f, "]")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
