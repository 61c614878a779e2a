//! Error types for the Planardl system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! Every error carries a kind, an optional source span and an optional
//! context so callers can aggregate many of them into [`Diagnostics`].

use std::fmt;

use thiserror::Error;

use crate::span::Span;
use crate::types::Type;
use crate::value::Value;

/// The main error type for Planardl operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}{}", fmt_span(.span.as_ref()))]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Where in the schema or subject file the error was raised.
    pub span: Option<Span>,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

fn fmt_span(span: Option<&Span>) -> String {
    span.filter(|s| !s.is_synthetic())
        .map(|s| format!(" at {s}"))
        .unwrap_or_default()
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            span: None,
            context: None,
        }
    }

    /// Attaches a source span to this error.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Returns the category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(subject: impl Into<String>, expected: Type, actual: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            subject: subject.into(),
            expected,
            actual,
        })
    }

    /// Creates an unresolved type error.
    #[must_use]
    pub fn unresolved_type(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnresolvedType(name.into()))
    }

    /// Creates an unbound name error.
    #[must_use]
    pub fn unbound_name(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnboundName(name.into()))
    }

    /// Creates an unbound capture error.
    #[must_use]
    pub fn unbound_capture(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnboundCapture(name.into()))
    }

    /// Creates a duplicate symbol error.
    #[must_use]
    pub fn duplicate_symbol(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateSymbol(name.into()))
    }

    /// Creates a failed extern call error.
    #[must_use]
    pub fn extern_call(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternCall {
            name: name.into(),
            message: message.into(),
        })
    }

    /// Creates a semantic limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: SemanticLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }
}

/// Coarse classification of an error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rejects the compilation unit; never yields partial results.
    Static,
    /// Scoped to one emit or match result; the run continues.
    Runtime,
    /// Aborts the whole run.
    Fatal,
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // ==========================================================================
    // Static errors
    // ==========================================================================
    /// A type name has no visible declaration.
    #[error("unresolved type: {0}")]
    UnresolvedType(String),

    /// A generic application supplies the wrong number of arguments.
    #[error("arity mismatch for {name}: expected {expected} type argument(s), got {actual}")]
    Arity {
        /// The applied type constructor.
        name: String,
        /// Arity of the constructor.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },

    /// Alias expansion or module imports do not terminate.
    #[error("cycle detected: {}", join(.0, " -> "))]
    Cycle(Vec<String>),

    /// A refinement predicate is ill-typed.
    #[error("ill-typed refinement `{expr}`: {message}")]
    RefinementType {
        /// The offending sub-expression.
        expr: String,
        /// What is wrong with it.
        message: String,
    },

    /// Two externs share a name and arity.
    #[error("duplicate extern {name}/{arity}")]
    DuplicateExtern {
        /// Full extern name.
        name: String,
        /// Parameter count.
        arity: usize,
    },

    /// No extern accepts the given arguments.
    #[error("no extern `{name}` accepts ({})", join(.args, ", "))]
    NoMatchingExtern {
        /// The called name.
        name: String,
        /// Argument types at the call site.
        args: Vec<Type>,
    },

    /// More than one extern accepts the given arguments.
    #[error("ambiguous call to `{name}`: candidates {}", join(.candidates, ", "))]
    AmbiguousExtern {
        /// The called name.
        name: String,
        /// Full names of the matching signatures.
        candidates: Vec<String>,
    },

    /// A relation, emit or capture refers to an out-of-scope capture.
    #[error("unbound capture: @{0}")]
    UnboundCapture(String),

    /// A value's type disagrees with the declared type.
    #[error("type mismatch for {subject}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// What was being checked (a field, a relation end, ...).
        subject: String,
        /// The expected type.
        expected: Type,
        /// The actual type encountered.
        actual: Type,
    },

    /// The same binding name is reused among siblings.
    #[error("duplicate capture binding: {0}")]
    DuplicateCapture(String),

    /// A name is declared twice in the same scope.
    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    /// A fact constructor names a field the fact does not declare.
    #[error("unknown field `{field}` on fact {fact}")]
    UnknownField {
        /// The constructed fact.
        fact: String,
        /// The unknown field.
        field: String,
    },

    /// A match block refers to an undeclared query.
    #[error("unknown query: {0}")]
    UnknownQuery(String),

    /// An import names a module the resolver cannot provide.
    #[error("unresolved module: {0}")]
    UnresolvedModule(String),

    /// A unit names its grammar more than once.
    #[error("conflicting grammar declarations: {first} and {second}")]
    GrammarConflict {
        /// The grammar named first.
        first: String,
        /// The conflicting grammar name.
        second: String,
    },

    // ==========================================================================
    // Runtime match errors
    // ==========================================================================
    /// An expression references a name that is not bound.
    #[error("unbound name: {0}")]
    UnboundName(String),

    /// Integer division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A host function failed.
    #[error("extern `{name}` failed: {message}")]
    ExternCall {
        /// Full extern name.
        name: String,
        /// Failure reported by the host.
        message: String,
    },

    /// A node's text cannot be converted to the declared scalar type.
    #[error("cannot convert {text:?} to {target}")]
    ValueConversion {
        /// Source text of the node.
        text: String,
        /// The declared field type.
        target: Type,
    },

    /// A concrete value violates a refinement of its declared type.
    #[error("refinement violated for {fact}.{field}: {value} does not satisfy `{predicate}`")]
    RefinementViolation {
        /// The fact being emitted.
        fact: String,
        /// The offending field.
        field: String,
        /// The rejected value.
        value: Value,
        /// The violated predicate.
        predicate: String,
    },

    // ==========================================================================
    // Fatal errors
    // ==========================================================================
    /// A used extern has no host implementation.
    #[error("unbound extern {name}/{arity}: no host function registered")]
    UnboundExtern {
        /// Full extern name.
        name: String,
        /// Parameter count.
        arity: usize,
    },

    /// Semantic limit exceeded (kill switch triggered).
    #[error("limit exceeded: {0}")]
    LimitExceeded(SemanticLimit),

    /// No parser is registered for the grammar.
    #[error("unknown grammar: {0}")]
    UnknownGrammar(String),

    /// The grammar parser rejected a subject file or query.
    #[error("parse error: {0}")]
    Parse(String),

    /// Encoding a fact graph failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Reading or writing failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// Classifies this kind.
    ///
    /// `UnboundName` is a runtime kind; when the compiler reports it for a
    /// `let` expression it arrives inside a rejected unit's diagnostics.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::UnresolvedType(_)
            | Self::Arity { .. }
            | Self::Cycle(_)
            | Self::RefinementType { .. }
            | Self::DuplicateExtern { .. }
            | Self::NoMatchingExtern { .. }
            | Self::AmbiguousExtern { .. }
            | Self::UnboundCapture(_)
            | Self::TypeMismatch { .. }
            | Self::DuplicateCapture(_)
            | Self::DuplicateSymbol(_)
            | Self::UnknownField { .. }
            | Self::UnknownQuery(_)
            | Self::UnresolvedModule(_)
            | Self::GrammarConflict { .. } => ErrorCategory::Static,

            Self::UnboundName(_)
            | Self::DivisionByZero
            | Self::ExternCall { .. }
            | Self::ValueConversion { .. }
            | Self::RefinementViolation { .. } => ErrorCategory::Runtime,

            Self::UnboundExtern { .. }
            | Self::LimitExceeded(_)
            | Self::UnknownGrammar(_)
            | Self::Parse(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::Internal(_) => ErrorCategory::Fatal,
        }
    }
}

/// Semantic limits (kill switches) that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticLimit {
    /// Maximum facts emitted by one run exceeded.
    MaxFacts {
        /// The configured limit.
        limit: usize,
    },
}

impl fmt::Display for SemanticLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxFacts { limit } => write!(f, "max facts ({limit}) exceeded"),
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Module or subject file name.
    pub source: Option<String>,
    /// Enclosing declarations, outermost first (node kind, capture, ...).
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source name.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "in {source}")?;
        }
        for frame in &self.stack {
            write!(f, " > {frame}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// An ordered collection of errors gathered by one compilation or run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    errors: Vec<Error>,
}

impl Diagnostics {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error.
    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Records every error of another collection.
    pub fn append(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
    }

    /// Records the error of a failed result and returns its value otherwise.
    pub fn record<T>(&mut self, result: Result<T, Error>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.push(e);
                None
            }
        }
    }

    /// Returns the number of recorded errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Forgets every error recorded after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.errors.truncate(len);
    }

    /// Returns an iterator over the recorded errors.
    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    /// Returns true if any recorded error has the given category.
    #[must_use]
    pub fn has(&self, category: ErrorCategory) -> bool {
        self.errors.iter().any(|e| e.category() == category)
    }

    /// Returns the recorded errors.
    #[must_use]
    pub fn into_vec(self) -> Vec<Error> {
        self.errors
    }

    /// Returns `value` if nothing was recorded, otherwise the diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Diagnostics> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl From<Error> for Diagnostics {
    fn from(error: Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl Extend<Error> for Diagnostics {
    fn extend<I: IntoIterator<Item = Error>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  {error}")?;
            if let Some(ctx) = &error.context {
                write!(f, " ({ctx})")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}
