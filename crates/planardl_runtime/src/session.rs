//! Compilation sessions.
//!
//! A [`Session`] owns everything a host needs to go from declarations to
//! fact graphs: a module resolver, grammar parsers, host functions and the
//! configuration. Compiled units are immutable and shared through `Arc`, so
//! one unit can be matched against many files in parallel.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use planardl_engine::{GrammarParser, HostFunctions, MatchCompiler, MatchEngine, MatchOutcome, PlanSet};
use planardl_foundation::{Diagnostics, Error, ErrorContext, ErrorKind, Result, Value};
use planardl_graph::FactSink;
use planardl_language::ast::Module;
use planardl_language::{ModuleLoader, ModuleResolver, SymbolTable};
use planardl_stdlib::{builtin_externs, builtin_host};
use rayon::prelude::*;
use tracing::debug;

use crate::config::SessionConfig;
use crate::grammar::GrammarRegistry;

// =============================================================================
// Units and subjects
// =============================================================================

/// The checked, compiled form of one root module and its imports.
#[derive(Clone, Debug)]
pub struct CompiledUnit {
    name: String,
    table: Arc<SymbolTable>,
    plans: Arc<PlanSet>,
}

impl CompiledUnit {
    /// Name of the root module.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The grammar the unit's handlers match against.
    #[must_use]
    pub fn grammar(&self) -> Option<&str> {
        self.table.grammar()
    }

    /// Resolved declarations.
    #[must_use]
    pub fn table(&self) -> &Arc<SymbolTable> {
        &self.table
    }

    /// Compiled node handlers.
    #[must_use]
    pub fn plans(&self) -> &Arc<PlanSet> {
        &self.plans
    }
}

/// A subject file to match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectFile {
    /// Display name, usually the path.
    pub name: String,
    /// Full source text.
    pub source: String,
}

impl SubjectFile {
    /// Creates a subject from text already in memory.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Reads a subject from disk.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error if the file cannot be read.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::new(ErrorKind::Io(format!(
                "failed to read file '{}': {e}",
                path.display()
            )))
        })?;
        Ok(Self::new(path.display().to_string(), source))
    }
}

// =============================================================================
// Session
// =============================================================================

/// Compiles units and runs them over subject files.
pub struct Session {
    resolver: Arc<dyn ModuleResolver>,
    grammars: GrammarRegistry,
    host: Arc<HostFunctions>,
    config: SessionConfig,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Session {
    /// Creates a session with the builtin host functions and default
    /// configuration.
    pub fn new(resolver: impl ModuleResolver + 'static) -> Self {
        Self {
            resolver: Arc::new(resolver),
            grammars: GrammarRegistry::new(),
            host: Arc::new(builtin_host()),
            config: SessionConfig::default(),
            pool: None,
        }
    }

    /// Applies a configuration, creating a worker pool if it asks for a
    /// fixed number of workers.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the worker pool cannot be created.
    pub fn with_config(mut self, config: SessionConfig) -> Result<Self> {
        self.pool = match config.parallelism {
            Some(workers) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| Error::internal(format!("failed to start workers: {e}")))?,
            )),
            None => None,
        };
        self.config = config;
        Ok(self)
    }

    /// Registers a grammar parser (builder form).
    #[must_use]
    pub fn with_grammar(mut self, name: impl Into<String>, parser: impl GrammarParser + 'static) -> Self {
        self.grammars.register(name, parser);
        self
    }

    /// Adds a host implementation for an extern (builder form).
    #[must_use]
    pub fn with_extern<F>(mut self, name: &str, arity: usize, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.host).register(planardl_language::ExternKey::new(name, arity), function);
        self
    }

    /// Replaces the host function table, builtins included.
    #[must_use]
    pub fn with_host(mut self, host: HostFunctions) -> Self {
        self.host = Arc::new(host);
        self
    }

    /// The grammar parsers.
    #[must_use]
    pub fn grammars(&self) -> &GrammarRegistry {
        &self.grammars
    }

    /// Mutable access to the grammar parsers.
    pub fn grammars_mut(&mut self) -> &mut GrammarRegistry {
        &mut self.grammars
    }

    /// The host function table.
    #[must_use]
    pub fn host(&self) -> &Arc<HostFunctions> {
        &self.host
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn in_pool<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    // -------------------------------------------------------------------------
    // Compilation
    // -------------------------------------------------------------------------

    /// Loads, resolves, checks and compiles `root` and its imports.
    ///
    /// # Errors
    ///
    /// Returns every static error found. Later phases only run when the
    /// earlier ones succeeded.
    pub fn compile(&self, root: Module) -> std::result::Result<CompiledUnit, Diagnostics> {
        let name = root.name.clone();
        let root = if self.config.builtins {
            root.with(builtin_externs())
        } else {
            root
        };

        let registry = ModuleLoader::new(&*self.resolver).load(root)?;
        let table = SymbolTable::build(&registry)?;
        let plans = MatchCompiler::new(&table).compile()?;

        debug!(
            unit = %name,
            modules = registry.modules().len(),
            matchers = plans.len(),
            "unit compiled"
        );
        Ok(CompiledUnit {
            name,
            table: Arc::new(table),
            plans: Arc::new(plans),
        })
    }

    /// Compiles independent units in parallel. Results are in input order.
    pub fn compile_all(
        &self,
        roots: Vec<Module>,
    ) -> Vec<std::result::Result<CompiledUnit, Diagnostics>> {
        self.in_pool(|| roots.into_par_iter().map(|root| self.compile(root)).collect())
    }

    // -------------------------------------------------------------------------
    // Matching
    // -------------------------------------------------------------------------

    /// Creates an engine for `unit` with this session's host functions.
    ///
    /// # Errors
    ///
    /// Returns `UnboundExtern` if a used extern has no host implementation.
    pub fn engine(&self, unit: &CompiledUnit) -> Result<MatchEngine> {
        MatchEngine::new(
            Arc::clone(&unit.plans),
            Arc::clone(&self.host),
            self.config.engine.clone(),
        )
    }

    fn parser(&self, unit: &CompiledUnit) -> Result<&Arc<dyn GrammarParser>> {
        let grammar = unit.grammar().ok_or_else(|| {
            Error::new(ErrorKind::UnknownGrammar(String::new()))
                .with_context(ErrorContext::new().with_source(unit.name()))
        })?;
        self.grammars.get(grammar)
    }

    /// Parses and matches one subject.
    ///
    /// # Errors
    ///
    /// Returns fatal errors: an unknown grammar, an unbound extern, a parse
    /// failure or an exceeded limit.
    pub fn run_source(&self, unit: &CompiledUnit, source: &str) -> Result<MatchOutcome> {
        let parser = self.parser(unit)?;
        let engine = self.engine(unit)?;
        let tree = parser.parse(source)?;
        engine.run(&*tree)
    }

    /// Parses and matches many subjects in parallel, each into its own
    /// graph. Results are in input order.
    ///
    /// # Errors
    ///
    /// Returns errors that prevent any file from running (unknown grammar,
    /// unbound extern). Per-file fatal errors are returned in place of that
    /// file's outcome.
    pub fn run_files(
        &self,
        unit: &CompiledUnit,
        files: &[SubjectFile],
    ) -> Result<Vec<Result<MatchOutcome>>> {
        let parser = self.parser(unit)?;
        let engine = self.engine(unit)?;

        let outcomes: Vec<Result<MatchOutcome>> = self.in_pool(|| {
            files
                .par_iter()
                .map(|file| {
                    parser
                        .parse(&file.source)
                        .and_then(|tree| engine.run(&*tree))
                        .map_err(|e| e.with_context(ErrorContext::new().with_source(&file.name)))
                })
                .collect()
        });

        debug!(
            unit = %unit.name,
            files = files.len(),
            failed = outcomes.iter().filter(|o| o.is_err()).count(),
            "files matched"
        );
        Ok(outcomes)
    }

    /// Runs every file and hands the graphs to `sink` in input order.
    ///
    /// Returns the runtime diagnostics of all files, each tagged with its
    /// file name.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, or the sink's error. Graphs of files
    /// before the failing one have already been accepted.
    pub fn run_into(
        &self,
        unit: &CompiledUnit,
        files: &[SubjectFile],
        sink: &mut dyn FactSink,
    ) -> Result<Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        for (file, outcome) in files.iter().zip(self.run_files(unit, files)?) {
            let outcome = outcome?;
            sink.accept(&file.name, &outcome.graph)?;
            for error in outcome.diagnostics {
                diagnostics.push(error.with_context(ErrorContext::new().with_source(&file.name)));
            }
        }
        Ok(diagnostics)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("grammars", &self.grammars)
            .field("host", &self.host)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
