//! Module registry for tracking loaded compilation units.
//!
//! The `ModuleRegistry` tracks:
//! - Which modules have been loaded, in dependency order
//! - The loading stack for import cycle detection
//!
//! Module lookup itself is delegated to a [`ModuleResolver`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use planardl_foundation::{Diagnostics, Error, ErrorKind, Result};
use tracing::{debug, trace};

use crate::ast::{Declaration, Module};

// =============================================================================
// ModuleResolver
// =============================================================================

/// Provides modules by fully-qualified name.
///
/// File lookup and caching live behind this trait.
pub trait ModuleResolver: Send + Sync {
    /// Returns the declarations of the named module.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedModule` if the module does not exist.
    fn resolve_module(&self, fqmn: &str) -> Result<Module>;
}

/// Map-backed resolver for hosts that already hold their modules.
#[derive(Clone, Debug, Default)]
pub struct InMemoryModules {
    modules: HashMap<String, Module>,
}

impl InMemoryModules {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module, replacing any module of the same name.
    pub fn insert(&mut self, module: Module) {
        self.modules.insert(module.name.clone(), module);
    }

    /// Adds a module (builder form).
    #[must_use]
    pub fn with(mut self, module: Module) -> Self {
        self.insert(module);
        self
    }
}

impl ModuleResolver for InMemoryModules {
    fn resolve_module(&self, fqmn: &str) -> Result<Module> {
        self.modules
            .get(fqmn)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::UnresolvedModule(fqmn.to_string())))
    }
}

// =============================================================================
// ModuleRegistry
// =============================================================================

/// Registry of loaded modules.
///
/// Modules are kept in load order: every module comes after the modules it
/// imports, and the root module comes last.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    /// Loaded modules in load order.
    modules: Vec<Arc<Module>>,
    /// Map from module name to position in `modules`.
    index: HashMap<String, usize>,
    /// Modules currently being loaded (for cycle detection).
    loading_stack: Vec<String>,
}

impl ModuleRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a module is currently being loaded (cycle detection).
    #[must_use]
    pub fn is_loading(&self, name: &str) -> bool {
        self.loading_stack.iter().any(|n| n == name)
    }

    /// Push a module onto the loading stack.
    ///
    /// # Errors
    ///
    /// Returns a `Cycle` error listing the import chain if the module is
    /// already being loaded.
    pub fn begin_loading(&mut self, name: &str) -> Result<()> {
        if self.is_loading(name) {
            let mut cycle: Vec<String> = self
                .loading_stack
                .iter()
                .skip_while(|n| *n != name)
                .cloned()
                .collect();
            cycle.push(name.to_string());
            return Err(Error::new(ErrorKind::Cycle(cycle)));
        }

        self.loading_stack.push(name.to_string());
        Ok(())
    }

    /// Pop a module from the loading stack.
    pub fn finish_loading(&mut self, name: &str) {
        if let Some(pos) = self.loading_stack.iter().position(|n| n == name) {
            self.loading_stack.remove(pos);
        }
    }

    /// Returns the current loading stack.
    #[must_use]
    pub fn loading_stack(&self) -> &[String] {
        &self.loading_stack
    }

    /// Register a loaded module.
    pub fn register(&mut self, module: Module) {
        let name = module.name.clone();
        self.index.insert(name, self.modules.len());
        self.modules.push(Arc::new(module));
    }

    /// Lookup a module by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Module>> {
        self.index.get(name).map(|&i| &self.modules[i])
    }

    /// Check if a module is loaded.
    #[must_use]
    pub fn has_module(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Loaded modules in load order.
    #[must_use]
    pub fn modules(&self) -> &[Arc<Module>] {
        &self.modules
    }

    /// The last registered module.
    #[must_use]
    pub fn root(&self) -> Option<&Arc<Module>> {
        self.modules.last()
    }
}

// =============================================================================
// ModuleLoader
// =============================================================================

/// Loads a root module and its transitive imports, depth-first.
pub struct ModuleLoader<'a> {
    resolver: &'a dyn ModuleResolver,
    registry: ModuleRegistry,
    diagnostics: Diagnostics,
}

impl<'a> ModuleLoader<'a> {
    /// Creates a loader backed by `resolver`.
    #[must_use]
    pub fn new(resolver: &'a dyn ModuleResolver) -> Self {
        Self {
            resolver,
            registry: ModuleRegistry::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Loads `root` and everything it imports.
    ///
    /// # Errors
    ///
    /// Returns every `UnresolvedModule`, `Cycle` and `DuplicateSymbol`
    /// error found while loading.
    pub fn load(mut self, root: Module) -> std::result::Result<ModuleRegistry, Diagnostics> {
        self.visit(root);
        debug!(modules = self.registry.modules().len(), "modules loaded");
        self.diagnostics.into_result(self.registry)
    }

    fn visit(&mut self, module: Module) {
        let name = module.name.clone();
        if let Err(e) = self.registry.begin_loading(&name) {
            self.diagnostics.push(e);
            return;
        }

        check_duplicate_symbols(&module, &mut self.diagnostics);

        for import in module.declarations.iter().filter_map(|d| match d {
            Declaration::Import(import) => Some(import),
            _ => None,
        }) {
            if self.registry.has_module(&import.module) {
                continue;
            }
            if self.registry.is_loading(&import.module) {
                // Reports the cycle
                if let Err(e) = self.registry.begin_loading(&import.module) {
                    self.diagnostics.push(e.with_span(import.span));
                }
                continue;
            }
            trace!(module = %name, import = %import.module, "resolving import");
            match self.resolver.resolve_module(&import.module) {
                Ok(imported) => self.visit(imported),
                Err(e) => self.diagnostics.push(e.with_span(import.span)),
            }
        }

        self.registry.finish_loading(&name);
        self.registry.register(module);
    }
}

fn check_duplicate_symbols(module: &Module, diagnostics: &mut Diagnostics) {
    let mut seen: HashSet<&str> = HashSet::new();
    for decl in &module.declarations {
        if let Some(symbol) = decl.symbol() {
            if !seen.insert(symbol) {
                diagnostics.push(
                    Error::duplicate_symbol(format!("{}.{symbol}", module.name))
                        .with_span(decl.span()),
                );
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
