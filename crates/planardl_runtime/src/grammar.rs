//! Grammar parsers by name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use planardl_engine::GrammarParser;
use planardl_foundation::{Error, ErrorKind, Result};

/// Maps grammar names (`yaml`, `docker_compose`, ...) to parsers.
#[derive(Clone, Default)]
pub struct GrammarRegistry {
    parsers: HashMap<String, Arc<dyn GrammarParser>>,
}

impl GrammarRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `parser` under `name`, replacing any previous parser.
    pub fn register(&mut self, name: impl Into<String>, parser: impl GrammarParser + 'static) {
        self.parsers.insert(name.into(), Arc::new(parser));
    }

    /// Registers a parser (builder form).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, parser: impl GrammarParser + 'static) -> Self {
        self.register(name, parser);
        self
    }

    /// Returns true if a parser is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    /// The parser for `name`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownGrammar` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn GrammarParser>> {
        self.parsers
            .get(name)
            .ok_or_else(|| Error::new(ErrorKind::UnknownGrammar(name.to_string())))
    }

    /// Registered grammar names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for GrammarRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrammarRegistry")
            .field("grammars", &self.names())
            .finish()
    }
}
