//! Host function table.
//!
//! Extern declarations only describe signatures; the host supplies the
//! implementations through a [`HostFunctions`] table handed to each engine.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use planardl_foundation::{Error, ErrorKind, Result, Value};
use planardl_language::ExternKey;

/// A host implementation of an extern.
pub type HostFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Maps extern keys to host implementations.
#[derive(Clone, Default)]
pub struct HostFunctions {
    functions: HashMap<ExternKey, HostFn>,
}

impl HostFunctions {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `function` under `key`, replacing any previous binding.
    pub fn register<F>(&mut self, key: ExternKey, function: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(key, Arc::new(function));
    }

    /// Registers a function by full name and arity (builder form).
    #[must_use]
    pub fn with<F>(mut self, name: &str, arity: usize, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(ExternKey::new(name, arity), function);
        self
    }

    /// Returns true if `key` has an implementation.
    #[must_use]
    pub fn contains(&self, key: &ExternKey) -> bool {
        self.functions.contains_key(key)
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Checks that every key in `keys` is bound.
    ///
    /// # Errors
    ///
    /// Returns `UnboundExtern` for the first missing key.
    pub fn verify<'a>(&self, keys: impl IntoIterator<Item = &'a ExternKey>) -> Result<()> {
        match keys.into_iter().find(|key| !self.contains(key)) {
            Some(key) => Err(Error::new(ErrorKind::UnboundExtern {
                name: key.name.to_string(),
                arity: key.arity,
            })),
            None => Ok(()),
        }
    }

    /// Calls the implementation bound to `key`.
    ///
    /// # Errors
    ///
    /// Returns `UnboundExtern` if nothing is bound, and the host's error
    /// (as `ExternCall`) if the call fails.
    pub fn invoke(&self, key: &ExternKey, args: &[Value]) -> Result<Value> {
        let function = self.functions.get(key).ok_or_else(|| {
            Error::new(ErrorKind::UnboundExtern {
                name: key.name.to_string(),
                arity: key.arity,
            })
        })?;
        function(args).map_err(|e| {
            if matches!(e.kind, ErrorKind::ExternCall { .. }) {
                e
            } else {
                Error::extern_call(&*key.name, e.kind.to_string())
            }
        })
    }
}

impl fmt::Debug for HostFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.functions.keys().map(ToString::to_string).collect();
        keys.sort();
        f.debug_struct("HostFunctions").field("functions", &keys).finish()
    }
}
