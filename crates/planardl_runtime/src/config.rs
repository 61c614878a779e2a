//! Session configuration.

use planardl_engine::EngineConfig;

/// Configuration for a [`Session`](crate::Session).
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Configuration handed to every engine.
    pub engine: EngineConfig,

    /// Worker threads for parallel compilation and matching.
    /// `None` uses the global pool.
    pub parallelism: Option<usize>,

    /// Add the builtin extern block to every compiled unit.
    pub builtins: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            parallelism: None,
            builtins: true,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration that runs everything on the calling thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallelism: Some(1),
            ..Self::default()
        }
    }

    /// Builder method to set the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Builder method to set the number of workers.
    #[must_use]
    pub fn with_parallelism(mut self, workers: usize) -> Self {
        self.parallelism = Some(workers.max(1));
        self
    }

    /// Builder method to enable/disable the builtin extern block.
    #[must_use]
    pub fn with_builtins(mut self, enabled: bool) -> Self {
        self.builtins = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planardl_engine::RefinementPolicy;

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert!(config.builtins);
        assert_eq!(config.parallelism, None);
        assert_eq!(config.engine.refinement_policy, RefinementPolicy::DropField);
    }

    #[test]
    fn builder_pattern() {
        let config = SessionConfig::sequential()
            .with_engine(EngineConfig::strict())
            .with_parallelism(0)
            .with_builtins(false);

        assert_eq!(config.parallelism, Some(1));
        assert!(!config.builtins);
        assert_eq!(config.engine.refinement_policy, RefinementPolicy::DiscardEmit);
    }
}
