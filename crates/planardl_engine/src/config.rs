//! Configuration for matching runs.

/// What to do when an emitted field violates a refinement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefinementPolicy {
    /// Drop the offending field; the fact is still emitted.
    #[default]
    DropField,
    /// Discard the whole Emit statement.
    DiscardEmit,
}

/// Configuration for the match engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Re-check refinements on emitted field values.
    pub check_refinements: bool,

    /// Reaction to a violated refinement.
    pub refinement_policy: RefinementPolicy,

    /// Upper bound on facts per graph; exceeding it aborts the run.
    pub max_facts: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_refinements: true,
            refinement_policy: RefinementPolicy::DropField,
            max_facts: None,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration where any violation discards its Emit.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            check_refinements: true,
            refinement_policy: RefinementPolicy::DiscardEmit,
            max_facts: None,
        }
    }

    /// Creates a configuration that skips run-time refinement checks.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            check_refinements: false,
            ..Self::default()
        }
    }

    /// Builder method to enable/disable refinement checks.
    #[must_use]
    pub fn with_check_refinements(mut self, check: bool) -> Self {
        self.check_refinements = check;
        self
    }

    /// Builder method to set the refinement policy.
    #[must_use]
    pub fn with_refinement_policy(mut self, policy: RefinementPolicy) -> Self {
        self.refinement_policy = policy;
        self
    }

    /// Builder method to cap the number of facts per graph.
    #[must_use]
    pub fn with_max_facts(mut self, max: usize) -> Self {
        self.max_facts = Some(max);
        self
    }
}
