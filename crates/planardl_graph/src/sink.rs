//! Consumers of finished fact graphs.

use planardl_foundation::Result;

use crate::graph::FactGraph;

/// Receives fact graphs once a run over a subject file has finished.
///
/// Graphs are handed over read-only; a sink never observes a graph that
/// is still being built.
pub trait FactSink {
    /// Consumes one finished graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot store or forward the graph.
    fn accept(&mut self, source: &str, graph: &FactGraph) -> Result<()>;
}

/// Keeps every accepted graph in memory, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    graphs: Vec<(String, FactGraph)>,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted graphs with the name of the subject they came from.
    #[must_use]
    pub fn graphs(&self) -> &[(String, FactGraph)] {
        &self.graphs
    }

    /// Total number of facts across all accepted graphs.
    #[must_use]
    pub fn total_facts(&self) -> usize {
        self.graphs.iter().map(|(_, g)| g.len()).sum()
    }

    /// Returns the accepted graphs.
    #[must_use]
    pub fn into_graphs(self) -> Vec<(String, FactGraph)> {
        self.graphs
    }
}

impl FactSink for CollectingSink {
    fn accept(&mut self, source: &str, graph: &FactGraph) -> Result<()> {
        self.graphs.push((source.to_string(), graph.clone()));
        Ok(())
    }
}
