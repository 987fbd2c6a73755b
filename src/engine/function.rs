//! The handle user function graphs build sub-graphs through.

use hashbrown::HashSet;

use crate::error::{ErrorKind, Result, TambakError};
use crate::graph::{graphs, GraphId, LocalParams, NodeId};
use crate::types::StreamView;

/// A live stream handed to a function graph. Each edge must be consumed exactly
/// once, by [`GraphContext::run_node`] or [`GraphContext::set_destination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge(pub(crate) usize);

/// What a function graph needs from the running compression session.
pub(crate) trait GraphHost {
    fn stream(&self, id: usize) -> Result<StreamView<'_>>;

    /// Runs `node` on stream `id` and returns the ids of its outputs.
    fn run_node(&mut self, node: NodeId, id: usize, graph_params: &LocalParams) -> Result<Vec<usize>>;
}

pub struct GraphContext<'s> {
    host: &'s mut dyn GraphHost,
    label: &'s str,
    custom_graphs: &'s [GraphId],
    custom_nodes: &'s [NodeId],
    local_params: &'s LocalParams,
    pending: HashSet<Edge>,
    destinations: Vec<(Edge, GraphId)>,
}

impl<'s> GraphContext<'s> {
    pub(crate) fn new(
        host: &'s mut dyn GraphHost,
        label: &'s str,
        custom_graphs: &'s [GraphId],
        custom_nodes: &'s [NodeId],
        local_params: &'s LocalParams,
        inputs: &[Edge],
    ) -> Self {
        Self {
            host,
            label,
            custom_graphs,
            custom_nodes,
            local_params,
            pending: inputs.iter().copied().collect(),
            destinations: Vec::new(),
        }
    }

    /// The graph's local parameters.
    pub fn local_params(&self) -> &LocalParams {
        self.local_params
    }

    pub fn view(&self, edge: Edge) -> Result<StreamView<'_>> {
        self.host.stream(edge.0)
    }

    /// Runs one of the graph's declared nodes on `edge` and returns its outputs
    /// as new edges, singletons first.
    pub fn run_node(&mut self, node: NodeId, edge: Edge) -> Result<Vec<Edge>> {
        if !self.custom_nodes.contains(&node) {
            return Err(TambakError::new(
                ErrorKind::NodeInvalid,
                format!("function graph '{}' did not declare {}", self.label, node),
            ));
        }
        self.consume(edge)?;
        let outputs = self.host.run_node(node, edge.0, self.local_params)?;
        let edges: Vec<Edge> = outputs.into_iter().map(Edge).collect();
        self.pending.extend(edges.iter().copied());
        Ok(edges)
    }

    /// Sends `edge` to `graph`, which must be `STORE` or one of the graph's
    /// declared successors. Destinations run after the callback returns, in
    /// call order.
    pub fn set_destination(&mut self, edge: Edge, graph: GraphId) -> Result<()> {
        if graph != graphs::STORE && !self.custom_graphs.contains(&graph) {
            return Err(TambakError::new(
                ErrorKind::SuccessorInvalid,
                format!("function graph '{}' did not declare {}", self.label, graph),
            ));
        }
        self.consume(edge)?;
        self.destinations.push((edge, graph));
        Ok(())
    }

    fn consume(&mut self, edge: Edge) -> Result<()> {
        if !self.pending.remove(&edge) {
            return Err(TambakError::graph_invalid(format!(
                "function graph '{}' used stream {} that is not a live edge",
                self.label, edge.0
            )));
        }
        Ok(())
    }

    /// Checks every edge was consumed and hands back the deferred routing.
    pub(crate) fn finish(self) -> Result<Vec<(usize, GraphId)>> {
        if !self.pending.is_empty() {
            return Err(TambakError::graph_invalid(format!(
                "function graph '{}' left {} edges unconsumed",
                self.label,
                self.pending.len()
            )));
        }
        Ok(self.destinations.into_iter().map(|(e, g)| (e.0, g)).collect())
    }
}
