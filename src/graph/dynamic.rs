//! Runtime-decided graphs: selectors and function graphs.
//!
//! Both run only on the compression side. Whatever they decide shows up in the
//! frame as ordinary transform records, so decoding never consults them.

use crate::engine::{Edge, GraphContext};
use crate::error::Result;
use crate::graph::{GraphId, LocalParams};
use crate::types::StreamView;

/// Picks one successor for a stream, without speculation.
pub trait Selector: Send + Sync {
    /// Returns an index into `candidates`. An index out of range fails the call
    /// with `successor_invalid`.
    fn select(&self, input: &StreamView<'_>, candidates: &[GraphId], params: &LocalParams) -> Result<usize>;
}

/// A graph built on the fly by user code.
///
/// The callback receives the live input edges and must consume every edge it
/// sees exactly once: either by running a node on it (which yields new edges)
/// or by sending it to a destination graph.
pub trait FunctionGraph: Send + Sync {
    fn build(&self, ctx: &mut GraphContext<'_>, inputs: &[Edge]) -> Result<()>;
}
