// In: src/graph/mod.rs

//! The build-time description of a compression pipeline.
//!
//! A *node* binds a transform to local parameters. A *graph* is either the
//! terminal store, a node plus one successor graph per output, a selector
//! choosing among candidate graphs, or a user callback building sub-graphs on
//! the fly. Graphs reference only previously registered graphs, so the whole
//! description is a DAG by construction.

pub mod describe;
pub mod dynamic;
pub mod ids;
pub mod params;
pub mod registry;
pub mod standard;

pub use describe::CompressorDescription;
pub use dynamic::{FunctionGraph, Selector};
pub use ids::{GraphId, NodeId, TransformId};
pub use params::{GraphParameters, LocalParams, NodeParameters};
pub use registry::{
    Compressor, FunctionGraphDesc, GraphEntry, GraphKind, NodeEntry, SelectorDesc, SelectorPolicy,
    StaticGraphDesc, MAX_SELECTOR_CANDIDATES, MAX_SPECULATION_DEPTH,
};
pub use standard::{graphs, nodes, TypeDispatch};
