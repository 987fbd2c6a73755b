// In: src/graph/registry.rs

//! The node and graph registry owned by a [`Compressor`].
//!
//! Nodes and graphs live in append-only vectors and are addressed by index, so
//! issued ids stay valid for the lifetime of the compressor and lineage
//! (`base` back-references) never needs owning pointers. Entries are immutable
//! once pushed: cloning a node or re-parameterizing a graph always appends a new
//! entry.

use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{CParam, CompressionParams};
use crate::error::{ErrorKind, Result, TambakError};
use crate::graph::dynamic::{FunctionGraph, Selector};
use crate::graph::{standard, GraphId, GraphParameters, LocalParams, NodeId, NodeParameters};
use crate::transform::{
    PipeTransform, SplitTransform, Transform, TransformDescriptor, TransformSet, TypedTransform,
    VoTransform,
};
use crate::types::TypeMask;

/// Most candidates a selector graph may hold.
pub const MAX_SELECTOR_CANDIDATES: usize = 16;

/// Most brute-force selectors allowed along any path of a graph.
pub const MAX_SPECULATION_DEPTH: usize = 4;

//==================================================================================
// 1. Entries
//==================================================================================

/// A registered node: a transform bound to local parameters.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub(crate) id: NodeId,
    pub(crate) name: Option<String>,
    pub(crate) descriptor: Arc<TransformDescriptor>,
    pub(crate) transform: Transform,
    pub(crate) local_params: LocalParams,
    pub(crate) base: Option<NodeId>,
}

impl NodeEntry {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name, or a generated label for unnamed clones.
    pub fn label(&self) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => format!("{}@{}", self.descriptor.name, self.id),
        }
    }

    pub fn descriptor(&self) -> &TransformDescriptor {
        &self.descriptor
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn local_params(&self) -> &LocalParams {
        &self.local_params
    }

    pub fn base(&self) -> Option<NodeId> {
        self.base
    }
}

#[derive(Clone)]
pub enum SelectorPolicy {
    /// Compress through every candidate and keep the smallest.
    BruteForce,
    /// Ask a user-supplied selector.
    External(Arc<dyn Selector>),
}

impl fmt::Debug for SelectorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorPolicy::BruteForce => f.write_str("BruteForce"),
            SelectorPolicy::External(_) => f.write_str("External"),
        }
    }
}

#[derive(Clone)]
pub enum GraphKind {
    /// Terminal: the stream is written to the frame as-is.
    Store,
    /// A head node plus one successor per singleton output; variable outputs, if
    /// any, all go to one extra trailing successor.
    Static { head: NodeId, successors: Vec<GraphId> },
    Selector {
        policy: SelectorPolicy,
        candidates: Vec<GraphId>,
    },
    Function {
        callback: Arc<dyn FunctionGraph>,
        input_mask: TypeMask,
        custom_graphs: Vec<GraphId>,
        custom_nodes: Vec<NodeId>,
    },
}

impl fmt::Debug for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphKind::Store => f.write_str("Store"),
            GraphKind::Static { head, successors } => f
                .debug_struct("Static")
                .field("head", head)
                .field("successors", successors)
                .finish(),
            GraphKind::Selector { policy, candidates } => f
                .debug_struct("Selector")
                .field("policy", policy)
                .field("candidates", candidates)
                .finish(),
            GraphKind::Function {
                input_mask,
                custom_graphs,
                custom_nodes,
                ..
            } => f
                .debug_struct("Function")
                .field("input_mask", input_mask)
                .field("custom_graphs", custom_graphs)
                .field("custom_nodes", custom_nodes)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphEntry {
    pub(crate) id: GraphId,
    pub(crate) name: Option<String>,
    pub(crate) kind: GraphKind,
    pub(crate) local_params: LocalParams,
    pub(crate) base: Option<GraphId>,
    /// Brute-force selectors on the deepest path through this graph.
    pub(crate) speculation_depth: usize,
}

impl GraphEntry {
    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn label(&self) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => self.id.to_string(),
        }
    }

    pub fn kind(&self) -> &GraphKind {
        &self.kind
    }

    pub fn local_params(&self) -> &LocalParams {
        &self.local_params
    }

    pub fn base(&self) -> Option<GraphId> {
        self.base
    }
}

//==================================================================================
// 2. Graph Descriptions
//==================================================================================

#[derive(Debug, Clone)]
pub struct StaticGraphDesc {
    pub name: Option<String>,
    pub head: NodeId,
    pub successors: Vec<GraphId>,
    pub local_params: LocalParams,
}

impl StaticGraphDesc {
    pub fn new(head: NodeId, successors: impl Into<Vec<GraphId>>) -> Self {
        Self {
            name: None,
            head,
            successors: successors.into(),
            local_params: LocalParams::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_params(mut self, local_params: LocalParams) -> Self {
        self.local_params = local_params;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SelectorDesc {
    pub name: Option<String>,
    pub policy: SelectorPolicy,
    pub candidates: Vec<GraphId>,
    pub local_params: LocalParams,
}

impl SelectorDesc {
    pub fn brute_force(candidates: impl Into<Vec<GraphId>>) -> Self {
        Self {
            name: None,
            policy: SelectorPolicy::BruteForce,
            candidates: candidates.into(),
            local_params: LocalParams::new(),
        }
    }

    pub fn external(selector: Arc<dyn Selector>, candidates: impl Into<Vec<GraphId>>) -> Self {
        Self {
            policy: SelectorPolicy::External(selector),
            ..Self::brute_force(candidates)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_params(mut self, local_params: LocalParams) -> Self {
        self.local_params = local_params;
        self
    }
}

#[derive(Clone)]
pub struct FunctionGraphDesc {
    pub name: Option<String>,
    pub callback: Arc<dyn FunctionGraph>,
    pub input_mask: TypeMask,
    /// Graphs the callback may send edges to, besides `STORE`.
    pub custom_graphs: Vec<GraphId>,
    /// Nodes the callback may run.
    pub custom_nodes: Vec<NodeId>,
    pub local_params: LocalParams,
}

impl FunctionGraphDesc {
    pub fn new(callback: Arc<dyn FunctionGraph>) -> Self {
        Self {
            name: None,
            callback,
            input_mask: TypeMask::ANY,
            custom_graphs: Vec::new(),
            custom_nodes: Vec::new(),
            local_params: LocalParams::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_input_mask(mut self, mask: TypeMask) -> Self {
        self.input_mask = mask;
        self
    }

    pub fn with_graphs(mut self, graphs: impl Into<Vec<GraphId>>) -> Self {
        self.custom_graphs = graphs.into();
        self
    }

    pub fn with_nodes(mut self, nodes: impl Into<Vec<NodeId>>) -> Self {
        self.custom_nodes = nodes.into();
        self
    }

    pub fn with_params(mut self, local_params: LocalParams) -> Self {
        self.local_params = local_params;
        self
    }
}

//==================================================================================
// 3. The Compressor
//==================================================================================

/// One compression configuration: registered transforms, nodes and graphs, the
/// start graph, and the compressor-level parameters.
///
/// Build it mutably, then share it read-only (typically in an `Arc`) with any
/// number of compression contexts.
#[derive(Debug, Clone)]
pub struct Compressor {
    transforms: TransformSet,
    nodes: Vec<NodeEntry>,
    graphs: Vec<GraphEntry>,
    node_names: HashMap<String, NodeId>,
    graph_names: HashMap<String, GraphId>,
    start: Option<GraphId>,
    params: CompressionParams,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor {
    /// A compressor holding the standard nodes and graphs, with no start graph.
    pub fn new() -> Self {
        let mut compressor = Self {
            transforms: TransformSet::standard(),
            nodes: Vec::new(),
            graphs: Vec::new(),
            node_names: HashMap::new(),
            graph_names: HashMap::new(),
            start: None,
            params: CompressionParams::default(),
        };
        standard::install(&mut compressor);
        compressor
    }

    // --- Transforms and nodes ---

    /// Registers a custom transform and returns the node running it with no
    /// local parameters. The node takes the transform's name.
    pub fn register_transform(
        &mut self,
        descriptor: TransformDescriptor,
        transform: Transform,
    ) -> Result<NodeId> {
        self.check_node_name(Some(&descriptor.name))?;
        let descriptor = self.transforms.register(descriptor, transform.clone())?;
        log::debug!("registered transform '{}' ({})", descriptor.name, descriptor.id);
        Ok(self.push_node(
            Some(descriptor.name.clone()),
            descriptor,
            transform,
            LocalParams::new(),
            None,
        ))
    }

    pub fn register_pipe_transform(
        &mut self,
        descriptor: TransformDescriptor,
        transform: impl PipeTransform + 'static,
    ) -> Result<NodeId> {
        self.register_transform(descriptor, Transform::Pipe(Arc::new(transform)))
    }

    pub fn register_typed_transform(
        &mut self,
        descriptor: TransformDescriptor,
        transform: impl TypedTransform + 'static,
    ) -> Result<NodeId> {
        self.register_transform(descriptor, Transform::Typed(Arc::new(transform)))
    }

    pub fn register_vo_transform(
        &mut self,
        descriptor: TransformDescriptor,
        transform: impl VoTransform + 'static,
    ) -> Result<NodeId> {
        self.register_transform(descriptor, Transform::VariableOutput(Arc::new(transform)))
    }

    pub fn register_split_transform(
        &mut self,
        descriptor: TransformDescriptor,
        transform: impl SplitTransform + 'static,
    ) -> Result<NodeId> {
        self.register_transform(descriptor, Transform::Split(Arc::new(transform)))
    }

    /// Registers a copy of `base` with `params.local_params` merged over the
    /// base's parameters. The new node shares the base's wire id.
    pub fn clone_node(&mut self, base: NodeId, params: NodeParameters) -> Result<NodeId> {
        self.check_node_name(params.name.as_deref())?;
        let base_entry = self.node_entry(base)?;
        let local_params = base_entry.local_params.merged_with(&params.local_params);
        let (descriptor, transform) = (Arc::clone(&base_entry.descriptor), base_entry.transform.clone());
        Ok(self.push_node(params.name, descriptor, transform, local_params, Some(base)))
    }

    pub(crate) fn push_node(
        &mut self,
        name: Option<String>,
        descriptor: Arc<TransformDescriptor>,
        transform: Transform,
        local_params: LocalParams,
        base: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        if let Some(n) = &name {
            self.node_names.insert(n.clone(), id);
        }
        self.nodes.push(NodeEntry {
            id,
            name,
            descriptor,
            transform,
            local_params,
            base,
        });
        id
    }

    // --- Graphs ---

    pub fn register_static_graph(&mut self, desc: StaticGraphDesc) -> Result<GraphId> {
        self.add_graph(
            desc.name,
            GraphKind::Static {
                head: desc.head,
                successors: desc.successors,
            },
            desc.local_params,
            None,
        )
    }

    pub fn register_selector_graph(&mut self, desc: SelectorDesc) -> Result<GraphId> {
        self.add_graph(
            desc.name,
            GraphKind::Selector {
                policy: desc.policy,
                candidates: desc.candidates,
            },
            desc.local_params,
            None,
        )
    }

    /// Shorthand for an unnamed brute-force selector.
    pub fn register_brute_force_selector(&mut self, candidates: &[GraphId]) -> Result<GraphId> {
        self.register_selector_graph(SelectorDesc::brute_force(candidates))
    }

    pub fn register_function_graph(&mut self, desc: FunctionGraphDesc) -> Result<GraphId> {
        self.add_graph(
            desc.name,
            GraphKind::Function {
                callback: desc.callback,
                input_mask: desc.input_mask,
                custom_graphs: desc.custom_graphs,
                custom_nodes: desc.custom_nodes,
            },
            desc.local_params,
            None,
        )
    }

    /// Registers a variant of `base`. Unset fields of `params` keep the base's
    /// values; local parameters are merged over the base's.
    pub fn parameterize_graph(&mut self, base: GraphId, params: GraphParameters) -> Result<GraphId> {
        let base_entry = self.graph_entry(base)?;
        let kind = match (base_entry.kind.clone(), params.successors) {
            (kind, None) => kind,
            (GraphKind::Store, Some(_)) => {
                return Err(TambakError::graph_invalid("the store graph has no successors to replace"))
            }
            (GraphKind::Static { head, .. }, Some(successors)) => GraphKind::Static { head, successors },
            (GraphKind::Selector { policy, .. }, Some(candidates)) => GraphKind::Selector { policy, candidates },
            (
                GraphKind::Function {
                    callback,
                    input_mask,
                    custom_nodes,
                    ..
                },
                Some(custom_graphs),
            ) => GraphKind::Function {
                callback,
                input_mask,
                custom_graphs,
                custom_nodes,
            },
        };
        let local_params = match &params.local_params {
            Some(overrides) => base_entry.local_params.merged_with(overrides),
            None => base_entry.local_params.clone(),
        };
        self.add_graph(params.name, kind, local_params, Some(base))
    }

    fn add_graph(
        &mut self,
        name: Option<String>,
        kind: GraphKind,
        local_params: LocalParams,
        base: Option<GraphId>,
    ) -> Result<GraphId> {
        if let Some(n) = &name {
            if self.graph_names.contains_key(n) {
                return Err(TambakError::graph_invalid(format!("graph name '{}' is already taken", n)));
            }
        }
        let depth = self.validate_graph(&kind)?;
        Ok(self.push_graph(name, kind, local_params, base, depth))
    }

    pub(crate) fn push_graph(
        &mut self,
        name: Option<String>,
        kind: GraphKind,
        local_params: LocalParams,
        base: Option<GraphId>,
        speculation_depth: usize,
    ) -> GraphId {
        let id = GraphId(self.graphs.len() as u32);
        if let Some(n) = &name {
            self.graph_names.insert(n.clone(), id);
        }
        self.graphs.push(GraphEntry {
            id,
            name,
            kind,
            local_params,
            base,
            speculation_depth,
        });
        id
    }

    /// Checks a graph definition against the registry and returns its
    /// speculation depth.
    fn validate_graph(&self, kind: &GraphKind) -> Result<usize> {
        let successor_depth = |ids: &[GraphId]| -> Result<usize> {
            ids.iter().try_fold(0usize, |acc, &g| {
                let entry = self.graphs.get(g.index()).ok_or_else(|| {
                    TambakError::new(ErrorKind::SuccessorInvalid, format!("successor {} does not exist", g))
                })?;
                Ok(acc.max(entry.speculation_depth))
            })
        };

        match kind {
            GraphKind::Store => Ok(0),
            GraphKind::Static { head, successors } => {
                let node = self.node_entry(*head)?;
                let desc = &node.descriptor;
                let expected = desc.nb_singletons() + desc.variable_output.is_some() as usize;
                if successors.len() != expected {
                    return Err(TambakError::new(
                        ErrorKind::SuccessorInvalid,
                        format!(
                            "node '{}' has {} outputs but {} successors were given",
                            node.label(),
                            expected,
                            successors.len()
                        ),
                    ));
                }
                successor_depth(successors)
            }
            GraphKind::Selector { policy, candidates } => {
                if candidates.is_empty() || candidates.len() > MAX_SELECTOR_CANDIDATES {
                    return Err(TambakError::graph_invalid(format!(
                        "selectors take 1 to {} candidates, got {}",
                        MAX_SELECTOR_CANDIDATES,
                        candidates.len()
                    )));
                }
                let depth = successor_depth(candidates)?
                    + matches!(policy, SelectorPolicy::BruteForce) as usize;
                if depth > MAX_SPECULATION_DEPTH {
                    return Err(TambakError::graph_invalid(format!(
                        "brute-force selectors nest {} deep, limit is {}",
                        depth, MAX_SPECULATION_DEPTH
                    )));
                }
                Ok(depth)
            }
            GraphKind::Function {
                input_mask,
                custom_graphs,
                custom_nodes,
                ..
            } => {
                if input_mask.is_empty() {
                    return Err(TambakError::graph_invalid("function graph accepts no input type"));
                }
                for &node in custom_nodes {
                    self.node_entry(node)?;
                }
                successor_depth(custom_graphs)
            }
        }
    }

    fn check_node_name(&self, name: Option<&str>) -> Result<()> {
        match name {
            Some(n) if self.node_names.contains_key(n) => Err(TambakError::new(
                ErrorKind::NodeDefinitionInvalid,
                format!("node name '{}' is already taken", n),
            )),
            _ => Ok(()),
        }
    }

    // --- Start graph and parameters ---

    pub fn select_starting_graph(&mut self, graph: GraphId) -> Result<()> {
        self.graph_entry(graph)?;
        self.start = Some(graph);
        Ok(())
    }

    pub fn start_graph(&self) -> Option<GraphId> {
        self.start
    }

    pub fn set_parameter(&mut self, param: CParam, value: i64) -> Result<()> {
        self.params.set(param, value)
    }

    pub fn get_parameter(&self, param: CParam) -> Option<i64> {
        self.params.get(param)
    }

    pub fn parameters(&self) -> &CompressionParams {
        &self.params
    }

    /// Replaces the whole compressor-level parameter set.
    pub fn set_parameters(&mut self, params: CompressionParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    // --- Lookup ---

    pub fn node(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes.get(id.index())
    }

    pub fn graph(&self, id: GraphId) -> Option<&GraphEntry> {
        self.graphs.get(id.index())
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_names.get(name).copied()
    }

    pub fn graph_by_name(&self, name: &str) -> Option<GraphId> {
        self.graph_names.get(name).copied()
    }

    pub fn nodes(&self) -> &[NodeEntry] {
        &self.nodes
    }

    pub fn graphs(&self) -> &[GraphEntry] {
        &self.graphs
    }

    pub fn transforms(&self) -> &TransformSet {
        &self.transforms
    }

    pub(crate) fn node_entry(&self, id: NodeId) -> Result<&NodeEntry> {
        self.node(id)
            .ok_or_else(|| TambakError::new(ErrorKind::NodeInvalid, format!("{} does not exist", id)))
    }

    pub(crate) fn graph_entry(&self, id: GraphId) -> Result<&GraphEntry> {
        self.graph(id)
            .ok_or_else(|| TambakError::graph_invalid(format!("{} does not exist", id)))
    }
}
