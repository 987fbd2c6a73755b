//! Read-only introspection of a `Compressor`, for external serializers.
//!
//! The description carries everything needed to rebuild an equivalent
//! compressor: declared types, lineage, local parameters, and the start graph.
//! Callbacks (selectors, function graphs) are opaque and only named by kind.

use serde::Serialize;

use crate::config::CompressionParams;
use crate::error::Result;
use crate::graph::registry::{Compressor, GraphKind, SelectorPolicy};
use crate::graph::{GraphId, LocalParams, NodeId, TransformId};
use crate::transform::{TransformDescriptor, TransformKind};
use crate::types::TypeMask;

#[derive(Debug, Clone, Serialize)]
pub struct CompressorDescription {
    pub start_graph: Option<GraphId>,
    pub parameters: CompressionParams,
    pub transforms: Vec<TransformDescription>,
    pub nodes: Vec<NodeDescription>,
    pub graphs: Vec<GraphDescription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformDescription {
    pub kind: TransformKind,
    #[serde(flatten)]
    pub descriptor: TransformDescriptor,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeDescription {
    pub id: NodeId,
    pub name: Option<String>,
    pub transform_id: TransformId,
    pub base: Option<NodeId>,
    pub local_params: LocalParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphDescription {
    pub id: GraphId,
    pub name: Option<String>,
    pub base: Option<GraphId>,
    pub local_params: LocalParams,
    pub kind: GraphKindDescription,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphKindDescription {
    Store,
    Static {
        head: NodeId,
        successors: Vec<GraphId>,
    },
    Selector {
        brute_force: bool,
        candidates: Vec<GraphId>,
    },
    Function {
        input_mask: TypeMask,
        custom_graphs: Vec<GraphId>,
        custom_nodes: Vec<NodeId>,
    },
}

impl Compressor {
    pub fn describe(&self) -> CompressorDescription {
        let transforms = self
            .transforms()
            .sorted()
            .into_iter()
            .map(|r| TransformDescription {
                kind: r.transform.kind(),
                descriptor: (*r.descriptor).clone(),
            })
            .collect();

        let nodes = self
            .nodes()
            .iter()
            .map(|n| NodeDescription {
                id: n.id,
                name: n.name.clone(),
                transform_id: n.descriptor.id,
                base: n.base,
                local_params: n.local_params.clone(),
            })
            .collect();

        let graphs = self
            .graphs()
            .iter()
            .map(|g| GraphDescription {
                id: g.id,
                name: g.name.clone(),
                base: g.base,
                local_params: g.local_params.clone(),
                kind: match &g.kind {
                    GraphKind::Store => GraphKindDescription::Store,
                    GraphKind::Static { head, successors } => GraphKindDescription::Static {
                        head: *head,
                        successors: successors.clone(),
                    },
                    GraphKind::Selector { policy, candidates } => GraphKindDescription::Selector {
                        brute_force: matches!(policy, SelectorPolicy::BruteForce),
                        candidates: candidates.clone(),
                    },
                    GraphKind::Function {
                        input_mask,
                        custom_graphs,
                        custom_nodes,
                        ..
                    } => GraphKindDescription::Function {
                        input_mask: *input_mask,
                        custom_graphs: custom_graphs.clone(),
                        custom_nodes: custom_nodes.clone(),
                    },
                },
            })
            .collect();

        CompressorDescription {
            start_graph: self.start_graph(),
            parameters: self.parameters().clone(),
            transforms,
            nodes,
            graphs,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.describe())?)
    }
}
