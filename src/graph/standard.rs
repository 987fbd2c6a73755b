// In: src/graph/standard.rs

//! The standard nodes and graphs installed in every new `Compressor`.
//!
//! They are pushed in a fixed order, so their ids are constants. The install
//! step bypasses validation; the tests below check every entry against it.

use std::sync::Arc;

use crate::entropy::{Strategy, StrategyMask};
use crate::error::Result;
use crate::graph::dynamic::Selector;
use crate::graph::registry::{Compressor, GraphKind, SelectorPolicy};
use crate::graph::{GraphId, LocalParams, NodeId, TransformId};
use crate::transform::standard::param;
use crate::types::StreamView;

//==================================================================================
// 1. Standard Ids
//==================================================================================

pub mod nodes {
    use crate::graph::NodeId;

    pub const DELTA_INT: NodeId = NodeId(0);
    pub const ZIGZAG: NodeId = NodeId(1);
    /// Serial to width-1 numeric. Clones below cover the wider widths.
    pub const CONVERT_SERIAL_TO_NUMERIC: NodeId = NodeId(2);
    pub const CONVERT_NUMERIC_TO_SERIAL: NodeId = NodeId(3);
    pub const CONVERT_SERIAL_TO_STRUCT: NodeId = NodeId(4);
    pub const CONVERT_STRUCT_TO_SERIAL: NodeId = NodeId(5);
    pub const ENTROPY: NodeId = NodeId(6);
    pub const ZSTD: NodeId = NodeId(7);
    pub const RLE: NodeId = NodeId(8);
    pub const DICTIONARY: NodeId = NodeId(9);
    pub const SEPARATE_STRING_COMPONENTS: NodeId = NodeId(10);
    pub const SPLIT_BY_SIZE: NodeId = NodeId(11);
    pub const SPLIT_BLOCKS: NodeId = NodeId(12);
    pub const HUFFMAN: NodeId = NodeId(13);
    pub const RANS: NodeId = NodeId(14);
    pub const BITPACK: NodeId = NodeId(15);
    pub const CONSTANT: NodeId = NodeId(16);
    pub const CONVERT_SERIAL_TO_NUMERIC_16: NodeId = NodeId(17);
    pub const CONVERT_SERIAL_TO_NUMERIC_32: NodeId = NodeId(18);
    pub const CONVERT_SERIAL_TO_NUMERIC_64: NodeId = NodeId(19);
    pub const TRANSPOSE: NodeId = NodeId(20);
}

pub mod graphs {
    use crate::graph::GraphId;

    /// The only terminal graph.
    pub const STORE: GraphId = GraphId(0);
    pub const ENTROPY: GraphId = GraphId(1);
    pub const HUFFMAN: GraphId = GraphId(2);
    pub const RANS: GraphId = GraphId(3);
    pub const BITPACK: GraphId = GraphId(4);
    pub const CONSTANT: GraphId = GraphId(5);
    pub const ZSTD: GraphId = GraphId(6);
    pub const ZIGZAG_ENTROPY: GraphId = GraphId(7);
    pub const DELTA_ZIGZAG_ENTROPY: GraphId = GraphId(8);
    pub const RLE_ENTROPY: GraphId = GraphId(9);
    pub const DICTIONARY_ENTROPY: GraphId = GraphId(10);
    /// Brute force over entropy, delta+zigzag+entropy and rle.
    pub const NUMERIC: GraphId = GraphId(11);
    /// Brute force over zstd and entropy.
    pub const SERIAL: GraphId = GraphId(12);
    pub const STRUCT_ZSTD: GraphId = GraphId(13);
    pub const STRING: GraphId = GraphId(14);
    /// Byte planes of a struct stream, then zstd.
    pub const TRANSPOSE_ZSTD: GraphId = GraphId(15);
    /// Brute force over struct_zstd and transpose_zstd.
    pub const STRUCT: GraphId = GraphId(16);
    /// Dispatches on stream type. Also the permissive fallback.
    pub const GENERIC: GraphId = GraphId(17);
}

//==================================================================================
// 2. Type Dispatch
//==================================================================================

/// Routes each stream to the candidate at its type's tag position:
/// `[serial, struct, numeric, string]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeDispatch;

impl Selector for TypeDispatch {
    fn select(&self, input: &StreamView<'_>, _candidates: &[GraphId], _params: &LocalParams) -> Result<usize> {
        Ok(input.stream_type().tag() as usize)
    }
}

//==================================================================================
// 3. Installation
//==================================================================================

pub(crate) fn install(c: &mut Compressor) {
    use graphs::*;

    let push_standard = |c: &mut Compressor, id: u32| {
        if let Some(reg) = c.transforms().get(TransformId(id)).cloned() {
            let name = reg.descriptor.name.clone();
            c.push_node(Some(name), reg.descriptor, reg.transform, LocalParams::new(), None);
        }
    };
    // Standard transforms up to split_blocks become nodes 0..=12, in wire-id order.
    for id in 1..=crate::transform::standard::SPLIT_BLOCKS {
        push_standard(c, id);
    }

    let entropy_clone = |c: &mut Compressor, name: &str, mask: StrategyMask| {
        clone_standard(c, nodes::ENTROPY, name, LocalParams::new().with_int(param::ENTROPY_MASK, mask.bits() as i64));
    };
    entropy_clone(c, "huffman", StrategyMask::only(&[Strategy::Huffman]));
    entropy_clone(c, "rans", StrategyMask::only(&[Strategy::Rans]));
    entropy_clone(c, "bitpack", StrategyMask::only(&[Strategy::BitPack]));
    entropy_clone(c, "constant", StrategyMask::only(&[Strategy::Constant]));
    for (name, width) in [
        ("convert_serial_to_numeric_16", 2),
        ("convert_serial_to_numeric_32", 4),
        ("convert_serial_to_numeric_64", 8),
    ] {
        clone_standard(
            c,
            nodes::CONVERT_SERIAL_TO_NUMERIC,
            name,
            LocalParams::new().with_int(param::ELT_WIDTH, width),
        );
    }
    push_standard(c, crate::transform::standard::TRANSPOSE);
    debug_assert_eq!(c.nodes().len(), nodes::TRANSPOSE.index() + 1);

    let graph = |c: &mut Compressor, name: &str, kind: GraphKind, depth: usize| {
        c.push_graph(Some(name.to_string()), kind, LocalParams::new(), None, depth);
    };
    let stat = |head: NodeId, successors: &[GraphId]| GraphKind::Static {
        head,
        successors: successors.to_vec(),
    };
    graph(c, "store", GraphKind::Store, 0);
    graph(c, "entropy", stat(nodes::ENTROPY, &[STORE]), 0);
    graph(c, "huffman", stat(nodes::HUFFMAN, &[STORE]), 0);
    graph(c, "rans", stat(nodes::RANS, &[STORE]), 0);
    graph(c, "bitpack", stat(nodes::BITPACK, &[STORE]), 0);
    graph(c, "constant", stat(nodes::CONSTANT, &[STORE]), 0);
    graph(c, "zstd", stat(nodes::ZSTD, &[STORE]), 0);
    graph(c, "zigzag_entropy", stat(nodes::ZIGZAG, &[ENTROPY]), 0);
    graph(c, "delta_zigzag_entropy", stat(nodes::DELTA_INT, &[ZIGZAG_ENTROPY]), 0);
    graph(c, "rle_entropy", stat(nodes::RLE, &[ENTROPY, ENTROPY]), 0);
    graph(c, "dictionary_entropy", stat(nodes::DICTIONARY, &[ENTROPY, ENTROPY]), 0);
    graph(
        c,
        "numeric",
        GraphKind::Selector {
            policy: SelectorPolicy::BruteForce,
            candidates: vec![ENTROPY, DELTA_ZIGZAG_ENTROPY, RLE_ENTROPY],
        },
        1,
    );
    graph(
        c,
        "serial",
        GraphKind::Selector {
            policy: SelectorPolicy::BruteForce,
            candidates: vec![ZSTD, ENTROPY],
        },
        1,
    );
    graph(c, "struct_zstd", stat(nodes::CONVERT_STRUCT_TO_SERIAL, &[ZSTD]), 0);
    graph(c, "string", stat(nodes::SEPARATE_STRING_COMPONENTS, &[SERIAL, NUMERIC]), 1);
    graph(c, "transpose_zstd", stat(nodes::TRANSPOSE, &[STRUCT_ZSTD]), 0);
    graph(
        c,
        "struct",
        GraphKind::Selector {
            policy: SelectorPolicy::BruteForce,
            candidates: vec![STRUCT_ZSTD, TRANSPOSE_ZSTD],
        },
        1,
    );
    graph(
        c,
        "generic",
        GraphKind::Selector {
            policy: SelectorPolicy::External(Arc::new(TypeDispatch)),
            candidates: vec![SERIAL, STRUCT, NUMERIC, STRING],
        },
        1,
    );
    debug_assert_eq!(c.graphs().len(), GENERIC.index() + 1);
}

fn clone_standard(c: &mut Compressor, base: NodeId, name: &str, params: LocalParams) {
    if let Some(entry) = c.node(base).cloned() {
        let merged = entry.local_params.merged_with(&params);
        c.push_node(Some(name.to_string()), entry.descriptor, entry.transform, merged, Some(base));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::registry::GraphKind;

    #[test]
    fn test_node_constants_match_names() {
        let c = Compressor::new();
        let expect = [
            (nodes::DELTA_INT, "delta_int"),
            (nodes::ENTROPY, "entropy"),
            (nodes::ZSTD, "zstd"),
            (nodes::SPLIT_BLOCKS, "split_blocks"),
            (nodes::HUFFMAN, "huffman"),
            (nodes::CONSTANT, "constant"),
            (nodes::CONVERT_SERIAL_TO_NUMERIC_64, "convert_serial_to_numeric_64"),
            (nodes::TRANSPOSE, "transpose"),
        ];
        for (id, name) in expect {
            assert_eq!(c.node_by_name(name), Some(id), "{}", name);
        }
        assert_eq!(c.node(nodes::HUFFMAN).unwrap().base(), Some(nodes::ENTROPY));
        assert_eq!(
            c.node(nodes::CONVERT_SERIAL_TO_NUMERIC_32).unwrap().local_params().int(param::ELT_WIDTH),
            Some(4)
        );
    }

    #[test]
    fn test_graph_constants_match_names_and_validate() {
        let c = Compressor::new();
        let expect = [
            (graphs::STORE, "store"),
            (graphs::ENTROPY, "entropy"),
            (graphs::NUMERIC, "numeric"),
            (graphs::STRING, "string"),
            (graphs::TRANSPOSE_ZSTD, "transpose_zstd"),
            (graphs::STRUCT, "struct"),
            (graphs::GENERIC, "generic"),
        ];
        for (id, name) in expect {
            assert_eq!(c.graph_by_name(name), Some(id), "{}", name);
        }

        // Every installed graph passes the checks user graphs go through, with
        // the recorded speculation depth.
        let mut fresh = Compressor::new();
        for g in c.graphs() {
            if let GraphKind::Store = g.kind() {
                continue;
            }
            let id = fresh
                .parameterize_graph(g.id(), crate::graph::GraphParameters::default())
                .unwrap();
            assert_eq!(fresh.graph(id).unwrap().speculation_depth, g.speculation_depth, "{}", g.label());
        }
    }

    #[test]
    fn test_type_dispatch_follows_tags() {
        let c = Compressor::new();
        let GraphKind::Selector { candidates, .. } = c.graph(graphs::GENERIC).unwrap().kind().clone() else {
            panic!("generic must be a selector");
        };
        let values = [1u32, 2];
        let view = StreamView::numeric(&values).unwrap();
        let pick = TypeDispatch.select(&view, &candidates, &LocalParams::new()).unwrap();
        assert_eq!(candidates[pick], graphs::NUMERIC);
        let pick = TypeDispatch
            .select(&StreamView::serial(b"x"), &candidates, &LocalParams::new())
            .unwrap();
        assert_eq!(candidates[pick], graphs::SERIAL);
    }
}
