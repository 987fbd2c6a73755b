//! Function graphs driving the engine through `GraphContext`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::error::{ErrorKind, Result};
use crate::graph::{graphs, nodes, Compressor, FunctionGraph, FunctionGraphDesc, GraphId, LocalParams};
use crate::observability::{CollectingSink, Event};
use crate::types::{StreamType, StreamView, TypeMask};

const MIN_ELTS: i32 = 100;

/// Deltas numeric streams ahead of the numeric selector and stores the rest.
/// Numeric streams shorter than the `MIN_ELTS` parameter are stored too.
struct Router {
    seen: AtomicUsize,
}

impl FunctionGraph for Router {
    fn build(&self, ctx: &mut GraphContext<'_>, inputs: &[Edge]) -> Result<()> {
        self.seen.fetch_add(inputs.len(), Ordering::Relaxed);
        let min = ctx.local_params().int(MIN_ELTS).unwrap_or(0) as usize;
        for &edge in inputs {
            let view = ctx.view(edge)?;
            if view.stream_type() == StreamType::Numeric && view.nb_elts() >= min {
                let outs = ctx.run_node(nodes::DELTA_INT, edge)?;
                for out in outs {
                    ctx.set_destination(out, graphs::NUMERIC)?;
                }
            } else {
                ctx.set_destination(edge, graphs::STORE)?;
            }
        }
        Ok(())
    }
}

fn router_compressor(router: Arc<Router>, params: LocalParams) -> Arc<Compressor> {
    let mut c = Compressor::new();
    let g = c
        .register_function_graph(
            FunctionGraphDesc::new(router)
                .named("router")
                .with_graphs([graphs::NUMERIC])
                .with_nodes([nodes::DELTA_INT])
                .with_params(params),
        )
        .unwrap();
    c.select_starting_graph(g).unwrap();
    Arc::new(c)
}

fn compress_with(c: &Arc<Compressor>, inputs: &[StreamView<'_>]) -> Result<Vec<u8>> {
    let mut cctx = CCtx::new();
    cctx.ref_compressor(Arc::clone(c));
    cctx.compress(inputs)
}

#[test]
fn test_function_graph_receives_every_input_and_roundtrips() {
    let router = Arc::new(Router { seen: AtomicUsize::new(0) });
    let c = router_compressor(Arc::clone(&router), LocalParams::new());

    let counter: Vec<u32> = (0..2000).map(|i| 5000 + 3 * i).collect();
    let text = b"stored as is".to_vec();
    let inputs = [StreamView::numeric(&counter).unwrap(), StreamView::serial(&text)];
    let frame = compress_with(&c, &inputs).unwrap();
    assert_eq!(router.seen.load(Ordering::Relaxed), 2);
    assert!(frame.len() < counter.len());

    let out = DCtx::new().decompress(&frame).unwrap();
    assert_eq!(out[0].to_vec::<u32>().unwrap(), counter);
    assert_eq!(out[1].data(), &text[..]);
}

#[test]
fn test_function_graph_reads_its_local_params() {
    let router = Arc::new(Router { seen: AtomicUsize::new(0) });
    let c = router_compressor(router, LocalParams::new().with_int(MIN_ELTS, 10_000));
    let values: Vec<u16> = (0..500).collect();

    let sink = Arc::new(CollectingSink::new());
    let mut cctx = CCtx::new();
    cctx.ref_compressor(Arc::clone(&c));
    cctx.set_diagnostic_sink(sink.clone());
    let frame = cctx.compress(&[StreamView::numeric(&values).unwrap()]).unwrap();

    // Below the threshold: no node runs, the stream is stored.
    assert!(!sink.events().iter().any(|e| matches!(e, Event::NodeExecuted { .. })));
    assert!(frame.len() > values.len() * 2);
    let out = DCtx::new().decompress(&frame).unwrap();
    assert_eq!(out[0].to_vec::<u16>().unwrap(), values);
}

#[test]
fn test_function_graph_input_mask() {
    let router = Arc::new(Router { seen: AtomicUsize::new(0) });
    let mut c = Compressor::new();
    let g = c
        .register_function_graph(
            FunctionGraphDesc::new(router)
                .with_input_mask(TypeMask::NUMERIC)
                .with_nodes([nodes::DELTA_INT])
                .with_graphs([graphs::NUMERIC]),
        )
        .unwrap();
    c.select_starting_graph(g).unwrap();
    let err = compress_with(&Arc::new(c), &[StreamView::serial(b"not numeric at all")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputTypeUnsupported);
}

/// Misbehaves in one of several ways, chosen at construction.
enum Broken {
    LeavesEdge,
    UndeclaredNode,
    UndeclaredGraph,
    ConsumesTwice,
}

impl FunctionGraph for Broken {
    fn build(&self, ctx: &mut GraphContext<'_>, inputs: &[Edge]) -> Result<()> {
        let edge = inputs[0];
        match self {
            Broken::LeavesEdge => Ok(()),
            Broken::UndeclaredNode => ctx.run_node(nodes::ZIGZAG, edge).map(|_| ()),
            Broken::UndeclaredGraph => ctx.set_destination(edge, graphs::ZSTD),
            Broken::ConsumesTwice => {
                ctx.set_destination(edge, graphs::STORE)?;
                ctx.set_destination(edge, graphs::STORE)
            }
        }
    }
}

#[test]
fn test_function_graph_misuse_is_reported() {
    let values: Vec<u32> = (0..300).collect();
    let cases = [
        (Broken::LeavesEdge, ErrorKind::GraphInvalid),
        (Broken::UndeclaredNode, ErrorKind::NodeInvalid),
        (Broken::UndeclaredGraph, ErrorKind::SuccessorInvalid),
        (Broken::ConsumesTwice, ErrorKind::GraphInvalid),
    ];
    for (broken, expected) in cases {
        let mut c = Compressor::new();
        let g = c
            .register_function_graph(
                FunctionGraphDesc::new(Arc::new(broken))
                    .named("broken")
                    .with_nodes([nodes::DELTA_INT])
                    .with_graphs([graphs::NUMERIC]),
            )
            .unwrap();
        c.select_starting_graph(g).unwrap();
        let err = compress_with(&Arc::new(c), &[StreamView::numeric(&values).unwrap()]).unwrap_err();
        assert_eq!(err.kind(), expected, "{}", err);
    }
}

#[test]
fn test_function_graph_as_successor_gets_one_stream() {
    let router = Arc::new(Router { seen: AtomicUsize::new(0) });
    let mut c = Compressor::new();
    let g = c
        .register_function_graph(
            FunctionGraphDesc::new(Arc::clone(&router) as Arc<dyn FunctionGraph>)
                .with_nodes([nodes::DELTA_INT])
                .with_graphs([graphs::NUMERIC]),
        )
        .unwrap();
    // RLE yields two numeric streams; each enters the function graph alone.
    let rle: GraphId = c
        .register_static_graph(crate::graph::StaticGraphDesc::new(nodes::RLE, [g, g]))
        .unwrap();
    c.select_starting_graph(rle).unwrap();
    let c = Arc::new(c);

    let values: Vec<u32> = (0..4000).map(|i| i / 20).collect();
    let frame = compress_with(&c, &[StreamView::numeric(&values).unwrap()]).unwrap();
    assert_eq!(router.seen.load(Ordering::Relaxed), 2);
    let out = DCtx::from_compressor(&c).decompress(&frame).unwrap();
    assert_eq!(out[0].to_vec::<u32>().unwrap(), values);
}
