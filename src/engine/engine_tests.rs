//! End-to-end compression and decompression through the standard graphs.

use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::config::{CParam, DParam};
use crate::error::{ErrorKind, Result};
use crate::frame::frame_info;
use crate::graph::{
    graphs, nodes, Compressor, GraphId, GraphParameters, LocalParams, Selector, SelectorDesc,
    StaticGraphDesc,
};
use crate::observability::{CollectingSink, Event};
use crate::transform::standard::{encode_segment_sizes, param};
use crate::transform::{OutputSpec, PipeTransform, Transform, TransformContext, TransformDescriptor};
use crate::types::{StreamType, StreamView, TypeMask, TypedBuffer};

//==================================================================================
// Helpers
//==================================================================================

fn compressor(start: GraphId) -> Arc<Compressor> {
    let mut c = Compressor::new();
    c.select_starting_graph(start).unwrap();
    Arc::new(c)
}

fn cctx_for(c: &Arc<Compressor>) -> CCtx {
    let mut cctx = CCtx::new();
    cctx.ref_compressor(Arc::clone(c));
    cctx
}

fn roundtrip(c: &Arc<Compressor>, inputs: &[StreamView<'_>]) -> (Vec<u8>, Vec<TypedBuffer>) {
    let frame = cctx_for(c).compress(inputs).unwrap();
    let out = DCtx::from_compressor(c).decompress(&frame).unwrap();
    (frame, out)
}

fn assert_same(inputs: &[StreamView<'_>], outputs: &[TypedBuffer]) {
    assert_eq!(inputs.len(), outputs.len());
    for (i, (a, b)) in inputs.iter().zip(outputs).enumerate() {
        assert_eq!(*a, b.view(), "stream {} differs", i);
    }
}

fn timestamps(n: usize) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(11);
    let mut t = 1_700_000_000u32;
    (0..n)
        .map(|_| {
            t += rng.random_range(1..40);
            t
        })
        .collect()
}

//==================================================================================
// Round Trips
//==================================================================================

#[test]
fn test_generic_roundtrip_every_stream_type() {
    let c = compressor(graphs::GENERIC);
    let mut rng = StdRng::seed_from_u64(3);

    let text: Vec<u8> = b"graph engines route streams; ".iter().cycle().take(5000).copied().collect();
    let small: Vec<u8> = (0..3000).map(|_| rng.random_range(0..16)).collect();
    let wide: Vec<u64> = (0..1000).map(|_| rng.random::<u64>() >> rng.random_range(0..64)).collect();
    let halves: Vec<u16> = (0..2000).map(|i| (i % 50) as u16).collect();
    let records: Vec<u8> = (0..600).map(|i| (i % 7) as u8).collect();
    let words = ["alpha", "beta", "", "gamma", "alpha", "delta"];
    let content: Vec<u8> = words.iter().cycle().take(400).flat_map(|w| w.bytes()).collect();
    let lens: Vec<u32> = words.iter().cycle().take(400).map(|w| w.len() as u32).collect();
    let ts = timestamps(4000);

    let cases: Vec<StreamView<'_>> = vec![
        StreamView::serial(&text),
        StreamView::numeric(&small).unwrap(),
        StreamView::numeric(&halves).unwrap(),
        StreamView::numeric(&ts).unwrap(),
        StreamView::numeric(&wide).unwrap(),
        StreamView::structs(3, &records).unwrap(),
        StreamView::strings(&content, &lens).unwrap(),
    ];
    for input in cases {
        let (frame, out) = roundtrip(&c, &[input]);
        assert_same(&[input], &out);
        assert!(frame.len() < input.content_size() + 64, "{} stream did not shrink", input.stream_type());
    }
}

#[test]
fn test_zero_length_inputs() {
    let empty_u32: [u32; 0] = [];
    let empty_u64: [u64; 0] = [];
    let inputs = [
        StreamView::serial(&[]),
        StreamView::numeric(&empty_u32).unwrap(),
        StreamView::numeric(&empty_u64).unwrap(),
        StreamView::structs(5, &[]).unwrap(),
        StreamView::strings(&[], &[]).unwrap(),
    ];
    // Under the default minimum size these are stored; with a zero minimum
    // every graph runs on them.
    for min_size in [None, Some(0)] {
        let mut c = Compressor::new();
        c.select_starting_graph(graphs::GENERIC).unwrap();
        if let Some(m) = min_size {
            c.set_parameter(CParam::MinStreamSize, m).unwrap();
        }
        let c = Arc::new(c);
        for input in inputs {
            let (_, out) = roundtrip(&c, &[input]);
            assert_same(&[input], &out);
        }
    }
}

#[test]
fn test_every_transform_shape_roundtrips() {
    let mut c = Compressor::new();
    c.set_parameter(CParam::MinStreamSize, 0).unwrap();

    let segments = c
        .register_static_graph(
            StaticGraphDesc::new(nodes::SPLIT_BY_SIZE, [graphs::NUMERIC, graphs::GENERIC])
                .with_params(LocalParams::new().with_blob(param::SEGMENT_SIZES, encode_segment_sizes(&[100, 1])))
                .named("segments"),
        )
        .unwrap();
    let blocks = c
        .register_static_graph(
            StaticGraphDesc::new(nodes::SPLIT_BLOCKS, [graphs::STORE, graphs::NUMERIC])
                .with_params(LocalParams::new().with_int(param::BLOCK_SIZE, 256)),
        )
        .unwrap();
    let shapes = [
        ("pipe", graphs::ZSTD),
        ("typed", graphs::DELTA_ZIGZAG_ENTROPY),
        ("typed", graphs::RLE_ENTROPY),
        ("typed", graphs::DICTIONARY_ENTROPY),
        ("variable output", segments),
        ("split", blocks),
    ];
    let c = Arc::new(c);

    let ts = timestamps(1000);
    let ts_bytes: Vec<u8> = ts.iter().flat_map(|v| v.to_le_bytes()).collect();
    let empty: [u32; 0] = [];
    for (shape, graph) in shapes {
        let mut with_start = (*c).clone();
        with_start.select_starting_graph(graph).unwrap();
        let with_start = Arc::new(with_start);

        let input = if graph == graphs::ZSTD {
            StreamView::serial(&ts_bytes)
        } else {
            StreamView::numeric(&ts).unwrap()
        };
        let frame = cctx_for(&with_start).compress(&[input]).unwrap();
        let out = DCtx::new().decompress(&frame).unwrap();
        assert_eq!(out[0].view(), input, "{} shape", shape);

        // Fixed segment sizes cannot cut an empty stream.
        if graph == segments {
            continue;
        }
        let empty_input = if graph == graphs::ZSTD {
            StreamView::serial(&[])
        } else {
            StreamView::numeric(&empty).unwrap()
        };
        let (_, out) = roundtrip(&with_start, &[empty_input]);
        assert_eq!(out[0].view(), empty_input, "{} shape, empty input", shape);
    }
}

#[test]
fn test_serial_conversion_then_numeric_graph() {
    let mut c = Compressor::new();
    let g = c
        .register_static_graph(StaticGraphDesc::new(nodes::CONVERT_SERIAL_TO_NUMERIC_32, [graphs::NUMERIC]))
        .unwrap();
    c.select_starting_graph(g).unwrap();
    let c = Arc::new(c);

    let bytes: Vec<u8> = timestamps(500).iter().flat_map(|v| v.to_le_bytes()).collect();
    let (frame, out) = roundtrip(&c, &[StreamView::serial(&bytes)]);
    assert_eq!(out[0].data(), &bytes[..]);
    assert!(frame.len() < bytes.len() / 2);

    // 4-byte elements cannot tile 13 bytes.
    let err = cctx_for(&c).compress_serial(&[1u8; 13]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputTypeUnsupported);
}

#[test]
fn test_multiple_inputs_share_one_frame() {
    let c = compressor(graphs::GENERIC);
    let ts = timestamps(800);
    let text = b"one frame, many streams".repeat(40);
    let inputs = [StreamView::numeric(&ts).unwrap(), StreamView::serial(&text)];
    let (frame, out) = roundtrip(&c, &inputs);
    assert_same(&inputs, &out);

    let info = frame_info(&frame).unwrap();
    assert_eq!(info.nb_outputs(), 2);
    assert_eq!(info.decompressed_size, ts.len() * 4 + text.len());
    assert_eq!(info.outputs[0].stream_type, StreamType::Numeric);
}

//==================================================================================
// Selectors
//==================================================================================

#[test]
fn test_brute_force_picks_smallest_candidate() {
    let mut rng = StdRng::seed_from_u64(5);
    let noisy: Vec<u32> = (0..3000).map(|_| rng.random_range(0..1000)).collect();
    let runs: Vec<u32> = (0..3000).map(|i| (i / 300) as u32).collect();
    let ts = timestamps(3000);

    let candidates = [graphs::ENTROPY, graphs::DELTA_ZIGZAG_ENTROPY, graphs::RLE_ENTROPY];
    for data in [&noisy, &runs, &ts] {
        let input = [StreamView::numeric(data).unwrap()];
        let direct: Vec<usize> = candidates
            .iter()
            .map(|&g| cctx_for(&compressor(g)).compress(&input).unwrap().len())
            .collect();
        let chosen = cctx_for(&compressor(graphs::NUMERIC)).compress(&input).unwrap();
        assert_eq!(chosen.len(), *direct.iter().min().unwrap());
    }
}

#[test]
fn test_struct_streams_try_byte_planes() {
    // 12-byte records: a u64 timestamp and a u32 sensor id from a small set.
    let ts = timestamps(2000);
    let records: Vec<u8> = ts
        .iter()
        .enumerate()
        .flat_map(|(i, &t)| {
            let mut row = (t as u64 * 1000).to_le_bytes().to_vec();
            row.extend_from_slice(&(40 + (i % 3) as u32).to_le_bytes());
            row
        })
        .collect();
    let input = [StreamView::structs(12, &records).unwrap()];

    let interleaved = cctx_for(&compressor(graphs::STRUCT_ZSTD)).compress(&input).unwrap();
    let (planar, out) = roundtrip(&compressor(graphs::TRANSPOSE_ZSTD), &input);
    assert_same(&input, &out);
    assert!(planar.len() < records.len() / 2);

    let sink = Arc::new(CollectingSink::new());
    let c = compressor(graphs::GENERIC);
    let mut cctx = cctx_for(&c);
    cctx.set_diagnostic_sink(sink.clone());
    let chosen = cctx.compress(&input).unwrap();
    assert_eq!(chosen.len(), interleaved.len().min(planar.len()));
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, Event::GraphEntered { graph, .. } if graph == "struct")));
    assert_same(&input, &DCtx::new().decompress(&chosen).unwrap());
}

struct Fixed(usize);

impl Selector for Fixed {
    fn select(&self, _input: &StreamView<'_>, _candidates: &[GraphId], _params: &LocalParams) -> Result<usize> {
        Ok(self.0)
    }
}

#[test]
fn test_external_selector_routes_without_speculation() {
    let mut c = Compressor::new();
    let good = c
        .register_selector_graph(SelectorDesc::external(Arc::new(Fixed(1)), [graphs::STORE, graphs::ZSTD]))
        .unwrap();
    let bad = c
        .register_selector_graph(SelectorDesc::external(Arc::new(Fixed(2)), [graphs::STORE, graphs::ZSTD]))
        .unwrap();
    let data = b"routing by index ".repeat(100);

    c.select_starting_graph(good).unwrap();
    let sink = Arc::new(CollectingSink::new());
    let mut cctx = cctx_for(&Arc::new(c.clone()));
    cctx.set_diagnostic_sink(sink.clone());
    let frame = cctx.compress_serial(&data).unwrap();
    assert_eq!(DCtx::new().decompress_serial(&frame).unwrap(), data);
    let events = sink.events();
    assert!(events.contains(&Event::SelectorChoice {
        graph: good.to_string(),
        candidate: "zstd".into(),
    }));
    assert!(!events.iter().any(|e| matches!(e, Event::SelectorTrial { .. })));

    c.select_starting_graph(bad).unwrap();
    let err = cctx_for(&Arc::new(c)).compress_serial(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SuccessorInvalid);
}

//==================================================================================
// Permissive Mode and Errors
//==================================================================================

#[test]
fn test_permissive_mode_falls_back_with_warning() {
    let data: Vec<u32> = (0..500).collect();
    let input = [StreamView::numeric(&data).unwrap()];
    let c = compressor(graphs::CONSTANT);

    let err = cctx_for(&c).compress(&input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformExecutionFailure);

    let mut cctx = cctx_for(&c);
    cctx.set_parameter(CParam::PermissiveCompression, 1).unwrap();
    let frame = cctx.compress(&input).unwrap();
    assert_eq!(cctx.warnings().len(), 1);
    assert_eq!(cctx.warnings()[0].kind, ErrorKind::TransformExecutionFailure);
    assert_eq!(cctx.warnings()[0].location, "constant");

    let out = DCtx::new().decompress(&frame).unwrap();
    assert_same(&input, &out);
}

#[test]
fn test_node_version_gating_on_compression() {
    let mut c = Compressor::new();
    let g = c
        .register_static_graph(StaticGraphDesc::new(nodes::SPLIT_BY_SIZE, [graphs::NUMERIC, graphs::GENERIC]))
        .unwrap();
    c.select_starting_graph(g).unwrap();
    c.set_parameter(CParam::FormatVersion, 1).unwrap();
    let c = Arc::new(c);
    let ts = timestamps(400);
    let input = [StreamView::numeric(&ts).unwrap()];

    let err = cctx_for(&c).compress(&input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NodeVersionMismatch);

    let mut cctx = cctx_for(&c);
    cctx.set_parameter(CParam::PermissiveCompression, 1).unwrap();
    let frame = cctx.compress(&input).unwrap();
    assert_eq!(cctx.warnings()[0].kind, ErrorKind::NodeVersionMismatch);
    assert_eq!(frame_info(&frame).unwrap().format_version, 1);
    assert_same(&input, &DCtx::new().decompress(&frame).unwrap());
}

#[test]
fn test_unusable_contexts_fail_before_touching_data() {
    let mut cctx = CCtx::new();
    assert_eq!(cctx.compress_serial(b"abc").unwrap_err().kind(), ErrorKind::GraphInvalid);

    cctx.ref_compressor(Arc::new(Compressor::new()));
    assert_eq!(cctx.compress_serial(b"abc").unwrap_err().kind(), ErrorKind::GraphInvalid);

    let mut cctx = cctx_for(&compressor(graphs::GENERIC));
    assert_eq!(cctx.compress(&[]).unwrap_err().kind(), ErrorKind::SrcSizeTooSmall);
}

#[test]
fn test_memory_limit_is_enforced() {
    let c = compressor(graphs::ZSTD);
    let mut rng = StdRng::seed_from_u64(9);
    let data: Vec<u8> = (0..10_000).map(|_| rng.random()).collect();
    let mut cctx = cctx_for(&c);
    cctx.set_memory_limit(16);
    assert_eq!(cctx.compress_serial(&data).unwrap_err().kind(), ErrorKind::Allocation);
    cctx.set_memory_limit(DEFAULT_MEMORY_LIMIT);
    assert!(cctx.compress_serial(&data).is_ok());
}

#[test]
fn test_compress_into_checks_capacity() {
    let c = compressor(graphs::GENERIC);
    let data = b"bounded output ".repeat(50);
    let mut cctx = cctx_for(&c);

    let mut dst = vec![0u8; crate::frame::compress_bound(data.len())];
    let n = cctx.compress_into(&[StreamView::serial(&data)], &mut dst).unwrap();
    assert_eq!(DCtx::new().decompress_serial(&dst[..n]).unwrap(), data);

    let mut tiny = [0u8; 8];
    let err = cctx.compress_into(&[StreamView::serial(&data)], &mut tiny).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DstCapacityTooSmall);

    let mut exact = vec![0u8; n];
    assert_eq!(cctx.compress_into(&[StreamView::serial(&data)], &mut exact).unwrap(), n);
    assert_eq!(exact, &dst[..n]);

    let mut short = vec![0u8; n - 1];
    let err = cctx.compress_into(&[StreamView::serial(&data)], &mut short).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DstCapacityTooSmall);
    assert!(err.to_string().contains(&format!("fit in {} bytes", n - 1)), "{}", err);
}

//==================================================================================
// Parameters and Sharing
//==================================================================================

#[test]
fn test_parameters_reset_unless_sticky() {
    let c = compressor(graphs::GENERIC);
    let data = b"sticky or not ".repeat(20);
    let mut cctx = cctx_for(&c);

    cctx.set_parameter(CParam::ContentChecksum, 0).unwrap();
    assert_eq!(cctx.get_parameter(CParam::ContentChecksum), 0);
    let first = cctx.compress_serial(&data).unwrap();
    let second = cctx.compress_serial(&data).unwrap();
    assert!(!frame_info(&first).unwrap().has_content_checksum);
    assert!(frame_info(&second).unwrap().has_content_checksum);

    cctx.set_parameter(CParam::StickyParameters, 1).unwrap();
    cctx.set_parameter(CParam::ContentChecksum, 0).unwrap();
    for _ in 0..2 {
        let frame = cctx.compress_serial(&data).unwrap();
        assert!(!frame_info(&frame).unwrap().has_content_checksum);
    }
    cctx.reset_parameters();
    assert_eq!(cctx.get_parameter(CParam::ContentChecksum), 1);

    let mut dctx = DCtx::new();
    dctx.set_parameter(DParam::StickyParameters, 1).unwrap();
    dctx.set_parameter(DParam::CheckContentChecksum, 0).unwrap();
    dctx.decompress(&second).unwrap();
    assert_eq!(dctx.get_parameter(DParam::CheckContentChecksum), 0);
}

#[test]
fn test_compressor_level_parameters_are_layered() {
    let mut c = Compressor::new();
    c.select_starting_graph(graphs::GENERIC).unwrap();
    c.set_parameter(CParam::CompressedChecksum, 0).unwrap();
    let c = Arc::new(c);
    let mut cctx = cctx_for(&c);
    assert_eq!(cctx.get_parameter(CParam::CompressedChecksum), 0);

    let frame = cctx.compress_serial(b"layered parameters").unwrap();
    assert!(!frame_info(&frame).unwrap().has_compressed_checksum);

    cctx.set_parameter(CParam::CompressedChecksum, 1).unwrap();
    let frame = cctx.compress_serial(b"layered parameters").unwrap();
    assert!(frame_info(&frame).unwrap().has_compressed_checksum);
}

#[test]
fn test_shared_compressor_across_threads() {
    let c = compressor(graphs::GENERIC);
    let handles: Vec<_> = (0..4u32)
        .map(|seed| {
            let c = Arc::clone(&c);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed as u64);
                let data: Vec<u32> = (0..2000).map(|_| rng.random_range(0..(seed + 1) * 100)).collect();
                let mut cctx = CCtx::new();
                cctx.ref_compressor(Arc::clone(&c));
                let frame = cctx.compress(&[StreamView::numeric(&data).unwrap()]).unwrap();
                let out = DCtx::from_compressor(&c).decompress(&frame).unwrap();
                assert_eq!(out[0].to_vec::<u32>().unwrap(), data);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_diagnostic_events_cover_the_call() {
    let c = compressor(graphs::GENERIC);
    let sink = Arc::new(CollectingSink::new());
    let mut cctx = cctx_for(&c);
    cctx.set_diagnostic_sink(sink.clone());
    let ts = timestamps(1000);
    let frame = cctx.compress(&[StreamView::numeric(&ts).unwrap()]).unwrap();

    let events = sink.events();
    assert!(events.iter().any(|e| matches!(e, Event::GraphEntered { graph, .. } if graph == "generic")));
    assert_eq!(
        events.iter().filter(|e| matches!(e, Event::SelectorTrial { graph, .. } if graph == "numeric")).count(),
        3
    );
    assert!(events.iter().any(|e| matches!(e, Event::NodeExecuted { node, .. } if node == "delta_int")));
    assert_eq!(
        events.last(),
        Some(&Event::FrameWritten {
            format_version: crate::frame::MAX_FORMAT_VERSION,
            nb_inputs: 1,
            frame_size: frame.len(),
        })
    );
}

//==================================================================================
// Custom Transforms
//==================================================================================

struct Reverse;

impl PipeTransform for Reverse {
    fn encoded_bound(&self, src_size: usize) -> usize {
        src_size
    }

    fn encode(&self, src: &[u8], dst: &mut [u8], _ctx: &TransformContext<'_>) -> Result<usize> {
        Ok(reverse_into(src, dst))
    }

    fn decoded_size(&self, src: &[u8]) -> Result<usize> {
        Ok(src.len())
    }

    fn decode(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        Ok(reverse_into(src, dst))
    }
}

fn reverse_into(src: &[u8], dst: &mut [u8]) -> usize {
    for (d, s) in dst.iter_mut().zip(src.iter().rev()) {
        *d = *s;
    }
    src.len()
}

fn reverse_descriptor() -> TransformDescriptor {
    TransformDescriptor::new(300, "reverse", TypeMask::SERIAL).with_output(OutputSpec::serial())
}

#[test]
fn test_custom_transform_needs_a_matching_decoder() {
    let mut c = Compressor::new();
    let node = c.register_pipe_transform(reverse_descriptor(), Reverse).unwrap();
    let g = c
        .register_static_graph(StaticGraphDesc::new(node, [graphs::SERIAL]))
        .unwrap();
    c.select_starting_graph(g).unwrap();
    let c = Arc::new(c);

    let data = b"custom transforms travel by wire id".repeat(10);
    let frame = cctx_for(&c).compress_serial(&data).unwrap();

    let err = DCtx::new().decompress(&frame).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corruption);

    assert_eq!(DCtx::from_compressor(&c).decompress_serial(&frame).unwrap(), data);

    let mut dctx = DCtx::new();
    dctx.register_transform(reverse_descriptor(), Transform::Pipe(Arc::new(Reverse)))
        .unwrap();
    assert_eq!(dctx.decompress_serial(&frame).unwrap(), data);
    let err = dctx
        .register_transform(reverse_descriptor(), Transform::Pipe(Arc::new(Reverse)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NodeDefinitionInvalid);
}

#[test]
fn test_parameterized_graph_changes_routing() {
    let mut c = Compressor::new();
    let g = c
        .parameterize_graph(
            graphs::RLE_ENTROPY,
            GraphParameters {
                name: Some("rle_stored".into()),
                successors: Some(vec![graphs::STORE, graphs::STORE]),
                local_params: None,
            },
        )
        .unwrap();
    c.select_starting_graph(g).unwrap();
    let c = Arc::new(c);

    let data: Vec<u16> = (0..1000).map(|i| (i / 100) as u16).collect();
    let (frame, out) = roundtrip(&c, &[StreamView::numeric(&data).unwrap()]);
    assert_eq!(out[0].to_vec::<u16>().unwrap(), data);
    // Ten runs, stored raw.
    assert!(frame.len() < 200);
}
