use super::*;
use crate::config::{CompressionParams, CompressionProfile};
use crate::error::ErrorKind;
use crate::types::{StreamType, TypedRef};

fn sensor_readings(n: usize) -> Vec<u16> {
    let mut value = 1_000i32;
    (0..n)
        .map(|i| {
            value += ((i * 7919) % 11) as i32 - 5;
            value as u16
        })
        .collect()
}

#[test]
fn test_serial_roundtrip() {
    let src = b"the bridge uses the generic graph. ".repeat(30);
    let frame = compress_serial(&src).unwrap();
    assert!(frame.len() < src.len() / 4);
    assert!(frame.len() <= compress_bound(src.len()));
    assert_eq!(decompress_serial(&frame).unwrap(), src);
}

#[test]
fn test_empty_serial_roundtrip() {
    let frame = compress_serial(&[]).unwrap();
    assert_eq!(frame_info(&frame).unwrap().decompressed_size, 0);
    assert!(decompress_serial(&frame).unwrap().is_empty());
}

#[test]
fn test_typed_roundtrip_mixed_inputs() {
    let readings = sensor_readings(5000);
    let ids: Vec<u64> = (0..800).map(|i| 9_000_000_000 + i).collect();
    let names = ["north", "south", "east", "west"];
    let content: Vec<u8> = names.iter().cycle().take(300).flat_map(|n| n.bytes()).collect();
    let lens: Vec<u32> = names.iter().cycle().take(300).map(|n| n.len() as u32).collect();
    let rows: Vec<u8> = (0..1200).map(|i| [1u8, 0, 0, 42][i % 4]).collect();

    let inputs = [
        TypedRef::numeric(&readings).unwrap(),
        TypedRef::numeric(&ids).unwrap(),
        TypedRef::strings(&content, &lens).unwrap(),
        TypedRef::structs(4, &rows).unwrap(),
    ];
    let frame = compress_typed(&inputs).unwrap();
    let raw: usize = inputs.iter().map(|i| i.content_size()).sum();
    assert!(frame.len() < raw / 3, "{} bytes from {}", frame.len(), raw);

    let out = decompress_typed(&frame).unwrap();
    assert_eq!(out[0].to_vec::<u16>().unwrap(), readings);
    assert_eq!(out[1].to_vec::<u64>().unwrap(), ids);
    assert_eq!(out[2].to_strings()[..4], [b"north".to_vec(), b"south".to_vec(), b"east".to_vec(), b"west".to_vec()]);
    assert_eq!(out[3].stream_type(), StreamType::Struct);
    assert_eq!(out[3].elt_width(), 4);
    assert_eq!(out[3].data(), &rows[..]);
}

#[test]
fn test_frame_info_before_decoding() {
    let readings = sensor_readings(1000);
    let frame = compress_typed(&[TypedRef::numeric(&readings).unwrap(), TypedRef::serial(b"tail")]).unwrap();
    let info = frame_info(&frame).unwrap();
    assert_eq!(info.nb_outputs(), 2);
    assert_eq!(info.decompressed_size, 2000 + 4);
    assert_eq!(info.outputs[0].elt_width, 2);
    assert_eq!(info.outputs[0].nb_elts, 1000);
    assert!(info.has_content_checksum && info.has_compressed_checksum);
}

#[test]
fn test_decompress_serial_rejects_typed_frames() {
    let readings = sensor_readings(100);
    let frame = compress_typed(&[TypedRef::numeric(&readings).unwrap()]).unwrap();
    let err = decompress_serial(&frame).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputTypeUnsupported);
    assert_eq!(decompress_typed(&frame).unwrap().len(), 1);
}

#[test]
fn test_compress_with_params() {
    let src: Vec<u8> = sensor_readings(4000).iter().flat_map(|v| v.to_le_bytes()).collect();
    let params = CompressionParams {
        profile: Some(CompressionProfile::Fast),
        content_checksum: Some(false),
        ..Default::default()
    };
    let frame = compress_serial_with(&src, &params).unwrap();
    assert!(!frame_info(&frame).unwrap().has_content_checksum);
    assert_eq!(decompress_serial(&frame).unwrap(), src);

    let bad = CompressionParams {
        compression_level: Some(40),
        ..Default::default()
    };
    assert_eq!(
        compress_serial_with(&src, &bad).unwrap_err().kind(),
        ErrorKind::ParameterInvalid
    );
}

#[test]
fn test_garbage_is_corruption() {
    for src in [&b""[..], b"TKGF", b"not a frame at all", &[0xFF; 64]] {
        assert_eq!(decompress_typed(src).unwrap_err().kind(), ErrorKind::Corruption);
    }
}

#[test]
fn test_default_compressor_is_shared() {
    let a = default_compressor();
    let b = default_compressor();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(a.start_graph(), Some(crate::graph::graphs::GENERIC));
}
