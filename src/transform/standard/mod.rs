// In: src/transform/standard/mod.rs

//! The built-in transforms every `Compressor` and `DCtx` starts with.
//!
//! Wire ids below 256 are reserved for this set and are part of the frame
//! format: changing one breaks every frame written before the change.

mod convert;
mod entropy;
mod numeric;
mod split;
mod strings;
mod tokenize;
mod transpose;
mod zstd;

use std::sync::Arc;

use crate::error::{Result, TambakError};
use crate::transform::{OutputSpec, Transform, TransformDescriptor};
use crate::types::{StreamType, StreamView, TypeMask};

pub use split::encode_sizes as encode_segment_sizes;

//==================================================================================
// 1. Wire Ids and Parameter Keys
//==================================================================================

pub const DELTA_INT: u32 = 1;
pub const ZIGZAG: u32 = 2;
pub const CONVERT_SERIAL_TO_NUMERIC: u32 = 3;
pub const CONVERT_NUMERIC_TO_SERIAL: u32 = 4;
pub const CONVERT_SERIAL_TO_STRUCT: u32 = 5;
pub const CONVERT_STRUCT_TO_SERIAL: u32 = 6;
pub const ENTROPY: u32 = 7;
pub const ZSTD: u32 = 8;
pub const RLE: u32 = 9;
pub const DICTIONARY: u32 = 10;
pub const SEPARATE_STRING_COMPONENTS: u32 = 11;
pub const SPLIT_BY_SIZE: u32 = 12;
pub const SPLIT_BLOCKS: u32 = 13;
pub const TRANSPOSE: u32 = 14;

/// Custom transforms must use ids at or above this value.
pub const FIRST_CUSTOM_ID: u32 = 256;

/// Local parameter keys understood by the standard transforms.
pub mod param {
    /// Element width produced by the serial-to-numeric and serial-to-struct conversions.
    pub const ELT_WIDTH: i32 = 1;
    /// `StrategyMask` bits the entropy node may choose from.
    pub const ENTROPY_MASK: i32 = 2;
    /// Block size in elements, for entropy heuristics and `split_blocks`.
    pub const BLOCK_SIZE: i32 = 3;
    /// Blob of varint segment sizes for `split_by_size`, or entropy split points.
    pub const SEGMENT_SIZES: i32 = 4;
    /// Overrides the zstd level, which otherwise follows the compression level.
    pub const ZSTD_LEVEL: i32 = 5;
}

//==================================================================================
// 2. The Standard Table
//==================================================================================

/// Descriptors and implementations of all standard transforms, in wire-id order.
pub(crate) fn standard_transforms() -> Vec<(TransformDescriptor, Transform)> {
    vec![
        (
            TransformDescriptor::new(DELTA_INT, "delta_int", TypeMask::NUMERIC)
                .with_output(OutputSpec::same_as_input()),
            Transform::Typed(Arc::new(numeric::DeltaInt)),
        ),
        (
            TransformDescriptor::new(ZIGZAG, "zigzag", TypeMask::NUMERIC)
                .with_output(OutputSpec::same_as_input()),
            Transform::Typed(Arc::new(numeric::Zigzag)),
        ),
        (
            TransformDescriptor::new(
                CONVERT_SERIAL_TO_NUMERIC,
                "convert_serial_to_numeric",
                TypeMask::SERIAL,
            )
            .with_output(OutputSpec::numeric_any()),
            Transform::Typed(Arc::new(convert::SerialToNumeric)),
        ),
        (
            TransformDescriptor::new(
                CONVERT_NUMERIC_TO_SERIAL,
                "convert_numeric_to_serial",
                TypeMask::NUMERIC,
            )
            .with_output(OutputSpec::serial()),
            Transform::Typed(Arc::new(convert::NumericToSerial)),
        ),
        (
            TransformDescriptor::new(
                CONVERT_SERIAL_TO_STRUCT,
                "convert_serial_to_struct",
                TypeMask::SERIAL,
            )
            .with_output(OutputSpec::structs_any()),
            Transform::Typed(Arc::new(convert::SerialToStruct)),
        ),
        (
            TransformDescriptor::new(
                CONVERT_STRUCT_TO_SERIAL,
                "convert_struct_to_serial",
                TypeMask::STRUCT,
            )
            .with_output(OutputSpec::serial()),
            Transform::Typed(Arc::new(convert::StructToSerial)),
        ),
        (
            TransformDescriptor::new(ENTROPY, "entropy", TypeMask::SERIAL.union(TypeMask::NUMERIC))
                .with_output(OutputSpec::serial()),
            Transform::Typed(Arc::new(entropy::EntropyTransform)),
        ),
        (
            TransformDescriptor::new(ZSTD, "zstd", TypeMask::SERIAL).with_output(OutputSpec::serial()),
            Transform::Pipe(Arc::new(zstd::ZstdTransform)),
        ),
        (
            TransformDescriptor::new(RLE, "rle", TypeMask::NUMERIC)
                .with_output(OutputSpec::same_as_input())
                .with_output(OutputSpec::numeric(4)),
            Transform::Typed(Arc::new(tokenize::Rle)),
        ),
        (
            TransformDescriptor::new(DICTIONARY, "dictionary", TypeMask::NUMERIC)
                .with_output(OutputSpec::same_as_input())
                .with_output(OutputSpec::numeric_any()),
            Transform::Typed(Arc::new(tokenize::Dictionary)),
        ),
        (
            TransformDescriptor::new(
                SEPARATE_STRING_COMPONENTS,
                "separate_string_components",
                TypeMask::STRING,
            )
            .with_output(OutputSpec::serial())
            .with_output(OutputSpec::numeric(4)),
            Transform::Typed(Arc::new(strings::SeparateStringComponents)),
        ),
        (
            TransformDescriptor::new(SPLIT_BY_SIZE, "split_by_size", TypeMask::ANY)
                .with_output(OutputSpec::numeric(4))
                .with_variable_output(OutputSpec::same_as_input())
                .with_min_format_version(2),
            Transform::VariableOutput(Arc::new(split::SplitBySize)),
        ),
        (
            TransformDescriptor::new(SPLIT_BLOCKS, "split_blocks", TypeMask::ANY)
                .with_output(OutputSpec::numeric(4))
                .with_variable_output(OutputSpec::same_as_input())
                .with_min_format_version(3),
            Transform::Split(Arc::new(split::SplitBlocks)),
        ),
        (
            TransformDescriptor::new(TRANSPOSE, "transpose", TypeMask::STRUCT)
                .with_output(OutputSpec::structs_any()),
            Transform::Typed(Arc::new(transpose::Transpose)),
        ),
    ]
}

//==================================================================================
// 3. Shared Decoder Helpers
//==================================================================================

/// Checks the number of streams handed to a decoder.
pub(crate) fn expect_streams<'a, 'b>(
    streams: &'b [StreamView<'a>],
    expected: usize,
    what: &str,
) -> Result<&'b [StreamView<'a>]> {
    if streams.len() != expected {
        return Err(TambakError::corruption(format!(
            "{} expects {} encoded streams, got {}",
            what,
            expected,
            streams.len()
        )));
    }
    Ok(streams)
}

/// Checks that an encoded stream has the type a decoder reads it as.
pub(crate) fn expect_type(view: &StreamView<'_>, stream_type: StreamType, what: &str) -> Result<()> {
    if view.stream_type() != stream_type {
        return Err(TambakError::corruption(format!(
            "{} expects a {} stream, got {}",
            what,
            stream_type,
            view.stream_type()
        )));
    }
    Ok(())
}

/// Reads a `(type tag, width)` pair written by [`write_type_header`].
pub(crate) fn read_type_header(header: &[u8]) -> Result<(StreamType, usize, usize)> {
    let mut cursor = std::io::Cursor::new(header);
    let tag: u8 = crate::kernels::leb128::decode_one(&mut cursor)?;
    let stream_type = StreamType::from_tag(tag)
        .ok_or_else(|| TambakError::corruption(format!("unknown stream type tag {}", tag)))?;
    let width = crate::kernels::leb128::decode_usize(&mut cursor)?;
    if !stream_type.is_valid_width(width) {
        return Err(TambakError::corruption(format!(
            "{} stream cannot have width {}",
            stream_type, width
        )));
    }
    Ok((stream_type, width, cursor.position() as usize))
}

pub(crate) fn write_type_header(stream_type: StreamType, width: usize, out: &mut Vec<u8>) {
    crate::kernels::leb128::encode_one(stream_type.tag(), out);
    crate::kernels::leb128::encode_one(width as u64, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformKind;

    #[test]
    fn test_standard_table_is_valid_and_ordered() {
        let table = standard_transforms();
        assert_eq!(table.len(), 14);
        for (i, (desc, transform)) in table.iter().enumerate() {
            assert_eq!(desc.id.0, i as u32 + 1);
            assert!(desc.id.0 < FIRST_CUSTOM_ID);
            desc.validate(transform.kind()).unwrap();
        }
        assert_eq!(table[7].1.kind(), TransformKind::Pipe);
        assert_eq!(table[11].1.kind(), TransformKind::VariableOutput);
        assert_eq!(table[12].1.kind(), TransformKind::Split);
        assert_eq!(table[13].1.kind(), TransformKind::Typed);
    }

    #[test]
    fn test_type_header_rejects_bad_width() {
        let mut hdr = Vec::new();
        write_type_header(StreamType::Numeric, 4, &mut hdr);
        assert_eq!(read_type_header(&hdr).unwrap(), (StreamType::Numeric, 4, 2));

        let mut bad = Vec::new();
        write_type_header(StreamType::Numeric, 3, &mut bad);
        assert!(read_type_header(&bad).is_err());
        assert!(read_type_header(&[9, 1]).is_err());
    }
}
