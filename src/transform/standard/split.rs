// In: src/transform/standard/split.rs

//! Segmenting transforms.
//!
//! `split_by_size` is a variable-output transform cutting at caller-chosen
//! sizes. `split_blocks` uses the split-decoder shape: it only picks sizes, and
//! the engine handles the size stream and the segments.

use std::io::Cursor;

use crate::error::{ErrorKind, Result, TambakError};
use crate::kernels::leb128;
use crate::transform::standard::{expect_streams, expect_type, param, read_type_header, write_type_header};
use crate::transform::{
    DecoderOutput, EncoderOutputs, SplitTransform, TransformContext, VoTransform,
};
use crate::types::{StreamType, StreamView, TypedBuffer};
use crate::utils;

/// Default `split_blocks` block size, in elements.
pub const DEFAULT_SPLIT_BLOCK: usize = 64 * 1024;

//==================================================================================
// 1. Size Lists
//==================================================================================

/// Encodes segment sizes as the varint blob `param::SEGMENT_SIZES` expects.
pub fn encode_sizes(sizes: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    for &size in sizes {
        leb128::encode_one(size as u64, &mut out);
    }
    out
}

pub(crate) fn decode_sizes(blob: &[u8]) -> Result<Vec<usize>> {
    let mut cursor = Cursor::new(blob);
    let mut sizes = Vec::new();
    while (cursor.position() as usize) < blob.len() {
        let size = leb128::decode_usize(&mut cursor)
            .map_err(|e| TambakError::parameter(format!("malformed segment size list: {}", e)))?;
        sizes.push(size);
    }
    Ok(sizes)
}

fn sizes_stream(sizes: &[usize]) -> Result<TypedBuffer> {
    let sizes = sizes
        .iter()
        .map(|&s| u32::try_from(s))
        .collect::<std::result::Result<Vec<u32>, _>>()
        .map_err(|_| TambakError::transform_failed("segment larger than u32::MAX elements"))?;
    TypedBuffer::numeric_from(&sizes)
}

//==================================================================================
// 2. split_by_size
//==================================================================================

pub(crate) struct SplitBySize;

impl SplitBySize {
    fn plan(input: &StreamView<'_>, ctx: &TransformContext<'_>) -> Result<Vec<usize>> {
        let total = input.nb_elts();
        let mut sizes = match ctx.blob_param(param::SEGMENT_SIZES) {
            Some(blob) => decode_sizes(blob)?,
            None => Vec::new(),
        };
        let used = sizes.iter().try_fold(0usize, |acc, &s| acc.checked_add(s));
        match used {
            Some(used) if used <= total => {
                if used < total || sizes.is_empty() {
                    sizes.push(total - used);
                }
                Ok(sizes)
            }
            _ => Err(TambakError::transform_failed(format!(
                "segment sizes exceed the {} elements of the input",
                total
            ))),
        }
    }
}

impl VoTransform for SplitBySize {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let sizes = Self::plan(input, ctx)?;

        let mut header = Vec::new();
        write_type_header(input.stream_type(), input.elt_width(), &mut header);
        outputs.send_header(&header);

        outputs.set_output(0, sizes_stream(&sizes)?)?;
        let mut start = 0;
        for size in sizes {
            outputs.push_variable(input.slice(start, start + size)?.to_owned_buffer())?;
            start += size;
        }
        Ok(())
    }

    fn decode(
        &self,
        singletons: &[StreamView<'_>],
        variables: &[StreamView<'_>],
        header: &[u8],
        out: &mut DecoderOutput,
    ) -> Result<()> {
        let sizes = &expect_streams(singletons, 1, "split_by_size")?[0];
        expect_type(sizes, StreamType::Numeric, "split_by_size sizes")?;
        if sizes.elt_width() != 4 {
            return Err(TambakError::corruption("split_by_size: sizes must be 32-bit"));
        }
        let (stream_type, width, used) = read_type_header(header)?;
        if used != header.len() {
            return Err(TambakError::corruption("split_by_size: trailing header bytes"));
        }
        let sizes: Vec<u32> = utils::bytes_to_typed_vec(sizes.data())?;
        if sizes.len() != variables.len() {
            return Err(TambakError::corruption(format!(
                "split_by_size: {} sizes for {} segments",
                sizes.len(),
                variables.len()
            )));
        }
        for (segment, &size) in variables.iter().zip(&sizes) {
            if segment.nb_elts() != size as usize {
                return Err(TambakError::corruption(format!(
                    "split_by_size: segment holds {} elements, size stream says {}",
                    segment.nb_elts(),
                    size
                )));
            }
        }
        out.check_size(variables.iter().map(|v| v.content_size() + v.lens().len() * 4).sum())?;
        out.set(TypedBuffer::concat(stream_type, width, variables)?)
    }
}

//==================================================================================
// 3. split_blocks
//==================================================================================

pub(crate) struct SplitBlocks;

impl SplitTransform for SplitBlocks {
    fn split_sizes(&self, input: &StreamView<'_>, ctx: &TransformContext<'_>) -> Result<Vec<usize>> {
        let block = match ctx.int_param(param::BLOCK_SIZE) {
            Some(b) => usize::try_from(b).ok().filter(|&b| b > 0).ok_or_else(|| {
                TambakError::new(ErrorKind::NodeInvalid, format!("invalid block size {}", b))
            })?,
            None => DEFAULT_SPLIT_BLOCK,
        };
        let total = input.nb_elts();
        let mut sizes = vec![block; total / block];
        if total % block != 0 {
            sizes.push(total % block);
        }
        Ok(sizes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LocalParams;
    use crate::transform::standard::{standard_transforms, SPLIT_BY_SIZE};

    #[test]
    fn test_size_list_roundtrip_and_malformed() {
        let blob = encode_sizes(&[3, 300, 0]);
        assert_eq!(decode_sizes(&blob).unwrap(), vec![3, 300, 0]);
        let err = decode_sizes(&[0x80]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterInvalid);
    }

    #[test]
    fn test_split_by_size_roundtrip_with_remainder() {
        let desc = standard_transforms()
            .into_iter()
            .find(|(d, _)| d.id.0 == SPLIT_BY_SIZE)
            .map(|(d, _)| d)
            .unwrap();
        let params = LocalParams::new().with_blob(param::SEGMENT_SIZES, encode_sizes(&[2, 1]));
        let ctx = TransformContext::new(&params, 6, 3, 3);
        let content = b"aabbbcd".to_vec();
        let lens = vec![2u32, 3, 1, 1];
        let input = StreamView::strings(&content, &lens).unwrap();

        let mut outs = EncoderOutputs::new(&desc, (StreamType::String, 0));
        SplitBySize.encode(&input, &mut outs, &ctx).unwrap();
        let (singletons, variables, header) = outs.finish().unwrap();
        assert_eq!(singletons[0].to_vec::<u32>().unwrap(), vec![2, 1, 1]);
        assert_eq!(variables.len(), 3);

        let s: Vec<_> = singletons.iter().map(|b| b.view()).collect();
        let v: Vec<_> = variables.iter().map(|b| b.view()).collect();
        let mut out = DecoderOutput::new(1024);
        SplitBySize.decode(&s, &v, &header, &mut out).unwrap();
        assert_eq!(out.take().unwrap().view(), input);

        // Dropping a segment must be caught.
        let mut out = DecoderOutput::new(1024);
        assert_eq!(
            SplitBySize.decode(&s, &v[..2], &header, &mut out).unwrap_err().kind(),
            ErrorKind::Corruption
        );
    }

    #[test]
    fn test_oversized_plan_fails_execution() {
        let params = LocalParams::new().with_blob(param::SEGMENT_SIZES, encode_sizes(&[10]));
        let ctx = TransformContext::new(&params, 6, 3, 3);
        let err = SplitBySize::plan(&StreamView::serial(b"abc"), &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransformExecutionFailure);
    }

    #[test]
    fn test_split_blocks_sizes() {
        let params = LocalParams::new().with_int(param::BLOCK_SIZE, 4);
        let ctx = TransformContext::new(&params, 6, 3, 3);
        let values: Vec<u16> = (0..10).collect();
        let sizes = SplitBlocks.split_sizes(&StreamView::numeric(&values).unwrap(), &ctx).unwrap();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert!(SplitBlocks.split_sizes(&StreamView::serial(&[]), &ctx).unwrap().is_empty());
    }
}
