//! The entropy backend exposed as a graph node.
//!
//! Serial input is coded as width-1 symbols. The codec header records the input
//! type and width so the decoder can rebuild the exact stream.

use crate::entropy::{self, EntropyParams, StrategyMask};
use crate::error::{ErrorKind, Result, TambakError};
use crate::transform::standard::{expect_streams, expect_type, param, read_type_header, split, write_type_header};
use crate::transform::{DecoderOutput, EncoderOutputs, TransformContext, TypedTransform};
use crate::types::{StreamType, StreamView, TypedBuffer};

pub(crate) struct EntropyTransform;

impl EntropyTransform {
    /// Resolves node parameters for a stream of `nb_elts` symbols.
    fn params(ctx: &TransformContext<'_>, nb_elts: usize) -> Result<EntropyParams> {
        let mut params = EntropyParams {
            compression_level: ctx.compression_level(),
            decompression_level: ctx.decompression_level(),
            format_version: ctx.format_version(),
            ..EntropyParams::default()
        };
        if let Some(bits) = ctx.int_param(param::ENTROPY_MASK) {
            let bits = u8::try_from(bits).map_err(|_| {
                TambakError::new(ErrorKind::NodeInvalid, format!("invalid strategy mask {}", bits))
            })?;
            params.allowed = StrategyMask::from_bits(bits);
        }
        if let Some(block_size) = ctx.int_param(param::BLOCK_SIZE) {
            params.block_size = usize::try_from(block_size).map_err(|_| {
                TambakError::new(ErrorKind::NodeInvalid, format!("invalid block size {}", block_size))
            })?;
        }
        if let Some(blob) = ctx.blob_param(param::SEGMENT_SIZES) {
            params.splits = Some(segment_splits(&split::decode_sizes(blob)?, nb_elts)?);
        }
        Ok(params)
    }
}

/// Turns segment sizes into split points at their running sums. Sizes follow
/// `split_by_size`: they may cover the whole stream, the remainder forms a last
/// segment, and empty segments are allowed.
fn segment_splits(sizes: &[usize], nb_elts: usize) -> Result<Vec<usize>> {
    let mut points = Vec::with_capacity(sizes.len());
    let mut acc = 0usize;
    for &size in sizes {
        acc = acc
            .checked_add(size)
            .filter(|&a| a <= nb_elts)
            .ok_or_else(|| {
                TambakError::transform_failed(format!(
                    "entropy: segment sizes exceed the {} elements of the input",
                    nb_elts
                ))
            })?;
        if acc > 0 && acc < nb_elts && points.last() != Some(&acc) {
            points.push(acc);
        }
    }
    Ok(points)
}

impl TypedTransform for EntropyTransform {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let values = match input.stream_type() {
            StreamType::Serial => input.data().iter().map(|&b| b as u64).collect(),
            _ => input.uints()?,
        };
        let params = Self::params(ctx, values.len())?;

        let mut header = Vec::new();
        write_type_header(input.stream_type(), input.elt_width(), &mut header);
        outputs.send_header(&header);

        let mut encoded = Vec::new();
        entropy::encode(&values, input.elt_width(), &params, &mut encoded)?;
        outputs.set_output(0, TypedBuffer::serial(encoded))
    }

    fn decode(&self, inputs: &[StreamView<'_>], header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        let coded = &expect_streams(inputs, 1, "entropy")?[0];
        expect_type(coded, StreamType::Serial, "entropy")?;
        let (stream_type, width, used) = read_type_header(header)?;
        if used != header.len() || !matches!(stream_type, StreamType::Serial | StreamType::Numeric) {
            return Err(TambakError::corruption("entropy: invalid codec header"));
        }

        let values = entropy::decode(coded.data(), width, out.limit() / width)?;
        let decoded = match stream_type {
            StreamType::Serial => TypedBuffer::serial(values.iter().map(|&v| v as u8).collect()),
            _ => TypedBuffer::numeric_from_uints(width, &values)?,
        };
        out.set(decoded)
    }
}
