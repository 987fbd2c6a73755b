// In: src/transform/standard/tokenize.rs

//! Sparsity transforms: run-length and dictionary tokenization.
//!
//! Each splits a numeric stream into two parallel streams so that the values and
//! the structure (run lengths, indices) can be routed to different successors.

use crate::error::{Result, TambakError};
use crate::kernels::{dictionary, dispatch_unsigned_width, rle};
use crate::transform::standard::{expect_streams, expect_type};
use crate::transform::{DecoderOutput, EncoderOutputs, TransformContext, TypedTransform};
use crate::types::{StreamType, StreamView, TypedBuffer};
use crate::utils;

//==================================================================================
// 1. Run-Length
//==================================================================================

/// Outputs: `[run values (input type), run lengths (u32)]`.
pub(crate) struct Rle;

impl TypedTransform for Rle {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        _ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let (values, runs) = dispatch_unsigned_width!(input.elt_width(), T => {
            let data: Vec<T> = utils::bytes_to_typed_vec(input.data())?;
            let (values, runs) = rle::encode(&data);
            Ok((TypedBuffer::numeric_from(&values)?, runs))
        })?;
        outputs.set_output(0, values)?;
        outputs.set_output(1, TypedBuffer::numeric_from(&runs)?)
    }

    fn decode(&self, inputs: &[StreamView<'_>], _header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        let inputs = expect_streams(inputs, 2, "rle")?;
        let (values, runs) = (&inputs[0], &inputs[1]);
        expect_type(values, StreamType::Numeric, "rle values")?;
        expect_type(runs, StreamType::Numeric, "rle runs")?;
        if runs.elt_width() != 4 {
            return Err(TambakError::corruption("rle: run lengths must be 32-bit"));
        }
        let runs: Vec<u32> = utils::bytes_to_typed_vec(runs.data())?;
        let width = values.elt_width();
        let decoded = dispatch_unsigned_width!(width, T => {
            let values: Vec<T> = utils::bytes_to_typed_vec(values.data())?;
            TypedBuffer::numeric_from(&rle::decode(&values, &runs, out.limit() / width)?)
        })?;
        out.set(decoded)
    }
}

//==================================================================================
// 2. Dictionary
//==================================================================================

/// Outputs: `[alphabet in first-seen order (input type), indices (narrowest width)]`.
pub(crate) struct Dictionary;

impl TypedTransform for Dictionary {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        _ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let (alphabet, indices) = dictionary::encode(&input.uints()?);
        outputs.set_output(0, TypedBuffer::numeric_from_uints(input.elt_width(), &alphabet)?)?;
        let index_width = dictionary::index_width(alphabet.len());
        outputs.set_output(1, TypedBuffer::numeric_from_uints(index_width, &indices)?)
    }

    fn decode(&self, inputs: &[StreamView<'_>], _header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        let inputs = expect_streams(inputs, 2, "dictionary")?;
        let (alphabet, indices) = (&inputs[0], &inputs[1]);
        expect_type(alphabet, StreamType::Numeric, "dictionary alphabet")?;
        expect_type(indices, StreamType::Numeric, "dictionary indices")?;
        let width = alphabet.elt_width();
        out.check_size(indices.nb_elts().saturating_mul(width))?;
        let values = dictionary::decode(&alphabet.uints()?, &indices.uints()?)?;
        out.set(TypedBuffer::numeric_from_uints(width, &values)?)
    }
}
