//! Byte-plane transposition of struct streams.
//!
//! `n` records of `w` bytes become `w` records of `n` bytes, one per byte
//! position. The output shape alone identifies the input shape, so there is no
//! codec header: an empty input keeps its width and yields an empty output.

use crate::error::Result;
use crate::kernels::shuffle;
use crate::transform::standard::{expect_streams, expect_type};
use crate::transform::{DecoderOutput, EncoderOutputs, TransformContext, TypedTransform};
use crate::types::{StreamType, StreamView, TypedBuffer};

pub(crate) struct Transpose;

impl TypedTransform for Transpose {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        _ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let (width, nb_records) = (input.elt_width(), input.nb_elts());
        if nb_records == 0 {
            return outputs.set_output(0, TypedBuffer::from_parts(StreamType::Struct, width, Vec::new(), Vec::new())?);
        }
        let mut planes = Vec::with_capacity(input.content_size());
        shuffle::encode(input.data(), width, &mut planes)?;
        outputs.set_output(0, TypedBuffer::from_parts(StreamType::Struct, nb_records, planes, Vec::new())?)
    }

    fn decode(&self, inputs: &[StreamView<'_>], _header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        let planes = &expect_streams(inputs, 1, "transpose")?[0];
        expect_type(planes, StreamType::Struct, "transpose")?;
        let (plane_len, nb_planes) = (planes.elt_width(), planes.nb_elts());
        if nb_planes == 0 {
            return out.set(TypedBuffer::from_parts(StreamType::Struct, plane_len, Vec::new(), Vec::new())?);
        }
        out.check_size(planes.content_size())?;
        let mut records = Vec::with_capacity(planes.content_size());
        shuffle::decode(planes.data(), nb_planes, &mut records)?;
        out.set(TypedBuffer::from_parts(StreamType::Struct, nb_planes, records, Vec::new())?)
    }
}
