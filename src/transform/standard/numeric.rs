//! Value-reduction transforms over numeric streams: delta and zig-zag.
//!
//! Both map one numeric stream onto a stream of the same width and length, so
//! the decoder only has to check the type of its single input.

use crate::error::Result;
use crate::kernels::{delta, dispatch_unsigned_width, zigzag};
use crate::transform::standard::{expect_streams, expect_type};
use crate::transform::{DecoderOutput, EncoderOutputs, TransformContext, TypedTransform};
use crate::types::{StreamType, StreamView, TypedBuffer};
use crate::utils;

pub(crate) struct DeltaInt;

impl TypedTransform for DeltaInt {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        _ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let encoded = dispatch_unsigned_width!(input.elt_width(), T => {
            let values: Vec<T> = utils::bytes_to_typed_vec(input.data())?;
            TypedBuffer::numeric_from(&delta::encode(&values, 1))
        })?;
        outputs.set_output(0, encoded)
    }

    fn decode(&self, inputs: &[StreamView<'_>], _header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        let deltas = &expect_streams(inputs, 1, "delta_int")?[0];
        expect_type(deltas, StreamType::Numeric, "delta_int")?;
        let decoded = dispatch_unsigned_width!(deltas.elt_width(), T => {
            let values: Vec<T> = utils::bytes_to_typed_vec(deltas.data())?;
            TypedBuffer::numeric_from(&delta::decode(&values, 1))
        })?;
        out.set(decoded)
    }
}

pub(crate) struct Zigzag;

impl TypedTransform for Zigzag {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        _ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let encoded = dispatch_unsigned_width!(input.elt_width(), T => {
            let values: Vec<T> = utils::bytes_to_typed_vec(input.data())?;
            TypedBuffer::numeric_from(&zigzag::encode(&values))
        })?;
        outputs.set_output(0, encoded)
    }

    fn decode(&self, inputs: &[StreamView<'_>], _header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        let mapped = &expect_streams(inputs, 1, "zigzag")?[0];
        expect_type(mapped, StreamType::Numeric, "zigzag")?;
        let decoded = dispatch_unsigned_width!(mapped.elt_width(), T => {
            let values: Vec<T> = utils::bytes_to_typed_vec(mapped.data())?;
            TypedBuffer::numeric_from(&zigzag::decode(&values))
        })?;
        out.set(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LocalParams;
    use crate::transform::standard::{standard_transforms, DELTA_INT, ZIGZAG};
    use crate::transform::TransformDescriptor;

    fn descriptor(id: u32) -> TransformDescriptor {
        standard_transforms()
            .into_iter()
            .find(|(d, _)| d.id.0 == id)
            .map(|(d, _)| d)
            .unwrap()
    }

    fn run(t: &dyn TypedTransform, id: u32, input: StreamView<'_>) -> TypedBuffer {
        let params = LocalParams::new();
        let ctx = TransformContext::new(&params, 6, 3, 3);
        let mut outs = EncoderOutputs::new(&descriptor(id), (input.stream_type(), input.elt_width()));
        t.encode(&input, &mut outs, &ctx).unwrap();
        let (mut singletons, _, header) = outs.finish().unwrap();
        let encoded = singletons.remove(0);

        let mut out = DecoderOutput::new(1 << 20);
        t.decode(&[encoded.view()], &header, &mut out).unwrap();
        out.take().unwrap()
    }

    #[test]
    fn test_delta_roundtrip_all_widths() {
        let a: Vec<u8> = vec![5, 7, 3, 255, 0];
        let b: Vec<u16> = vec![1000, 999, 65535, 0];
        let c: Vec<u64> = vec![u64::MAX, 1, 2, 3];
        assert_eq!(run(&DeltaInt, DELTA_INT, StreamView::numeric(&a).unwrap()).to_vec::<u8>().unwrap(), a);
        assert_eq!(run(&DeltaInt, DELTA_INT, StreamView::numeric(&b).unwrap()).to_vec::<u16>().unwrap(), b);
        assert_eq!(run(&DeltaInt, DELTA_INT, StreamView::numeric(&c).unwrap()).to_vec::<u64>().unwrap(), c);
    }

    #[test]
    fn test_zigzag_roundtrip_negative_values() {
        let values: Vec<u32> = [-3i32, -1, 0, 1, i32::MIN, i32::MAX].iter().map(|&v| v as u32).collect();
        let back = run(&Zigzag, ZIGZAG, StreamView::numeric(&values).unwrap());
        assert_eq!(back.to_vec::<u32>().unwrap(), values);
    }

    #[test]
    fn test_decode_rejects_serial_input() {
        let mut out = DecoderOutput::new(1024);
        let err = DeltaInt
            .decode(&[StreamView::serial(b"abc")], &[], &mut out)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Corruption);
    }
}
