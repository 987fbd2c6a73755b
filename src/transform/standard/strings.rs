//! Splits a string stream into its concatenated content and its lengths.

use crate::error::{Result, TambakError};
use crate::transform::standard::{expect_streams, expect_type};
use crate::transform::{DecoderOutput, EncoderOutputs, TransformContext, TypedTransform};
use crate::types::{StreamType, StreamView, TypedBuffer};
use crate::utils;

pub(crate) struct SeparateStringComponents;

impl TypedTransform for SeparateStringComponents {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        _ctx: &TransformContext<'_>,
    ) -> Result<()> {
        outputs.set_output(0, TypedBuffer::serial(input.data().to_vec()))?;
        outputs.set_output(1, TypedBuffer::numeric_from(input.lens())?)
    }

    fn decode(&self, inputs: &[StreamView<'_>], _header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        let inputs = expect_streams(inputs, 2, "separate_string_components")?;
        let (content, lens) = (&inputs[0], &inputs[1]);
        expect_type(content, StreamType::Serial, "string content")?;
        expect_type(lens, StreamType::Numeric, "string lengths")?;
        if lens.elt_width() != 4 {
            return Err(TambakError::corruption("string lengths must be 32-bit"));
        }
        let lens: Vec<u32> = utils::bytes_to_typed_vec(lens.data())?;
        out.check_size(content.content_size() + lens.len() * 4)?;
        let strings = TypedBuffer::from_parts(StreamType::String, 0, content.data().to_vec(), lens)
            .map_err(|e| TambakError::corruption(format!("string lengths do not match content: {}", e)))?;
        out.set(strings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_lengths_must_cover_content() {
        let content = TypedBuffer::serial(b"helloworld".to_vec());
        let lens = TypedBuffer::numeric_from(&[5u32, 5]).unwrap();
        let mut out = DecoderOutput::new(1024);
        SeparateStringComponents
            .decode(&[content.view(), lens.view()], &[], &mut out)
            .unwrap();
        assert_eq!(out.take().unwrap().to_strings(), vec![b"hello".to_vec(), b"world".to_vec()]);

        let short = TypedBuffer::numeric_from(&[5u32, 4]).unwrap();
        let mut out = DecoderOutput::new(1024);
        let err = SeparateStringComponents
            .decode(&[content.view(), short.view()], &[], &mut out)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }
}
