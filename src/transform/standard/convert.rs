//! Type conversions. They move bytes between stream types without touching
//! them, so every one of them is its own inverse at the byte level; only the
//! declared type and width change.

use crate::error::{ErrorKind, Result, TambakError};
use crate::kernels::leb128;
use crate::transform::standard::{expect_streams, expect_type, param};
use crate::transform::{DecoderOutput, EncoderOutputs, TransformContext, TypedTransform};
use crate::types::{StreamType, StreamView, TypedBuffer};

fn requested_width(ctx: &TransformContext<'_>, stream_type: StreamType) -> Result<usize> {
    let width = ctx.int_param(param::ELT_WIDTH).unwrap_or(1);
    usize::try_from(width)
        .ok()
        .filter(|&w| stream_type.is_valid_width(w))
        .ok_or_else(|| {
            TambakError::new(
                ErrorKind::NodeInvalid,
                format!("{} conversion cannot produce width {}", stream_type, width),
            )
        })
}

fn convert_bytes(stream_type: StreamType, width: usize, data: &[u8]) -> Result<TypedBuffer> {
    if data.len() % width != 0 {
        return Err(TambakError::new(
            ErrorKind::InputTypeUnsupported,
            format!(
                "{} bytes do not split into {} elements of width {}",
                data.len(),
                stream_type,
                width
            ),
        ));
    }
    TypedBuffer::from_parts(stream_type, width, data.to_vec(), Vec::new())
}

fn read_width_header(header: &[u8], stream_type: StreamType) -> Result<usize> {
    let mut cursor = std::io::Cursor::new(header);
    let width = leb128::decode_usize(&mut cursor)?;
    if cursor.position() as usize != header.len() || !stream_type.is_valid_width(width) {
        return Err(TambakError::corruption(format!(
            "invalid {} width header",
            stream_type
        )));
    }
    Ok(width)
}

/// Reinterprets a serial stream as a corruption-checked numeric one.
fn restore(inputs: &[StreamView<'_>], header: &[u8], stream_type: StreamType, what: &str) -> Result<TypedBuffer> {
    let bytes = &expect_streams(inputs, 1, what)?[0];
    expect_type(bytes, StreamType::Serial, what)?;
    let width = read_width_header(header, stream_type)?;
    convert_bytes(stream_type, width, bytes.data()).map_err(|_| {
        TambakError::corruption(format!(
            "{}: {} bytes are not a whole number of width-{} elements",
            what,
            bytes.content_size(),
            width
        ))
    })
}

// --- serial -> numeric ---

pub(crate) struct SerialToNumeric;

impl TypedTransform for SerialToNumeric {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let width = requested_width(ctx, StreamType::Numeric)?;
        outputs.set_output(0, convert_bytes(StreamType::Numeric, width, input.data())?)
    }

    fn decode(&self, inputs: &[StreamView<'_>], _header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        let numbers = &expect_streams(inputs, 1, "convert_serial_to_numeric")?[0];
        expect_type(numbers, StreamType::Numeric, "convert_serial_to_numeric")?;
        out.set(TypedBuffer::serial(numbers.data().to_vec()))
    }
}

// --- numeric -> serial ---

pub(crate) struct NumericToSerial;

impl TypedTransform for NumericToSerial {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        _ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let mut header = Vec::new();
        leb128::encode_one(input.elt_width() as u64, &mut header);
        outputs.send_header(&header);
        outputs.set_output(0, TypedBuffer::serial(input.data().to_vec()))
    }

    fn decode(&self, inputs: &[StreamView<'_>], header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        out.set(restore(inputs, header, StreamType::Numeric, "convert_numeric_to_serial")?)
    }
}

// --- serial -> struct ---

pub(crate) struct SerialToStruct;

impl TypedTransform for SerialToStruct {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let width = requested_width(ctx, StreamType::Struct)?;
        outputs.set_output(0, convert_bytes(StreamType::Struct, width, input.data())?)
    }

    fn decode(&self, inputs: &[StreamView<'_>], _header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        let records = &expect_streams(inputs, 1, "convert_serial_to_struct")?[0];
        expect_type(records, StreamType::Struct, "convert_serial_to_struct")?;
        out.set(TypedBuffer::serial(records.data().to_vec()))
    }
}

// --- struct -> serial ---

pub(crate) struct StructToSerial;

impl TypedTransform for StructToSerial {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        _ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let mut header = Vec::new();
        leb128::encode_one(input.elt_width() as u64, &mut header);
        outputs.send_header(&header);
        outputs.set_output(0, TypedBuffer::serial(input.data().to_vec()))
    }

    fn decode(&self, inputs: &[StreamView<'_>], header: &[u8], out: &mut DecoderOutput) -> Result<()> {
        out.set(restore(inputs, header, StreamType::Struct, "convert_struct_to_serial")?)
    }
}
