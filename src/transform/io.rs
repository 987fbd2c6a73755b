//! The buffers and context a transform sees while it runs.

use crate::error::{Result, TambakError};
use crate::graph::LocalParams;
use crate::transform::{OutputSpec, TransformDescriptor};
use crate::types::{StreamType, TypedBuffer};
use crate::utils;

//==================================================================================
// 1. Transform Context
//==================================================================================

/// Read-only context handed to encoders: merged local parameters plus the
/// call's resolved speed hints and format version.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    params: &'a LocalParams,
    compression_level: i32,
    decompression_level: i32,
    format_version: u32,
}

impl<'a> TransformContext<'a> {
    pub fn new(
        params: &'a LocalParams,
        compression_level: i32,
        decompression_level: i32,
        format_version: u32,
    ) -> Self {
        Self {
            params,
            compression_level,
            decompression_level,
            format_version,
        }
    }

    pub fn local_params(&self) -> &'a LocalParams {
        self.params
    }

    pub fn int_param(&self, key: i32) -> Option<i64> {
        self.params.int(key)
    }

    pub fn blob_param(&self, key: i32) -> Option<&'a [u8]> {
        self.params.blob(key)
    }

    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    pub fn decompression_level(&self) -> i32 {
        self.decompression_level
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }
}

//==================================================================================
// 2. Output Buffers (encode side)
//==================================================================================

/// A reserved output. Elements are appended, then the buffer is committed with
/// the element count the encoder claims to have written.
#[derive(Debug)]
pub struct OutputBuffer {
    stream_type: StreamType,
    elt_width: usize,
    capacity: usize,
    data: Vec<u8>,
    lens: Vec<u32>,
}

impl OutputBuffer {
    fn reserve(stream_type: StreamType, elt_width: usize, capacity: usize) -> Self {
        let bytes = if stream_type == StreamType::String {
            0
        } else {
            capacity.saturating_mul(elt_width)
        };
        Self {
            stream_type,
            elt_width,
            capacity,
            data: Vec::with_capacity(bytes),
            lens: Vec::new(),
        }
    }

    pub fn serial(capacity: usize) -> Self {
        Self::reserve(StreamType::Serial, 1, capacity)
    }

    pub fn numeric(elt_width: usize, capacity: usize) -> Self {
        Self::reserve(StreamType::Numeric, elt_width, capacity)
    }

    pub fn structs(elt_width: usize, capacity: usize) -> Self {
        Self::reserve(StreamType::Struct, elt_width, capacity)
    }

    pub fn strings(capacity: usize) -> Self {
        Self::reserve(StreamType::String, 0, capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends one integer, narrowed to the buffer's element width.
    pub fn push_uint(&mut self, value: u64) {
        utils::write_uint_le(value, self.elt_width, &mut self.data);
    }

    /// Appends raw element bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn push_string(&mut self, s: &[u8]) {
        self.data.extend_from_slice(s);
        self.lens.push(s.len() as u32);
    }

    fn written(&self) -> Option<usize> {
        match self.stream_type {
            StreamType::String => Some(self.lens.len()),
            _ if self.data.len() % self.elt_width == 0 => Some(self.data.len() / self.elt_width),
            _ => None,
        }
    }

    /// Finalizes the output. Committing more elements than reserved, or a count
    /// different from what was written, is a logic error.
    pub fn commit(self, nb_elts: usize) -> Result<TypedBuffer> {
        if nb_elts > self.capacity {
            return Err(TambakError::logic(format!(
                "committed {} elements into an output reserved for {}",
                nb_elts, self.capacity
            )));
        }
        if self.written() != Some(nb_elts) {
            return Err(TambakError::logic(format!(
                "committed {} elements but {} bytes were written at width {}",
                nb_elts,
                self.data.len(),
                self.elt_width
            )));
        }
        TypedBuffer::from_parts(self.stream_type, self.elt_width, self.data, self.lens)
            .map_err(|e| TambakError::logic(format!("invalid committed output: {}", e)))
    }
}

/// Collects an encoder's outputs and enforces its declared contract.
#[derive(Debug)]
pub struct EncoderOutputs {
    input: (StreamType, usize),
    singleton_specs: Vec<OutputSpec>,
    variable_spec: Option<OutputSpec>,
    singletons: Vec<Option<TypedBuffer>>,
    variables: Vec<TypedBuffer>,
    header: Vec<u8>,
}

/// Finalized encoder results: singletons in declared order, variable outputs,
/// and the codec header.
pub(crate) type EncodedParts = (Vec<TypedBuffer>, Vec<TypedBuffer>, Vec<u8>);

impl EncoderOutputs {
    pub(crate) fn new(descriptor: &TransformDescriptor, input: (StreamType, usize)) -> Self {
        Self {
            input,
            singleton_specs: descriptor.singleton_outputs.clone(),
            variable_spec: descriptor.variable_output,
            singletons: vec![None; descriptor.singleton_outputs.len()],
            variables: Vec::new(),
            header: Vec::new(),
        }
    }

    fn check(&self, spec: &OutputSpec, buf: &TypedBuffer, what: &str) -> Result<()> {
        if !spec.accepts(self.input, (buf.stream_type(), buf.elt_width())) {
            return Err(TambakError::logic(format!(
                "{} is a {} stream of width {}, which its declaration does not allow",
                what,
                buf.stream_type(),
                buf.elt_width()
            )));
        }
        Ok(())
    }

    /// Sets singleton output `index`. Each singleton is set exactly once.
    pub fn set_output(&mut self, index: usize, buf: TypedBuffer) -> Result<()> {
        let spec = *self.singleton_specs.get(index).ok_or_else(|| {
            TambakError::logic(format!("output {} is not declared", index))
        })?;
        self.check(&spec, &buf, &format!("output {}", index))?;
        match &mut self.singletons[index] {
            Some(_) => Err(TambakError::logic(format!("output {} set twice", index))),
            slot => {
                *slot = Some(buf);
                Ok(())
            }
        }
    }

    /// Commits a reserved buffer as singleton output `index`.
    pub fn commit(&mut self, index: usize, buffer: OutputBuffer, nb_elts: usize) -> Result<()> {
        let buf = buffer.commit(nb_elts)?;
        self.set_output(index, buf)
    }

    /// Appends one variable output.
    pub fn push_variable(&mut self, buf: TypedBuffer) -> Result<()> {
        let spec = self
            .variable_spec
            .ok_or_else(|| TambakError::logic("transform declares no variable output"))?;
        self.check(&spec, &buf, "variable output")?;
        self.variables.push(buf);
        Ok(())
    }

    /// Appends bytes to the codec header stored alongside the transform record.
    pub fn send_header(&mut self, bytes: &[u8]) {
        self.header.extend_from_slice(bytes);
    }

    pub(crate) fn finish(self) -> Result<EncodedParts> {
        let singletons = self
            .singletons
            .into_iter()
            .enumerate()
            .map(|(i, s)| s.ok_or_else(|| TambakError::logic(format!("output {} was never set", i))))
            .collect::<Result<Vec<_>>>()?;
        Ok((singletons, self.variables, self.header))
    }
}

//==================================================================================
// 3. Decoder Output
//==================================================================================

/// Receives the single stream a decoder regenerates.
#[derive(Debug)]
pub struct DecoderOutput {
    limit: usize,
    result: Option<TypedBuffer>,
}

impl DecoderOutput {
    pub(crate) fn new(limit: usize) -> Self {
        Self { limit, result: None }
    }

    /// Maximum bytes the regenerated stream may occupy.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Rejects a planned allocation that exceeds the limit, before making it.
    pub fn check_size(&self, bytes: usize) -> Result<()> {
        if bytes > self.limit {
            return Err(TambakError::corruption(format!(
                "decoded stream of {} bytes exceeds the limit of {}",
                bytes, self.limit
            )));
        }
        Ok(())
    }

    pub fn set(&mut self, buf: TypedBuffer) -> Result<()> {
        self.check_size(buf.memory_size())?;
        if self.result.is_some() {
            return Err(TambakError::logic("decoder output set twice"));
        }
        self.result = Some(buf);
        Ok(())
    }

    pub(crate) fn take(self) -> Result<TypedBuffer> {
        self.result
            .ok_or_else(|| TambakError::logic("decoder did not produce an output"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::TypeMask;

    fn two_output_descriptor() -> TransformDescriptor {
        TransformDescriptor::new(950, "pair", TypeMask::NUMERIC)
            .with_output(OutputSpec::same_as_input())
            .with_output(OutputSpec::numeric(4))
    }

    #[test]
    fn test_commit_more_than_reserved_is_logic_error() {
        let mut buf = OutputBuffer::numeric(2, 2);
        for v in [1, 2, 3] {
            buf.push_uint(v);
        }
        assert_eq!(buf.commit(3).unwrap_err().kind(), ErrorKind::LogicError);
    }

    #[test]
    fn test_commit_count_must_match_written() {
        let mut buf = OutputBuffer::numeric(4, 8);
        buf.push_uint(9);
        assert_eq!(buf.commit(2).unwrap_err().kind(), ErrorKind::LogicError);

        let mut buf = OutputBuffer::strings(4);
        buf.push_string(b"ab");
        buf.push_string(b"");
        assert_eq!(buf.commit(2).unwrap().to_strings(), vec![b"ab".to_vec(), vec![]]);
    }

    #[test]
    fn test_outputs_follow_declaration() {
        let desc = two_output_descriptor();
        let mut outs = EncoderOutputs::new(&desc, (StreamType::Numeric, 2));

        let wrong = TypedBuffer::numeric_from(&[1u32]).unwrap();
        assert_eq!(outs.set_output(0, wrong).unwrap_err().kind(), ErrorKind::LogicError);

        outs.set_output(0, TypedBuffer::numeric_from(&[1u16]).unwrap()).unwrap();
        assert!(outs.set_output(0, TypedBuffer::numeric_from(&[1u16]).unwrap()).is_err());
        assert!(outs.push_variable(TypedBuffer::serial(vec![])).is_err());

        // Output 1 is still missing.
        assert_eq!(outs.finish().unwrap_err().kind(), ErrorKind::LogicError);
    }

    #[test]
    fn test_decoder_output_limit() {
        let mut out = DecoderOutput::new(4);
        assert_eq!(out.check_size(5).unwrap_err().kind(), ErrorKind::Corruption);
        assert!(out.set(TypedBuffer::serial(vec![0; 5])).is_err());
        out.set(TypedBuffer::serial(vec![0; 4])).unwrap();
        assert_eq!(out.take().unwrap().content_size(), 4);
    }
}
