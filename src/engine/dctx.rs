// In: src/engine/dctx.rs

//! The decompression context.
//!
//! Decoding never consults a graph. The frame's transform records are resolved
//! against this context's [`TransformSet`] and replayed last-to-first: each
//! record's outputs are, by then, either stored streams or the regenerated
//! inputs of later records.

use std::sync::Arc;

use crate::config::{DParam, DecompressionParams};
use crate::engine::Warning;
use crate::error::{ErrorKind, Result, TambakError};
use crate::frame::{self, ParsedFrame, StoredStream, TransformRecord};
use crate::graph::Compressor;
use crate::observability::{DiagnosticSink, Event, NoopSink};
use crate::transform::standard::read_type_header;
use crate::transform::{
    DecoderOutput, OutputType, RegisteredTransform, Transform, TransformDescriptor, TransformSet,
};
use crate::types::{StreamType, StreamView, TypedBuffer};

pub struct DCtx {
    transforms: TransformSet,
    params: DecompressionParams,
    sink: Arc<dyn DiagnosticSink>,
    warnings: Vec<Warning>,
}

impl Default for DCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl DCtx {
    /// A context that understands the standard transforms.
    pub fn new() -> Self {
        Self::with_transforms(TransformSet::standard())
    }

    /// A context that understands every transform registered on `compressor`.
    pub fn from_compressor(compressor: &Compressor) -> Self {
        Self::with_transforms(compressor.transforms().clone())
    }

    fn with_transforms(transforms: TransformSet) -> Self {
        Self {
            transforms,
            params: DecompressionParams::default(),
            sink: Arc::new(NoopSink),
            warnings: Vec::new(),
        }
    }

    /// Registers the decoder side of a custom transform.
    pub fn register_transform(&mut self, descriptor: TransformDescriptor, transform: Transform) -> Result<()> {
        self.transforms.register(descriptor, transform).map(|_| ())
    }

    pub fn set_parameter(&mut self, param: DParam, value: i64) -> Result<()> {
        self.params.set(param, value)
    }

    pub fn get_parameter(&self, param: DParam) -> i64 {
        self.params.get(param)
    }

    pub fn reset_parameters(&mut self) {
        self.params = DecompressionParams::default();
    }

    pub fn set_diagnostic_sink(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.sink = sink;
    }

    /// Checksum mismatches ignored by the last call.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Regenerates every input of a frame, in input order.
    pub fn decompress(&mut self, src: &[u8]) -> Result<Vec<TypedBuffer>> {
        self.warnings.clear();
        let result = self.decompress_inner(src);
        if !self.params.sticky_parameters {
            self.reset_parameters();
        }
        result
    }

    /// Decompresses a frame holding exactly one serial stream.
    pub fn decompress_serial(&mut self, src: &[u8]) -> Result<Vec<u8>> {
        let mut outputs = self.decompress(src)?;
        match (outputs.pop(), outputs.is_empty()) {
            (Some(out), true) if out.stream_type() == StreamType::Serial => Ok(out.into_data()),
            _ => Err(TambakError::new(
                ErrorKind::InputTypeUnsupported,
                "frame does not hold exactly one serial stream",
            )),
        }
    }

    //==============================================================================
    // 1. Frame Replay
    //==============================================================================

    fn decompress_inner(&mut self, src: &[u8]) -> Result<Vec<TypedBuffer>> {
        let frame = frame::parse_frame(src)?;
        let version = frame.info.format_version;
        if version < self.params.min_format_version || version > self.params.max_format_version {
            return Err(TambakError::new(
                ErrorKind::FormatVersionUnsupported,
                format!(
                    "frame version {} is outside the accepted range {}..={}",
                    version, self.params.min_format_version, self.params.max_format_version
                ),
            ));
        }
        if let Some((recorded, computed)) = frame.compressed_checksum {
            self.check(
                recorded,
                computed,
                self.params.check_compressed_checksum,
                ErrorKind::CompressedChecksumWrong,
                "compressed checksum",
            )?;
        }

        let plan = self.plan(&frame)?;
        let mut slots: Vec<Option<TypedBuffer>> = Vec::with_capacity(plan.total);
        slots.resize_with(plan.total, || None);
        for stored in &frame.stored {
            slots[stored.id] = Some(materialize(stored)?);
        }

        for (record, step) in frame.records.iter().zip(&plan.steps).rev() {
            let limit = frame.info.stream_budget(record.input);
            let outputs = slots[step.first_output..step.first_output + step.nb_outputs]
                .iter_mut()
                .map(|s| s.take())
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| TambakError::corruption("a record reads a stream that was never produced"))?;
            let regenerated = decode_record(step.transform, record, outputs, limit)
                .map_err(|e| e.at_stage(step.transform.descriptor.name.clone()))?;
            slots[record.input] = Some(regenerated);
        }

        let nb_outputs = frame.info.outputs.len();
        let outputs = slots
            .into_iter()
            .take(nb_outputs)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| TambakError::corruption("an input was never regenerated"))?;
        for (i, (out, info)) in outputs.iter().zip(&frame.info.outputs).enumerate() {
            if !info.matches(&out.view()) {
                return Err(TambakError::corruption(format!(
                    "output {} does not match its header description",
                    i
                )));
            }
        }

        if let Some(recorded) = frame.content_checksum {
            let computed = frame::content_checksum(outputs.iter().map(|o| o.view()));
            self.check(
                recorded,
                computed,
                self.params.check_content_checksum,
                ErrorKind::ContentChecksumWrong,
                "content checksum",
            )?;
        }

        if self.sink.enabled() {
            self.sink.record(&Event::FrameRead {
                format_version: version,
                nb_outputs,
                frame_size: src.len(),
            });
        }
        Ok(outputs)
    }

    fn check(&mut self, recorded: u32, computed: u32, enforce: bool, kind: ErrorKind, what: &str) -> Result<()> {
        if recorded == computed {
            return Ok(());
        }
        let message = format!("recorded {:#010x}, computed {:#010x}", recorded, computed);
        if enforce {
            return Err(TambakError::new(kind, message));
        }
        log::warn!("ignoring {} mismatch: {}", what, message);
        self.warnings.push(Warning {
            kind,
            location: what.to_string(),
            message,
        });
        Ok(())
    }

    //==============================================================================
    // 2. Stream Planning
    //==============================================================================

    /// Resolves every record and checks that the implied stream graph is a
    /// tree: every stream is consumed exactly once, by a later record or by
    /// the store, and every record reads a stream created before its outputs.
    fn plan<'t>(&'t self, frame: &ParsedFrame<'_>) -> Result<Plan<'t>> {
        let version = frame.info.format_version;
        let mut total = frame.info.outputs.len();
        let mut steps = Vec::with_capacity(frame.records.len());

        for record in &frame.records {
            let transform = self.transforms.get(record.transform_id).ok_or_else(|| {
                TambakError::corruption(format!("unknown transform {}", record.transform_id))
            })?;
            let desc = &transform.descriptor;
            if desc.min_format_version > version {
                return Err(TambakError::corruption(format!(
                    "transform '{}' cannot appear in a version {} frame",
                    desc.name, version
                )));
            }
            if desc.variable_output.is_none() && record.nb_variable != 0 {
                return Err(TambakError::corruption(format!(
                    "transform '{}' has no variable outputs but the record lists {}",
                    desc.name, record.nb_variable
                )));
            }
            if record.input >= total {
                return Err(TambakError::corruption(format!(
                    "record reads stream {} before it exists",
                    record.input
                )));
            }
            let nb_outputs = desc
                .nb_singletons()
                .checked_add(record.nb_variable)
                .ok_or_else(|| TambakError::corruption("output count overflows"))?;
            steps.push(Step {
                transform,
                first_output: total,
                nb_outputs,
            });
            total = total
                .checked_add(nb_outputs)
                .ok_or_else(|| TambakError::corruption("stream count overflows"))?;
        }

        // One consumer per stream, so the count must match before anything is
        // allocated per stream.
        if frame.records.len().checked_add(frame.stored.len()) != Some(total) {
            return Err(TambakError::corruption(format!(
                "frame defines {} streams but consumes {}",
                total,
                frame.records.len() + frame.stored.len()
            )));
        }
        let mut consumed = vec![false; total];
        let consumers = frame
            .records
            .iter()
            .map(|r| r.input)
            .chain(frame.stored.iter().map(|s| s.id));
        for id in consumers {
            match consumed.get_mut(id) {
                Some(seen @ false) => *seen = true,
                _ => {
                    return Err(TambakError::corruption(format!(
                        "stream {} is consumed twice or does not exist",
                        id
                    )))
                }
            }
        }
        Ok(Plan { total, steps })
    }
}

struct Step<'t> {
    transform: &'t RegisteredTransform,
    first_output: usize,
    nb_outputs: usize,
}

struct Plan<'t> {
    total: usize,
    steps: Vec<Step<'t>>,
}

fn materialize(stored: &StoredStream<'_>) -> Result<TypedBuffer> {
    let lens = stored
        .lens
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    TypedBuffer::from_parts(stored.info.stream_type, stored.info.elt_width, stored.data.to_vec(), lens)
        .map_err(|e| TambakError::corruption(format!("stored stream {}: {}", stored.id, e)))
}

//==================================================================================
// 3. Shape Dispatch
//==================================================================================

fn decode_record(
    registered: &RegisteredTransform,
    record: &TransformRecord,
    outputs: Vec<TypedBuffer>,
    limit: usize,
) -> Result<TypedBuffer> {
    let desc = &registered.descriptor;
    let nb_singletons = desc.nb_singletons();

    // Types that do not depend on the regenerated input can be checked now.
    for (i, buf) in outputs.iter().enumerate() {
        let spec = match desc.singleton_outputs.get(i) {
            Some(spec) => spec,
            None => desc
                .variable_output
                .as_ref()
                .ok_or_else(|| TambakError::logic("variable output without a declaration"))?,
        };
        if let OutputType::Fixed(_) = spec.stream_type {
            if !spec.accepts((buf.stream_type(), buf.elt_width()), (buf.stream_type(), buf.elt_width())) {
                return Err(TambakError::corruption(format!(
                    "output {} is a {} stream of width {}, which '{}' never produces",
                    i,
                    buf.stream_type(),
                    buf.elt_width(),
                    desc.name
                )));
            }
        }
    }

    let views: Vec<StreamView<'_>> = outputs.iter().map(|b| b.view()).collect();
    let (singletons, variables) = views.split_at(nb_singletons);
    let mut out = DecoderOutput::new(limit);

    match &registered.transform {
        Transform::Pipe(t) => {
            let src = singletons
                .first()
                .ok_or_else(|| TambakError::logic("pipe transform without an output"))?
                .data();
            let size = t.decoded_size(src)?;
            out.check_size(size)?;
            let mut dst = vec![0u8; size];
            let written = t.decode(src, &mut dst)?;
            if written != size {
                return Err(TambakError::corruption(format!(
                    "pipe decoder produced {} of {} announced bytes",
                    written, size
                )));
            }
            out.set(TypedBuffer::serial(dst))?;
        }
        Transform::Typed(t) => t.decode(singletons, &record.header, &mut out)?,
        Transform::VariableOutput(t) => t.decode(singletons, variables, &record.header, &mut out)?,
        Transform::Split(t) => {
            let (stream_type, elt_width, used) = read_type_header(&record.header)?;
            if used != record.header.len() {
                return Err(TambakError::corruption("split header has trailing bytes"));
            }
            let sizes = singletons
                .first()
                .ok_or_else(|| TambakError::logic("split transform without a size stream"))?
                .uints()?;
            if sizes.len() != variables.len() {
                return Err(TambakError::corruption(format!(
                    "{} segment sizes for {} segments",
                    sizes.len(),
                    variables.len()
                )));
            }
            for (segment, &size) in variables.iter().zip(&sizes) {
                if segment.stream_type() != stream_type
                    || segment.elt_width() != elt_width
                    || segment.nb_elts() as u64 != size
                {
                    return Err(TambakError::corruption(
                        "segment does not match its recorded type or size",
                    ));
                }
            }
            t.join(stream_type, elt_width, variables, &mut out)?;
        }
    }

    let regenerated = out.take()?;
    let input = (regenerated.stream_type(), regenerated.elt_width());
    if !desc.input_mask.contains(input.0) {
        return Err(TambakError::corruption(format!(
            "'{}' regenerated a {} stream it never accepts",
            desc.name, input.0
        )));
    }
    for (i, buf) in outputs.iter().enumerate() {
        let spec = desc
            .singleton_outputs
            .get(i)
            .or(desc.variable_output.as_ref());
        if let Some(spec) = spec {
            if !spec.accepts(input, (buf.stream_type(), buf.elt_width())) {
                return Err(TambakError::corruption(format!(
                    "output {} of '{}' does not match the regenerated {} stream",
                    i, desc.name, input.0
                )));
            }
        }
    }
    Ok(regenerated)
}
