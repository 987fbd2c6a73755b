//! The compression context.

use std::sync::Arc;

use crate::config::{CParam, CompressionParams, ResolvedCompressionParams};
use crate::engine::session::CompressionSession;
use crate::engine::{Warning, DEFAULT_MEMORY_LIMIT};
use crate::error::{ErrorKind, Result, TambakError};
use crate::graph::Compressor;
use crate::observability::{DiagnosticSink, Event, NoopSink};
use crate::types::StreamView;

/// Runs compressions against a shared [`Compressor`].
///
/// Parameters set on the context override the compressor's for the next call
/// only, unless `StickyParameters` is on, in which case they persist until
/// changed or reset.
pub struct CCtx {
    compressor: Option<Arc<Compressor>>,
    params: CompressionParams,
    sink: Arc<dyn DiagnosticSink>,
    warnings: Vec<Warning>,
    memory_limit: usize,
}

impl Default for CCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl CCtx {
    pub fn new() -> Self {
        Self {
            compressor: None,
            params: CompressionParams::default(),
            sink: Arc::new(NoopSink),
            warnings: Vec::new(),
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }

    pub fn ref_compressor(&mut self, compressor: Arc<Compressor>) {
        self.compressor = Some(compressor);
    }

    pub fn set_parameter(&mut self, param: CParam, value: i64) -> Result<()> {
        self.params.set(param, value)
    }

    /// The value the next call will use: the context's own setting, else the
    /// compressor's, else the default.
    pub fn get_parameter(&self, param: CParam) -> i64 {
        self.resolved().get(param)
    }

    /// Replaces the context's whole parameter set, e.g. one loaded from JSON.
    pub fn set_parameters(&mut self, params: CompressionParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn reset_parameters(&mut self) {
        self.params = CompressionParams::default();
    }

    pub fn set_diagnostic_sink(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.sink = sink;
    }

    /// Caps the bytes one call may allocate for intermediate streams.
    pub fn set_memory_limit(&mut self, bytes: usize) {
        self.memory_limit = bytes;
    }

    /// Warnings raised by the last call.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    fn resolved(&self) -> ResolvedCompressionParams {
        match &self.compressor {
            Some(c) => self.params.overlay(c.parameters()).resolve(),
            None => self.params.resolve(),
        }
    }

    /// Compresses typed inputs into one frame.
    pub fn compress(&mut self, inputs: &[StreamView<'_>]) -> Result<Vec<u8>> {
        self.warnings.clear();
        let result = self.compress_inner(inputs);
        if !self.resolved().sticky_parameters {
            self.reset_parameters();
        }
        result
    }

    pub fn compress_serial(&mut self, src: &[u8]) -> Result<Vec<u8>> {
        self.compress(&[StreamView::serial(src)])
    }

    /// Compresses into a caller buffer and returns the frame size.
    pub fn compress_into(&mut self, inputs: &[StreamView<'_>], dst: &mut [u8]) -> Result<usize> {
        let frame = self.compress(inputs)?;
        let capacity = dst.len();
        let target = dst.get_mut(..frame.len()).ok_or_else(|| {
            TambakError::new(
                ErrorKind::DstCapacityTooSmall,
                format!("frame of {} bytes does not fit in {} bytes", frame.len(), capacity),
            )
        })?;
        target.copy_from_slice(&frame);
        Ok(frame.len())
    }

    fn compress_inner(&mut self, inputs: &[StreamView<'_>]) -> Result<Vec<u8>> {
        let compressor = self
            .compressor
            .clone()
            .ok_or_else(|| TambakError::graph_invalid("no compressor is referenced"))?;
        let start = compressor
            .start_graph()
            .ok_or_else(|| TambakError::graph_invalid("the compressor has no start graph"))?;
        if inputs.is_empty() {
            return Err(TambakError::new(ErrorKind::SrcSizeTooSmall, "no inputs to compress"));
        }
        let layered = self.params.overlay(compressor.parameters());
        layered.validate()?;
        let params = layered.resolve();

        let mut session = CompressionSession::new(&compressor, params, self.sink.as_ref(), self.memory_limit);
        session.run(start, inputs)?;
        let (frame, warnings) = session.finish(inputs)?;

        for w in &warnings {
            log::warn!("{}", w);
        }
        self.warnings = warnings;
        if self.sink.enabled() {
            self.sink.record(&Event::FrameWritten {
                format_version: params.format_version,
                nb_inputs: inputs.len(),
                frame_size: frame.len(),
            });
        }
        Ok(frame)
    }
}
