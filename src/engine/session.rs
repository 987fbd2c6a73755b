// In: src/engine/session.rs

//! The compression-side graph walk.
//!
//! A session owns everything one compression call creates: the stream arena,
//! the transform records and the list of stored streams. Graphs are entered
//! depth-first, outputs in declared order, so the records and stored streams
//! come out in the canonical order the frame writer expects.
//!
//! Speculation (brute-force selectors) and permissive fallbacks both rely on
//! [`Mark`]: a snapshot of the session's lengths that `rollback` truncates back
//! to, discarding every stream, record and warning created since.

use crate::config::ResolvedCompressionParams;
use crate::engine::arena::Arena;
use crate::engine::function::{Edge, GraphContext, GraphHost};
use crate::engine::Warning;
use crate::error::{ErrorKind, Result, TambakError};
use crate::frame::{self, Checksums, StreamInfo, TransformRecord};
use crate::graph::{graphs, Compressor, GraphEntry, GraphId, GraphKind, LocalParams, NodeEntry, NodeId};
use crate::graph::{FunctionGraph, SelectorPolicy};
use crate::observability::{DiagnosticSink, Event};
use crate::transform::io::EncodedParts;
use crate::transform::standard::write_type_header;
use crate::transform::{
    EncoderOutputs, Transform, TransformContext, TransformDescriptor,
};
use crate::types::{StreamView, TypeMask, TypedBuffer};

#[derive(Debug, Clone, Copy)]
struct Mark {
    streams: usize,
    records: usize,
    stored: usize,
    warnings: usize,
}

pub(crate) struct CompressionSession<'c, 'a> {
    compressor: &'c Compressor,
    params: ResolvedCompressionParams,
    sink: &'c dyn DiagnosticSink,
    arena: Arena<'a>,
    records: Vec<TransformRecord>,
    stored: Vec<usize>,
    warnings: Vec<Warning>,
    in_fallback: bool,
}

impl<'c, 'a> CompressionSession<'c, 'a> {
    pub fn new(
        compressor: &'c Compressor,
        params: ResolvedCompressionParams,
        sink: &'c dyn DiagnosticSink,
        memory_limit: usize,
    ) -> Self {
        Self {
            compressor,
            params,
            sink,
            arena: Arena::new(memory_limit),
            records: Vec::new(),
            stored: Vec::new(),
            warnings: Vec::new(),
            in_fallback: false,
        }
    }

    //==============================================================================
    // 1. Entry Points
    //==============================================================================

    /// Walks `start` over every input. A function graph receives all inputs at
    /// once; any other graph is applied to each input in turn.
    pub fn run(&mut self, start: GraphId, inputs: &[StreamView<'a>]) -> Result<()> {
        let ids: Vec<usize> = inputs.iter().map(|v| self.arena.push_input(*v)).collect();
        let compressor = self.compressor;
        let entry = compressor.graph_entry(start)?;
        match entry.kind {
            GraphKind::Function { .. } => self.enter(start, &ids),
            _ => ids.iter().try_for_each(|&id| self.enter(start, &[id])),
        }
    }

    /// Serializes the session into a frame.
    pub fn finish(self, inputs: &[StreamView<'_>]) -> Result<(Vec<u8>, Vec<Warning>)> {
        let frame = {
            let stored = self
                .stored
                .iter()
                .map(|&id| self.arena.view(id).map(|v| (id, v)))
                .collect::<Result<Vec<_>>>()?;
            frame::write_frame(
                self.params.format_version,
                Checksums {
                    content: self.params.content_checksum,
                    compressed: self.params.compressed_checksum,
                },
                inputs,
                &self.records,
                &stored,
            )
        };
        Ok((frame, self.warnings))
    }

    //==============================================================================
    // 2. Graph Dispatch
    //==============================================================================

    fn enter(&mut self, graph: GraphId, streams: &[usize]) -> Result<()> {
        let compressor = self.compressor;
        let entry = compressor.graph_entry(graph)?;
        if self.sink.enabled() {
            for &s in streams {
                let view = self.arena.view(s)?;
                self.sink.record(&Event::GraphEntered {
                    graph: entry.label(),
                    stream_type: view.stream_type(),
                    nb_elts: view.nb_elts(),
                });
            }
        }

        if matches!(entry.kind, GraphKind::Store)
            || !self.params.permissive_compression
            || self.in_fallback
        {
            return self.dispatch(entry, streams);
        }

        let mark = self.mark();
        match self.dispatch(entry, streams) {
            Err(e) if e.kind().is_permissive_recoverable() => {
                self.rollback(mark);
                self.fall_back(entry, streams, e)
            }
            other => other,
        }
    }

    fn dispatch(&mut self, entry: &'c GraphEntry, streams: &[usize]) -> Result<()> {
        match &entry.kind {
            GraphKind::Store => {
                self.stored.extend_from_slice(streams);
                Ok(())
            }
            GraphKind::Static { head, successors } => {
                for &s in streams {
                    if self.is_small(s)? {
                        self.stored.push(s);
                        continue;
                    }
                    self.run_static(entry, *head, successors, s)?;
                }
                Ok(())
            }
            GraphKind::Selector { policy, candidates } => {
                for &s in streams {
                    if self.is_small(s)? {
                        self.stored.push(s);
                        continue;
                    }
                    self.run_selector(entry, policy, candidates, s)?;
                }
                Ok(())
            }
            GraphKind::Function {
                callback,
                input_mask,
                custom_graphs,
                custom_nodes,
            } => self.run_function(
                entry,
                callback.as_ref(),
                *input_mask,
                custom_graphs,
                custom_nodes,
                streams,
            ),
        }
    }

    fn is_small(&self, stream: usize) -> Result<bool> {
        let view = self.arena.view(stream)?;
        Ok(StreamInfo::of(&view).memory_size() < self.params.min_stream_size)
    }

    fn run_static(
        &mut self,
        entry: &'c GraphEntry,
        head: NodeId,
        successors: &[GraphId],
        stream: usize,
    ) -> Result<()> {
        let outputs = self.execute_node(head, stream, &entry.local_params)?;
        let nb_singletons = self.compressor.node_entry(head)?.descriptor.nb_singletons();
        for (i, id) in outputs.into_iter().enumerate() {
            // Every variable output goes to the trailing successor.
            let successor = *successors.get(i.min(nb_singletons)).ok_or_else(|| {
                TambakError::new(
                    ErrorKind::SuccessorInvalid,
                    format!("graph '{}' has no successor for output {}", entry.label(), i),
                )
            })?;
            self.enter(successor, &[id])?;
        }
        Ok(())
    }

    fn run_selector(
        &mut self,
        entry: &'c GraphEntry,
        policy: &SelectorPolicy,
        candidates: &[GraphId],
        stream: usize,
    ) -> Result<()> {
        let chosen = match policy {
            SelectorPolicy::External(selector) => {
                let index = {
                    let view = self.arena.view(stream)?;
                    selector.select(&view, candidates, &entry.local_params)?
                };
                *candidates.get(index).ok_or_else(|| {
                    TambakError::new(
                        ErrorKind::SuccessorInvalid,
                        format!(
                            "selector '{}' picked candidate {} of {}",
                            entry.label(),
                            index,
                            candidates.len()
                        ),
                    )
                })?
            }
            SelectorPolicy::BruteForce => self.speculate(entry, candidates, stream)?,
        };

        if self.sink.enabled() {
            self.sink.record(&Event::SelectorChoice {
                graph: entry.label(),
                candidate: self.compressor.graph_entry(chosen)?.label(),
            });
        }
        self.enter(chosen, &[stream])
    }

    /// Compresses `stream` through every candidate and returns the cheapest.
    /// Ties go to the earlier candidate. Candidates that fail are skipped unless
    /// the failure is an allocation or logic error.
    fn speculate(&mut self, entry: &GraphEntry, candidates: &[GraphId], stream: usize) -> Result<GraphId> {
        let mark = self.mark();
        let mut best: Option<(GraphId, usize)> = None;
        let mut first_error = None;

        for &candidate in candidates {
            let outcome = self.enter(candidate, &[stream]).and_then(|()| self.cost_since(mark));
            self.rollback(mark);
            let cost = match outcome {
                Ok(cost) => Some(cost),
                Err(e) if matches!(e.kind(), ErrorKind::Allocation | ErrorKind::LogicError) => {
                    return Err(e)
                }
                Err(e) => {
                    log::debug!("selector '{}': candidate {} failed: {}", entry.label(), candidate, e);
                    first_error.get_or_insert(e);
                    None
                }
            };
            if self.sink.enabled() {
                self.sink.record(&Event::SelectorTrial {
                    graph: entry.label(),
                    candidate: self.compressor.graph_entry(candidate)?.label(),
                    cost,
                });
            }
            if let Some(cost) = cost {
                if best.map_or(true, |(_, c)| cost < c) {
                    best = Some((candidate, cost));
                }
            }
        }

        match (best, first_error) {
            (Some((graph, _)), _) => Ok(graph),
            (None, Some(e)) => Err(e),
            (None, None) => Err(TambakError::logic("selector ran without candidates")),
        }
    }

    fn run_function(
        &mut self,
        entry: &'c GraphEntry,
        callback: &dyn FunctionGraph,
        input_mask: TypeMask,
        custom_graphs: &[GraphId],
        custom_nodes: &[NodeId],
        streams: &[usize],
    ) -> Result<()> {
        let label = entry.label();
        for &s in streams {
            let stream_type = self.arena.view(s)?.stream_type();
            if !input_mask.contains(stream_type) {
                return Err(TambakError::new(
                    ErrorKind::InputTypeUnsupported,
                    format!("function graph '{}' does not accept {} streams", label, stream_type),
                ));
            }
        }

        let edges: Vec<Edge> = streams.iter().map(|&s| Edge(s)).collect();
        let destinations = {
            let mut ctx = GraphContext::new(
                self,
                &label,
                custom_graphs,
                custom_nodes,
                &entry.local_params,
                &edges,
            );
            callback
                .build(&mut ctx, &edges)
                .map_err(|e| e.at_stage(label.clone()))?;
            ctx.finish()?
        };
        for (id, graph) in destinations {
            self.enter(graph, &[id])?;
        }
        Ok(())
    }

    //==============================================================================
    // 3. Node Execution
    //==============================================================================

    fn execute_node(&mut self, node: NodeId, stream: usize, graph_params: &LocalParams) -> Result<Vec<usize>> {
        let compressor = self.compressor;
        let entry = compressor.node_entry(node)?;
        let params = entry.local_params.merged_with(graph_params);
        self.apply(entry, &params, stream)
            .map_err(|e| e.at_stage(entry.label()))
    }

    fn apply(&mut self, node: &NodeEntry, params: &LocalParams, stream: usize) -> Result<Vec<usize>> {
        let desc = &node.descriptor;
        if desc.min_format_version > self.params.format_version {
            return Err(TambakError::new(
                ErrorKind::NodeVersionMismatch,
                format!(
                    "transform '{}' needs format version {}, the call writes version {}",
                    desc.name, desc.min_format_version, self.params.format_version
                ),
            ));
        }
        let ctx = TransformContext::new(
            params,
            self.params.compression_level,
            self.params.decompression_level,
            self.params.format_version,
        );

        let (input_bytes, (singletons, variables, header)) = {
            let input = self.arena.view(stream)?;
            if !desc.input_mask.contains(input.stream_type()) {
                return Err(TambakError::new(
                    ErrorKind::InputTypeUnsupported,
                    format!("transform '{}' does not accept {} streams", desc.name, input.stream_type()),
                ));
            }
            let parts = encode_with(&node.transform, desc, &input, &ctx)?;
            (StreamInfo::of(&input).memory_size(), parts)
        };

        self.records.push(TransformRecord {
            transform_id: desc.id,
            input: stream,
            nb_variable: variables.len(),
            header,
        });
        let mut ids = Vec::with_capacity(singletons.len() + variables.len());
        let mut output_bytes = 0;
        for buf in singletons.into_iter().chain(variables) {
            output_bytes += buf.memory_size();
            ids.push(self.arena.push_owned(buf)?);
        }

        if self.sink.enabled() {
            self.sink.record(&Event::NodeExecuted {
                node: node.label(),
                input_bytes,
                output_bytes,
            });
        }
        Ok(ids)
    }

    //==============================================================================
    // 4. Speculation and Fallback Bookkeeping
    //==============================================================================

    fn mark(&self) -> Mark {
        Mark {
            streams: self.arena.len(),
            records: self.records.len(),
            stored: self.stored.len(),
            warnings: self.warnings.len(),
        }
    }

    fn rollback(&mut self, mark: Mark) {
        self.arena.truncate(mark.streams);
        self.records.truncate(mark.records);
        self.stored.truncate(mark.stored);
        self.warnings.truncate(mark.warnings);
    }

    /// Frame bytes contributed by everything produced since `mark`.
    fn cost_since(&self, mark: Mark) -> Result<usize> {
        let records: usize = self.records[mark.records..]
            .iter()
            .map(TransformRecord::encoded_len)
            .sum();
        let mut stored = 0;
        for &id in &self.stored[mark.stored..] {
            stored += frame::stored_len(id, &self.arena.view(id)?);
        }
        Ok(records + stored)
    }

    fn fall_back(&mut self, entry: &GraphEntry, streams: &[usize], error: TambakError) -> Result<()> {
        let warning = Warning {
            kind: error.kind(),
            location: entry.label(),
            message: error.to_string(),
        };
        if self.sink.enabled() {
            self.sink.record(&Event::PermissiveFallback {
                graph: warning.location.clone(),
                kind: warning.kind,
                message: warning.message.clone(),
            });
        }
        self.warnings.push(warning);

        self.in_fallback = true;
        let result = streams.iter().try_for_each(|&s| self.rescue(s));
        self.in_fallback = false;
        result
    }

    /// Sends one stream down the generic graph, or stores it raw if even that
    /// fails.
    fn rescue(&mut self, stream: usize) -> Result<()> {
        let mark = self.mark();
        match self.enter(graphs::GENERIC, &[stream]) {
            Err(e) if e.kind().is_permissive_recoverable() => {
                log::warn!("generic fallback failed ({}), storing stream {} raw", e, stream);
                self.rollback(mark);
                self.stored.push(stream);
                Ok(())
            }
            other => other,
        }
    }
}

impl GraphHost for CompressionSession<'_, '_> {
    fn stream(&self, id: usize) -> Result<StreamView<'_>> {
        self.arena.view(id)
    }

    fn run_node(&mut self, node: NodeId, id: usize, graph_params: &LocalParams) -> Result<Vec<usize>> {
        self.execute_node(node, id, graph_params)
    }
}

//==================================================================================
// 5. Shape Dispatch
//==================================================================================

/// Runs one encoder and returns its validated outputs.
fn encode_with(
    transform: &Transform,
    desc: &TransformDescriptor,
    input: &StreamView<'_>,
    ctx: &TransformContext<'_>,
) -> Result<EncodedParts> {
    let mut outputs = EncoderOutputs::new(desc, (input.stream_type(), input.elt_width()));
    match transform {
        Transform::Pipe(t) => {
            let src = input.data();
            let mut dst = vec![0u8; t.encoded_bound(src.len())];
            let written = t.encode(src, &mut dst, ctx)?;
            if written > dst.len() {
                return Err(TambakError::logic(format!(
                    "pipe encoder reported {} bytes into a {} byte buffer",
                    written,
                    dst.len()
                )));
            }
            dst.truncate(written);
            outputs.set_output(0, TypedBuffer::serial(dst))?;
        }
        Transform::Typed(t) => t.encode(input, &mut outputs, ctx)?,
        Transform::VariableOutput(t) => t.encode(input, &mut outputs, ctx)?,
        Transform::Split(t) => {
            let sizes = t.split_sizes(input, ctx)?;
            let total = sizes.iter().try_fold(0usize, |acc, &s| acc.checked_add(s));
            if total != Some(input.nb_elts()) {
                return Err(TambakError::logic(format!(
                    "split sizes cover {:?} elements of a {} element stream",
                    total,
                    input.nb_elts()
                )));
            }
            let mut header = Vec::new();
            write_type_header(input.stream_type(), input.elt_width(), &mut header);
            outputs.send_header(&header);

            let sizes_u32 = sizes
                .iter()
                .map(|&s| u32::try_from(s))
                .collect::<std::result::Result<Vec<u32>, _>>()
                .map_err(|_| TambakError::transform_failed("split segment exceeds u32::MAX elements"))?;
            outputs.set_output(0, TypedBuffer::numeric_from(&sizes_u32)?)?;

            let mut start = 0;
            for size in sizes {
                outputs.push_variable(input.slice(start, start + size)?.to_owned_buffer())?;
                start += size;
            }
        }
    }
    outputs.finish()
}
