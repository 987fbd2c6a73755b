// In: src/transform/mod.rs

//! The transform dispatch contract.
//!
//! A transform is an encoder/decoder pair in one of four shapes, modeled as the
//! closed [`Transform`] enum and dispatched by a single `match` in the engine:
//!
//! 1. [`PipeTransform`]: one serial stream to one serial stream of caller-sized
//!    capacity.
//! 2. [`TypedTransform`]: one typed input to a fixed, declared set of typed
//!    outputs.
//! 3. [`VoTransform`]: declared singleton outputs plus a runtime-determined number
//!    of variable outputs.
//! 4. [`SplitTransform`]: the engine cuts the input into segments chosen by the
//!    transform; on decode the segment count is only known once the size stream
//!    has been read.
//!
//! Encoders write through [`EncoderOutputs`], which enforces the declared output
//! contract. Decoders read untrusted data and must report every violated
//! structural assumption as corruption.

pub mod descriptor;
pub mod io;
pub mod set;
pub mod standard;

use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{StreamType, StreamView};

pub use descriptor::{OutputSpec, OutputType, TransformDescriptor};
pub use io::{DecoderOutput, EncoderOutputs, OutputBuffer, TransformContext};
pub use set::{RegisteredTransform, TransformSet};

//==================================================================================
// 1. The Four Shapes
//==================================================================================

/// Byte-pipe transform.
pub trait PipeTransform: Send + Sync {
    /// Capacity the engine allocates for encoding `src_size` bytes.
    fn encoded_bound(&self, src_size: usize) -> usize;

    /// Encodes into `dst`, returning the number of bytes written.
    fn encode(&self, src: &[u8], dst: &mut [u8], ctx: &TransformContext<'_>) -> Result<usize>;

    /// Exact decoded size, read from the encoded bytes.
    fn decoded_size(&self, src: &[u8]) -> Result<usize>;

    /// Decodes into `dst` (sized by `decoded_size`), returning the bytes written.
    fn decode(&self, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}

/// Typed transform with a fixed set of outputs.
pub trait TypedTransform: Send + Sync {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        ctx: &TransformContext<'_>,
    ) -> Result<()>;

    /// `inputs` holds exactly one stream per declared output, in order.
    fn decode(&self, inputs: &[StreamView<'_>], header: &[u8], out: &mut DecoderOutput) -> Result<()>;
}

/// Variable-output transform.
pub trait VoTransform: Send + Sync {
    fn encode(
        &self,
        input: &StreamView<'_>,
        outputs: &mut EncoderOutputs,
        ctx: &TransformContext<'_>,
    ) -> Result<()>;

    fn decode(
        &self,
        singletons: &[StreamView<'_>],
        variables: &[StreamView<'_>],
        header: &[u8],
        out: &mut DecoderOutput,
    ) -> Result<()>;
}

/// Split-decoder transform. The engine owns the segment bookkeeping: it writes
/// the segment sizes as a `u32` numeric stream and validates them on decode.
pub trait SplitTransform: Send + Sync {
    /// Segment sizes, in elements. Must sum to the input's element count.
    fn split_sizes(&self, input: &StreamView<'_>, ctx: &TransformContext<'_>) -> Result<Vec<usize>>;

    /// Reassembles the segments. The default concatenates them.
    fn join(
        &self,
        stream_type: StreamType,
        elt_width: usize,
        segments: &[StreamView<'_>],
        out: &mut DecoderOutput,
    ) -> Result<()> {
        out.set(crate::types::TypedBuffer::concat(stream_type, elt_width, segments)?)
    }
}

/// The closed set of transform shapes.
#[derive(Clone)]
pub enum Transform {
    Pipe(Arc<dyn PipeTransform>),
    Typed(Arc<dyn TypedTransform>),
    VariableOutput(Arc<dyn VoTransform>),
    Split(Arc<dyn SplitTransform>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Pipe,
    Typed,
    VariableOutput,
    Split,
}

impl Transform {
    pub fn kind(&self) -> TransformKind {
        match self {
            Transform::Pipe(_) => TransformKind::Pipe,
            Transform::Typed(_) => TransformKind::Typed,
            Transform::VariableOutput(_) => TransformKind::VariableOutput,
            Transform::Split(_) => TransformKind::Split,
        }
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Transform::{:?}", self.kind())
    }
}
