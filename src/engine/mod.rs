// In: src/engine/mod.rs

//! The runtime execution engine.
//!
//! [`CCtx`] applies a [`Compressor`](crate::graph::Compressor)'s start graph to
//! concrete inputs and writes a frame; [`DCtx`] replays a frame's transform
//! records in reverse to regenerate the inputs. Both are single-threaded and
//! reusable; a shared `Compressor` may back any number of contexts on any
//! number of threads.

mod arena;
mod cctx;
mod dctx;
mod function;
mod session;

pub use cctx::CCtx;
pub use dctx::DCtx;
pub use function::{Edge, GraphContext};

use serde::Serialize;
use std::fmt;

use crate::error::ErrorKind;

/// Arena byte limit used unless a context sets its own.
pub const DEFAULT_MEMORY_LIMIT: usize = 1 << 32;

/// A failure that permissive compression turned into a fallback, or a
/// checksum mismatch a decompression context was told to ignore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: ErrorKind,
    /// The graph (or frame section) the failure happened in.
    pub location: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod function_tests;
