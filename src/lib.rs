//! This file is the root of the `tambak_graph` Rust crate.
//!
//! `tambak_graph` compresses structured data by routing typed streams through a
//! directed graph of transforms, ending in a cost-selected entropy coder. Its
//! responsibilities are split as follows:
//! 1.  `graph`: build a [`Compressor`] from nodes (transforms plus parameters)
//!     and graphs (static, selector and function graphs).
//! 2.  `engine`: run a `Compressor` on concrete inputs with a [`CCtx`], and
//!     replay a frame with a [`DCtx`].
//! 3.  `transform`, `entropy`, `kernels`: the transform contract, the standard
//!     transforms, and the pure kernels beneath them.
//! 4.  `frame`: the self-describing binary envelope.
//! 5.  `bridge`: one-call helpers over the standard configuration.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod bridge;
pub mod config;
pub mod engine;
pub mod entropy;
pub mod error;
pub mod frame;
pub mod graph;
pub mod kernels;
pub mod observability;
pub mod transform;
pub mod types;

mod traits;
mod utils;

//==================================================================================
// 2. Re-exports
//==================================================================================
pub use config::{CParam, CompressionParams, CompressionProfile, DParam, DecompressionParams};
pub use engine::{CCtx, DCtx, Edge, GraphContext, Warning};
pub use error::{ErrorKind, Result, TambakError};
pub use frame::{compress_bound, frame_info, FrameInfo, StreamInfo};
pub use graph::{graphs, nodes, Compressor, GraphId, NodeId, TransformId};
pub use observability::{enable_verbose_logging, CollectingSink, DiagnosticSink, Event, LogSink, NoopSink};
pub use types::{StreamType, StreamView, TypeMask, TypedBuffer, TypedRef};
