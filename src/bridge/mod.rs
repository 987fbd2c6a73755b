// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the one-call surface of the library. It hides the
// Compressor / CCtx / DCtx lifecycle behind free functions for callers that
// only want the standard graphs with default parameters.
//
// Data Flow (Compression):
//
//   1. [Stateless API (compress_serial / compress_typed)] -> Receives bytes or `TypedRef`s
//         |
//         `-> a. Borrows the process-wide default `Compressor` (standard graphs, `GENERIC` start)
//         |
//         `-> b. Runs a fresh `CCtx` against it
//
//   2. [Execution Engine (engine::CCtx)] -> Returns `Result<Vec<u8>>` (one frame)
//
//
// Data Flow (Decompression):
//
//   1. [Stateless API (decompress_serial / decompress_typed)] -> Receives `&[u8]`
//         |
//         `-> Runs a fresh `DCtx` with the standard transform set
//
//   2. [Execution Engine (engine::DCtx)] -> Returns the regenerated `TypedBuffer`s
//
// `frame_info` and `compress_bound` need no context at all and are re-exported
// from the frame module.
//
// ====================================================================================
pub mod stateless_api;

pub use crate::frame::{compress_bound, frame_info};
pub use stateless_api::{
    compress_serial, compress_serial_with, compress_typed, decompress_serial, decompress_typed,
    default_compressor,
};

#[cfg(test)]
mod tests;
