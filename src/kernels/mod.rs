//! This module collects the pure, stateless compression kernels.
//!
//! Kernels know nothing about graphs, frames or arenas. They transform slices
//! and report failures as `TambakError`s; decoders treat their input as untrusted
//! and map every structural violation to a corruption error. The standard
//! transforms in `transform::standard` bind these kernels to the dispatch contract.

/// Runs `$body` with `$T` bound to the unsigned integer type of the given byte
/// width. Evaluates to `Err(logic)` for any other width.
macro_rules! dispatch_unsigned_width {
    ($width:expr, $T:ident => $body:expr) => {
        match $width {
            1 => {
                type $T = u8;
                $body
            }
            2 => {
                type $T = u16;
                $body
            }
            4 => {
                type $T = u32;
                $body
            }
            8 => {
                type $T = u64;
                $body
            }
            w => Err($crate::error::TambakError::logic(format!(
                "unsupported numeric width {}",
                w
            ))),
        }
    };
}
pub(crate) use dispatch_unsigned_width;

/// Layer 1: Value Reduction
pub mod delta;

/// Layer 2: Sparsity Exploitation
pub mod dictionary;
pub mod rle;

/// Layer 3: Bit-Width Reduction
pub mod bitpack;
pub mod leb128;
pub mod zigzag;

/// Layer 4: Byte Distribution
pub mod shuffle;

/// Final Stage: Generic Byte Compression
pub mod zstd;
