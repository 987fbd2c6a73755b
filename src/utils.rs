//! This module provides a set of shared, low-level utility functions used
//! throughout the engine.
//!
//! Its primary responsibilities include:
//! 1.  Providing safe conversions between raw little-endian byte buffers and
//!     widened `u64` values, for kernels that operate on any numeric width.
//! 2.  Providing safe conversions between typed slices and byte buffers.
//! 3.  Offering helpers for common bit-width arithmetic.

use crate::error::{Result, TambakError};

//==================================================================================
// 1. Typed Slice Conversions
//==================================================================================

/// Converts a slice of plain-old-data values into an owned byte vector.
pub fn typed_slice_to_bytes<T: bytemuck::Pod>(data: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(data).to_vec()
}

/// Copies a byte slice into a vector of plain-old-data values.
///
/// Unlike a zero-copy cast this never fails on alignment, only on length.
pub fn bytes_to_typed_vec<T: bytemuck::Pod>(bytes: &[u8]) -> Result<Vec<T>> {
    let size = std::mem::size_of::<T>();
    if size == 0 || bytes.len() % size != 0 {
        return Err(TambakError::PodCast(format!(
            "{} bytes is not a multiple of element size {}",
            bytes.len(),
            size
        )));
    }
    Ok(bytes
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect())
}

//==================================================================================
// 2. Width-Generic Numeric Access
//==================================================================================

/// Reads a single little-endian unsigned integer of `bytes.len()` (<= 8) bytes.
#[inline]
pub fn read_uint_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

/// Appends the low `width` bytes of `value` in little-endian order.
#[inline]
pub fn write_uint_le(value: u64, width: usize, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_le_bytes()[..width]);
}

/// Widens a little-endian numeric buffer into `u64` values.
pub fn uints_from_bytes(data: &[u8], width: usize) -> Result<Vec<u64>> {
    if !matches!(width, 1 | 2 | 4 | 8) || data.len() % width != 0 {
        return Err(TambakError::logic(format!(
            "cannot read {} bytes as {}-byte integers",
            data.len(),
            width
        )));
    }
    Ok(data.chunks_exact(width).map(read_uint_le).collect())
}

/// Narrows `u64` values back into a little-endian buffer of the given width.
pub fn uints_to_bytes(values: &[u64], width: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * width);
    for &v in values {
        write_uint_le(v, width, &mut out);
    }
    out
}

/// The mask selecting the low `width` bytes of a `u64`.
#[inline]
pub fn width_mask(width: usize) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (width * 8)) - 1
    }
}

/// Number of bits needed to represent `n`. `bit_width(0) == 0`.
#[inline]
pub fn bit_width(n: u64) -> u8 {
    (64 - n.leading_zeros()) as u8
}
