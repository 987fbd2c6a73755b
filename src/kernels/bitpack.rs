//! This module contains the pure, stateless kernels for fixed-width bit-packing
//! and unpacking.
//!
//! Values are packed LSB-first into a byte buffer with no padding between values.
//! The packed size is always exactly `ceil(n * bit_width / 8)` bytes. A bit width
//! of 0 is legal and packs any number of zero values into zero bytes.

use bitvec::prelude::*;

use crate::error::{Result, TambakError};

//==================================================================================
// 1. Core Logic
//==================================================================================

/// The exact packed size, in bytes, of `num_values` values of `bit_width` bits.
pub fn packed_size(num_values: usize, bit_width: u8) -> usize {
    (num_values * bit_width as usize + 7) / 8
}

/// Packs `values` using `bit_width` bits each.
pub fn encode(values: &[u64], bit_width: u8, output_buf: &mut Vec<u8>) -> Result<()> {
    if bit_width > 64 {
        return Err(TambakError::logic(format!(
            "bitpack: bit width {} exceeds 64",
            bit_width
        )));
    }
    let width = bit_width as usize;
    let max_val = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    let mut bit_vec = BitVec::<u8, Lsb0>::with_capacity(values.len() * width);

    for &val in values {
        if val > max_val {
            return Err(TambakError::logic(format!(
                "bitpack: value {} exceeds bit width {}",
                val, bit_width
            )));
        }
        bit_vec.extend_from_bitslice(&val.view_bits::<Lsb0>()[..width]);
    }

    output_buf.extend_from_slice(bit_vec.as_raw_slice());
    Ok(())
}

/// Unpacks exactly `num_values` values. The input must be exactly
/// `packed_size(num_values, bit_width)` bytes.
pub fn decode(input_bytes: &[u8], bit_width: u8, num_values: usize) -> Result<Vec<u64>> {
    if bit_width > 64 {
        return Err(TambakError::corruption(format!(
            "bitpack: bit width {} exceeds 64",
            bit_width
        )));
    }
    let expected = num_values
        .checked_mul(bit_width as usize)
        .map(|bits| (bits + 7) / 8)
        .ok_or_else(|| TambakError::corruption("bitpack: value count overflows"))?;
    if input_bytes.len() != expected {
        return Err(TambakError::corruption(format!(
            "bitpack: expected {} packed bytes, found {}",
            expected,
            input_bytes.len()
        )));
    }
    if bit_width == 0 {
        return Ok(vec![0; num_values]);
    }

    let bits = BitSlice::<u8, Lsb0>::from_slice(input_bytes);
    let mut decoded = Vec::with_capacity(num_values);
    for chunk in bits.chunks(bit_width as usize).take(num_values) {
        decoded.push(chunk.load_le::<u64>());
    }
    Ok(decoded)
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
