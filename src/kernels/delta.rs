//! This module contains the pure, stateless kernels for delta encoding and
//! decoding of integer streams.
//!
//! This is a Layer 1 (Value Reduction) transform. The core algorithms run
//! **in-place** on an owned copy. Arithmetic wraps at the element width, so every
//! input round-trips regardless of sign or overflow.

use num_traits::{PrimInt, WrappingAdd, WrappingSub};

//==================================================================================
// 1. Generic Core Logic
//==================================================================================

/// Computes `data[i] = data[i] - data[i - order]` in place.
fn encode_slice_inplace<T>(data: &mut [T], order: usize)
where
    T: PrimInt + WrappingSub,
{
    if data.len() <= order {
        return;
    }
    // Iterate backwards to use original values for calculation
    for i in (order..data.len()).rev() {
        data[i] = data[i].wrapping_sub(&data[i - order]);
    }
}

/// Reconstructs `data[i] = data[i] + data[i - order]` in place.
fn decode_slice_inplace<T>(data: &mut [T], order: usize)
where
    T: PrimInt + WrappingAdd,
{
    if data.len() <= order {
        return;
    }
    // Iterate forwards to use the newly-decoded values for subsequent sums
    for i in order..data.len() {
        data[i] = data[i].wrapping_add(&data[i - order]);
    }
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Returns the deltas of `input_slice`. The first `order` values are kept verbatim.
pub fn encode<T>(input_slice: &[T], order: usize) -> Vec<T>
where
    T: PrimInt + WrappingSub,
{
    let mut data_vec = input_slice.to_vec();
    encode_slice_inplace(&mut data_vec, order.max(1));
    data_vec
}

/// Inverts [`encode`].
pub fn decode<T>(input_slice: &[T], order: usize) -> Vec<T>
where
    T: PrimInt + WrappingAdd,
{
    let mut data_vec = input_slice.to_vec();
    decode_slice_inplace(&mut data_vec, order.max(1));
    data_vec
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
