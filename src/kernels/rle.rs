//! This module contains the pure, stateless kernels for Run-Length Encoding (RLE)
//! and decoding.
//!
//! This technique is a Layer 2 (Sparsity Exploitation) transform. It is highly
//! effective for data with long, contiguous runs of identical values. Unlike a
//! single interleaved buffer, the encoder emits two parallel streams, the run
//! values and the run lengths, so each can be routed to its own successor.

use num_traits::PrimInt;

use crate::error::{Result, TambakError};

//==================================================================================
// 1. Public API
//==================================================================================

/// Splits `input_slice` into `(values, run_lengths)`.
pub fn encode<T>(input_slice: &[T]) -> (Vec<T>, Vec<u32>)
where
    T: PrimInt,
{
    let mut values = Vec::new();
    let mut runs = Vec::new();

    let mut iter = input_slice.iter();
    let Some(&first) = iter.next() else {
        return (values, runs);
    };
    let mut current_val = first;
    let mut run_count: u32 = 1;

    for &val in iter {
        if val == current_val && run_count < u32::MAX {
            run_count += 1;
        } else {
            values.push(current_val);
            runs.push(run_count);
            current_val = val;
            run_count = 1;
        }
    }
    values.push(current_val);
    runs.push(run_count);

    (values, runs)
}

/// Expands runs back into the original stream.
///
/// `max_values` bounds the total expansion so a tampered run length cannot
/// trigger an unbounded allocation.
pub fn decode<T>(values: &[T], runs: &[u32], max_values: usize) -> Result<Vec<T>>
where
    T: PrimInt,
{
    if values.len() != runs.len() {
        return Err(TambakError::corruption(format!(
            "rle: {} values but {} run lengths",
            values.len(),
            runs.len()
        )));
    }
    let total: u64 = runs.iter().map(|&r| r as u64).sum();
    if total > max_values as u64 {
        return Err(TambakError::corruption(format!(
            "rle: runs expand to {} values, limit is {}",
            total, max_values
        )));
    }

    let mut output = Vec::with_capacity(total as usize);
    for (&value, &run) in values.iter().zip(runs) {
        if run == 0 {
            return Err(TambakError::corruption("rle: zero-length run"));
        }
        output.extend(std::iter::repeat(value).take(run as usize));
    }
    Ok(output)
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
