//! This module contains the kernel for Dictionary Encoding.
//!
//! This is a Layer 2 (Sparsity Exploitation) transform. It is highly effective
//! for data with low cardinality. It builds a dictionary of the unique values in
//! first-seen order and replaces the data with a stream of indices into it.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::error::{Result, TambakError};

/// Returns `(dictionary, indices)`.
pub fn encode<T: Eq + Hash + Copy>(input_slice: &[T]) -> (Vec<T>, Vec<u64>) {
    let mut dictionary_map = HashMap::<T, u64>::new();
    let mut dictionary_vec = Vec::new();
    let mut indices = Vec::with_capacity(input_slice.len());

    for &value in input_slice {
        let index = *dictionary_map.entry(value).or_insert_with(|| {
            dictionary_vec.push(value);
            (dictionary_vec.len() - 1) as u64
        });
        indices.push(index);
    }
    (dictionary_vec, indices)
}

/// Byte width of the smallest numeric type able to index `dictionary_len` entries.
pub fn index_width(dictionary_len: usize) -> usize {
    match dictionary_len as u64 {
        0..=0x100 => 1,
        0x101..=0x1_0000 => 2,
        0x1_0001..=0x1_0000_0000 => 4,
        _ => 8,
    }
}

/// Rebuilds the original values, validating every index.
pub fn decode<T: Copy>(dictionary: &[T], indices: &[u64]) -> Result<Vec<T>> {
    indices
        .iter()
        .map(|&i| {
            usize::try_from(i)
                .ok()
                .and_then(|i| dictionary.get(i).copied())
                .ok_or_else(|| {
                    TambakError::corruption(format!(
                        "dictionary: index {} out of range for {} entries",
                        i,
                        dictionary.len()
                    ))
                })
        })
        .collect()
}
