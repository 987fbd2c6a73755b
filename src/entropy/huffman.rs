//! Canonical prefix (Huffman) coding over a sorted alphabet.
//!
//! Code lengths are limited to [`MAX_CODE_LENGTH`] bits. Only the lengths are
//! stored; codes are reassigned canonically on both sides, so the table costs
//! half a byte per symbol on top of the alphabet.
//!
//! Block layout: alphabet, packed 4-bit lengths, MSB-first bitstream padded to a
//! whole byte.

use bitvec::prelude::*;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::Cursor;

use crate::entropy::histogram::Histogram;
use crate::entropy::table;
use crate::error::{Result, TambakError};

pub const MAX_CODE_LENGTH: u8 = 15;
pub const MAX_CARDINALITY: usize = 4096;

//==================================================================================
// 1. Code Construction
//==================================================================================

/// Computes length-limited Huffman code lengths for `counts` (all non-zero).
pub fn code_lengths(counts: &[u64], max_len: u8) -> Vec<u8> {
    let n = counts.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![1],
        _ => {}
    }

    // Leaves are 0..n, internal nodes are numbered from n upward as they merge.
    let mut parent = vec![usize::MAX; 2 * n - 1];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = counts
        .iter()
        .enumerate()
        .map(|(i, &c)| Reverse((c, i)))
        .collect();
    let mut next = n;
    while heap.len() > 1 {
        let (Some(Reverse((c1, a))), Some(Reverse((c2, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        parent[a] = next;
        parent[b] = next;
        heap.push(Reverse((c1 + c2, next)));
        next += 1;
    }

    // Parents always carry larger ids than their children.
    let root = next - 1;
    let mut depth = vec![0u32; 2 * n - 1];
    for node in (0..root).rev() {
        depth[node] = depth[parent[node]] + 1;
    }

    let max = max_len as u32;
    let mut lens: Vec<u32> = depth[..n].iter().map(|&d| d.min(max)).collect();

    // Clamping can over-subscribe the code space; lengthen the longest codes
    // still below the limit until the Kraft sum fits again.
    let limit = 1u64 << max;
    let mut kraft: u64 = lens.iter().map(|&l| 1u64 << (max - l)).sum();
    while kraft > limit {
        let mut best: Option<usize> = None;
        for i in 0..n {
            if lens[i] >= max {
                continue;
            }
            best = match best {
                Some(b) if lens[b] > lens[i] || (lens[b] == lens[i] && counts[b] <= counts[i]) => {
                    Some(b)
                }
                _ => Some(i),
            };
        }
        let Some(i) = best else { break };
        kraft -= 1u64 << (max - lens[i] - 1);
        lens[i] += 1;
    }

    lens.into_iter().map(|l| l as u8).collect()
}

/// Assigns canonical codes: shorter codes first, ties in alphabet order.
fn canonical_codes(lens: &[u8]) -> Vec<u32> {
    let mut count = [0u32; MAX_CODE_LENGTH as usize + 1];
    for &l in lens {
        count[l as usize] += 1;
    }
    let mut first = [0u32; MAX_CODE_LENGTH as usize + 1];
    let mut code = 0u32;
    for len in 1..=MAX_CODE_LENGTH as usize {
        first[len] = code;
        code = (code + count[len]) << 1;
    }
    lens.iter()
        .map(|&l| {
            let c = first[l as usize];
            first[l as usize] += 1;
            c
        })
        .collect()
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Exact size in bytes of the table plus payload for this histogram.
pub fn estimate(hist: &Histogram) -> usize {
    let counts = hist.counts();
    let lens = code_lengths(&counts, MAX_CODE_LENGTH);
    let bits: u64 = counts
        .iter()
        .zip(&lens)
        .map(|(&c, &l)| c * l as u64)
        .sum();
    hist.alphabet_cost() + (lens.len() + 1) / 2 + ((bits + 7) / 8) as usize
}

/// Encodes alphabet indices. `hist` must be the histogram the indices refer to.
pub fn encode(indices: &[u32], hist: &Histogram, out: &mut Vec<u8>) {
    let lens = code_lengths(&hist.counts(), MAX_CODE_LENGTH);
    let codes = canonical_codes(&lens);

    table::write_alphabet(&hist.symbols(), out);
    for pair in lens.chunks(2) {
        let hi = pair.get(1).copied().unwrap_or(0);
        out.push(pair[0] | (hi << 4));
    }

    let mut bits = BitVec::<u8, Msb0>::new();
    for &idx in indices {
        let (code, len) = (codes[idx as usize], lens[idx as usize]);
        for b in (0..len).rev() {
            bits.push((code >> b) & 1 == 1);
        }
    }
    out.extend_from_slice(bits.as_raw_slice());
}

/// Decodes `num_values` symbols, consuming the rest of the cursor's buffer.
pub fn decode(
    cursor: &mut Cursor<&[u8]>,
    num_values: usize,
    elt_width: usize,
) -> Result<Vec<u64>> {
    let symbols = table::read_alphabet(cursor, MAX_CARDINALITY, elt_width)?;
    let packed = table::read_bytes(cursor, (symbols.len() + 1) / 2)?;
    let lens: Vec<u8> = (0..symbols.len())
        .map(|i| (packed[i / 2] >> ((i % 2) * 4)) & 0x0F)
        .collect();

    let mut count = [0u32; MAX_CODE_LENGTH as usize + 1];
    let mut kraft = 0u64;
    for &l in &lens {
        if l == 0 {
            return Err(TambakError::corruption("huffman: zero code length"));
        }
        count[l as usize] += 1;
        kraft += 1u64 << (MAX_CODE_LENGTH - l);
    }
    if kraft > 1u64 << MAX_CODE_LENGTH {
        return Err(TambakError::corruption("huffman: over-subscribed code lengths"));
    }

    // Symbol indices ordered by (length, alphabet index), matching canonical order.
    let mut sorted: Vec<usize> = (0..symbols.len()).collect();
    sorted.sort_by_key(|&i| (lens[i], i));

    let payload = table::remaining(cursor);
    // Every symbol costs at least one bit.
    if num_values > payload.len().saturating_mul(8) {
        return Err(TambakError::corruption("huffman: payload too short"));
    }
    let bits = BitSlice::<u8, Msb0>::from_slice(payload);
    let mut pos = 0usize;
    let mut out = Vec::with_capacity(num_values);

    for _ in 0..num_values {
        let mut code = 0u32;
        let mut first = 0u32;
        let mut index = 0u32;
        let mut found = None;
        for len in 1..=MAX_CODE_LENGTH as usize {
            let bit = bits
                .get(pos)
                .map(|b| *b)
                .ok_or_else(|| TambakError::corruption("huffman: truncated bitstream"))?;
            pos += 1;
            code |= bit as u32;
            let cnt = count[len];
            if code >= first && code - first < cnt {
                found = Some(sorted[(index + code - first) as usize]);
                break;
            }
            index += cnt;
            first = (first + cnt) << 1;
            code <<= 1;
        }
        let sym = found.ok_or_else(|| TambakError::corruption("huffman: invalid code"))?;
        out.push(symbols[sym]);
    }

    if (pos + 7) / 8 != payload.len() {
        return Err(TambakError::corruption("huffman: trailing bytes after bitstream"));
    }
    cursor.set_position(cursor.get_ref().len() as u64);
    Ok(out)
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
