//! Range Asymmetric Numeral Systems (rANS) coding.
//!
//! The coder is a LIFO state machine: symbols are encoded in reverse and decoded
//! forward. The state is a `u32` kept in `[STATE_LOW, STATE_LOW << 8)` and
//! renormalized one byte at a time. Frequencies are normalized to a total of
//! `SCALE`.
//!
//! The core is shared by the order-0 coder in this module and the
//! context-conditioned coder in `order1`; only the choice of frequency table per
//! symbol differs.

use std::io::Cursor;

use crate::entropy::histogram::Histogram;
use crate::entropy::table;
use crate::error::{Result, TambakError};
use crate::kernels::leb128;

// --- rANS Constants ---
pub const SCALE_BITS: u32 = 14;
pub const SCALE: u32 = 1 << SCALE_BITS;
const STATE_LOW: u32 = 1 << 23;
pub const MAX_CARDINALITY: usize = 4096;

//==================================================================================
// 1. Frequency Tables
//==================================================================================

/// Normalized frequencies for one model. Symbols with frequency 0 cannot be coded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreqTable {
    freqs: Vec<u32>,
    cumul: Vec<u32>,
}

impl FreqTable {
    /// Scales raw counts so they sum to `SCALE`. Every non-zero count keeps a
    /// frequency of at least 1. An all-zero input yields an empty (unused) table.
    pub fn normalize(counts: &[u64]) -> Self {
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return Self::from_parts(vec![0; counts.len()]);
        }
        let mut freqs: Vec<u32> = counts
            .iter()
            .map(|&c| {
                if c == 0 {
                    0
                } else {
                    ((c as u128 * SCALE as u128 / total as u128) as u32).max(1)
                }
            })
            .collect();

        let mut sum: u32 = freqs.iter().sum();
        if sum < SCALE {
            // Give the shortfall to the most frequent symbol.
            let mut best = 0;
            for i in 0..counts.len() {
                if counts[i] > counts[best] {
                    best = i;
                }
            }
            freqs[best] += SCALE - sum;
        } else if sum > SCALE {
            // Take the excess from the largest frequencies, never below 1.
            let mut order: Vec<usize> = (0..freqs.len()).filter(|&i| freqs[i] > 1).collect();
            order.sort_by_key(|&i| std::cmp::Reverse((freqs[i], i)));
            while sum > SCALE {
                let mut progressed = false;
                for &i in &order {
                    if sum == SCALE {
                        break;
                    }
                    if freqs[i] > 1 {
                        let take = (freqs[i] - 1).min(sum - SCALE).min((freqs[i] / 8).max(1));
                        freqs[i] -= take;
                        sum -= take;
                        progressed = true;
                    }
                }
                if !progressed {
                    break;
                }
            }
        }
        Self::from_parts(freqs)
    }

    /// Builds a table from decoded frequencies, validating the total.
    pub fn from_freqs(freqs: Vec<u32>) -> Result<Self> {
        let sum: u64 = freqs.iter().map(|&f| f as u64).sum();
        if sum != SCALE as u64 {
            return Err(TambakError::corruption(format!(
                "rans: frequencies sum to {}, expected {}",
                sum, SCALE
            )));
        }
        Ok(Self::from_parts(freqs))
    }

    fn from_parts(freqs: Vec<u32>) -> Self {
        let mut cumul = Vec::with_capacity(freqs.len());
        let mut acc = 0u32;
        for &f in &freqs {
            cumul.push(acc);
            acc += f;
        }
        Self { freqs, cumul }
    }

    pub fn freqs(&self) -> &[u32] {
        &self.freqs
    }

    fn is_unused(&self) -> bool {
        self.freqs.iter().all(|&f| f == 0)
    }

    /// Maps every slot in `0..SCALE` to the symbol that owns it.
    fn slots(&self) -> Vec<u16> {
        if self.is_unused() {
            return Vec::new();
        }
        let mut slots = vec![0u16; SCALE as usize];
        for (sym, (&f, &c)) in self.freqs.iter().zip(&self.cumul).enumerate() {
            for slot in &mut slots[c as usize..(c + f) as usize] {
                *slot = sym as u16;
            }
        }
        slots
    }

    /// Encoded payload size, in bits, of coding `counts` with this table.
    pub fn cost_bits(&self, counts: &[u64]) -> f64 {
        counts
            .iter()
            .zip(&self.freqs)
            .filter(|(&c, _)| c > 0)
            .map(|(&c, &f)| c as f64 * (SCALE as f64 / f as f64).log2())
            .sum()
    }

    /// Writes the non-zero entries as `(index gap, frequency)` varint pairs.
    pub fn write_sparse(&self, out: &mut Vec<u8>) {
        let present: Vec<(usize, u32)> = self
            .freqs
            .iter()
            .enumerate()
            .filter(|(_, &f)| f > 0)
            .map(|(i, &f)| (i, f))
            .collect();
        leb128::encode_one(present.len() as u64, out);
        let mut prev: Option<usize> = None;
        for (i, f) in present {
            let gap = match prev {
                None => i,
                Some(p) => i - p - 1,
            };
            leb128::encode_one(gap as u64, out);
            leb128::encode_one(f as u64, out);
            prev = Some(i);
        }
    }

    /// Exact size of [`FreqTable::write_sparse`].
    pub fn sparse_cost(&self) -> usize {
        let mut out = Vec::new();
        self.write_sparse(&mut out);
        out.len()
    }

    /// Reads a table written by [`FreqTable::write_sparse`] over `nb_symbols` symbols.
    pub fn read_sparse(cursor: &mut Cursor<&[u8]>, nb_symbols: usize) -> Result<Self> {
        let present = leb128::decode_usize(cursor)?;
        if present > nb_symbols {
            return Err(TambakError::corruption("rans: too many table entries"));
        }
        let mut freqs = vec![0u32; nb_symbols];
        if present == 0 {
            return Ok(Self::from_parts(freqs));
        }
        let mut prev: Option<usize> = None;
        for _ in 0..present {
            let gap = leb128::decode_usize(cursor)?;
            let idx = match prev {
                None => Some(gap),
                Some(p) => p.checked_add(gap).and_then(|v| v.checked_add(1)),
            }
            .filter(|&i| i < nb_symbols)
            .ok_or_else(|| TambakError::corruption("rans: table index out of range"))?;
            let f: u32 = leb128::decode_one(cursor)?;
            if f == 0 || f > SCALE {
                return Err(TambakError::corruption("rans: invalid frequency"));
            }
            freqs[idx] = f;
            prev = Some(idx);
        }
        Self::from_freqs(freqs)
    }
}

//==================================================================================
// 2. Shared Coder Core
//==================================================================================

/// Encodes `symbols`, coding symbol `i` with `tables[contexts[i]]`.
pub(crate) fn encode_core(symbols: &[u32], contexts: &[u32], tables: &[FreqTable], out: &mut Vec<u8>) {
    let mut state = STATE_LOW;
    let mut renorm = Vec::with_capacity(symbols.len());
    for i in (0..symbols.len()).rev() {
        let t = &tables[contexts[i] as usize];
        let s = symbols[i] as usize;
        let (f, c) = (t.freqs[s], t.cumul[s]);
        let x_max = ((STATE_LOW >> SCALE_BITS) << 8) * f;
        while state >= x_max {
            renorm.push(state as u8);
            state >>= 8;
        }
        state = ((state / f) << SCALE_BITS) + (state % f) + c;
    }
    out.extend_from_slice(&state.to_le_bytes());
    out.extend(renorm.iter().rev());
}

/// Decodes `n` symbols from `data`, which must be consumed exactly.
/// `context_of(i, previous_symbol)` picks the table for position `i`.
pub(crate) fn decode_core(
    data: &[u8],
    n: usize,
    tables: &[FreqTable],
    mut context_of: impl FnMut(usize, Option<u32>) -> usize,
) -> Result<Vec<u32>> {
    let head: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| TambakError::corruption("rans: missing initial state"))?;
    let mut state = u32::from_le_bytes(head);
    if !(STATE_LOW..STATE_LOW << 8).contains(&state) {
        return Err(TambakError::corruption("rans: initial state out of range"));
    }
    let slots: Vec<Vec<u16>> = tables.iter().map(FreqTable::slots).collect();

    let mut pos = 4usize;
    let mut out = Vec::with_capacity(n.min(data.len() * 8));
    let mut prev = None;
    for i in 0..n {
        let ctx = context_of(i, prev);
        let (table, slot_map) = match (tables.get(ctx), slots.get(ctx)) {
            (Some(t), Some(s)) if !s.is_empty() => (t, s),
            _ => return Err(TambakError::corruption("rans: context has no model")),
        };
        let slot = state & (SCALE - 1);
        let sym = slot_map[slot as usize] as usize;
        state = table.freqs[sym] * (state >> SCALE_BITS) + slot - table.cumul[sym];
        while state < STATE_LOW {
            let byte = *data
                .get(pos)
                .ok_or_else(|| TambakError::corruption("rans: truncated stream"))?;
            state = (state << 8) | byte as u32;
            pos += 1;
        }
        out.push(sym as u32);
        prev = Some(sym as u32);
    }

    if state != STATE_LOW || pos != data.len() {
        return Err(TambakError::corruption("rans: stream did not end in the initial state"));
    }
    Ok(out)
}

//==================================================================================
// 3. Order-0 Public API
//==================================================================================

fn order0_table(hist: &Histogram) -> FreqTable {
    FreqTable::normalize(&hist.counts())
}

/// Estimated size in bytes of the table plus payload for this histogram.
pub fn estimate(hist: &Histogram) -> usize {
    let table = order0_table(hist);
    let table_cost: usize = table
        .freqs()
        .iter()
        .map(|&f| leb128::encoded_len(f as u64))
        .sum();
    let payload = (table.cost_bits(&hist.counts()) / 8.0).ceil() as usize;
    hist.alphabet_cost() + table_cost + 4 + payload
}

/// Encodes alphabet indices. `hist` must be the histogram the indices refer to.
pub fn encode(indices: &[u32], hist: &Histogram, out: &mut Vec<u8>) {
    let table = order0_table(hist);
    table::write_alphabet(&hist.symbols(), out);
    for &f in table.freqs() {
        leb128::encode_one(f as u64, out);
    }
    let contexts = vec![0u32; indices.len()];
    encode_core(indices, &contexts, std::slice::from_ref(&table), out);
}

/// Decodes `num_values` symbols, consuming the rest of the cursor's buffer.
pub fn decode(
    cursor: &mut Cursor<&[u8]>,
    num_values: usize,
    elt_width: usize,
) -> Result<Vec<u64>> {
    let symbols = table::read_alphabet(cursor, MAX_CARDINALITY, elt_width)?;
    let mut freqs = Vec::with_capacity(symbols.len());
    for _ in 0..symbols.len() {
        let f: u32 = leb128::decode_one(cursor)?;
        if f == 0 {
            return Err(TambakError::corruption("rans: zero frequency in dense table"));
        }
        freqs.push(f);
    }
    let table = FreqTable::from_freqs(freqs)?;
    let payload = table::remaining(cursor);
    let indices = decode_core(payload, num_values, std::slice::from_ref(&table), |_, _| 0)?;
    cursor.set_position(cursor.get_ref().len() as u64);
    Ok(indices.into_iter().map(|i| symbols[i as usize]).collect())
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn encode_values(values: &[u64]) -> Vec<u8> {
        let hist = Histogram::build(values);
        let mut out = Vec::new();
        encode(&hist.symbol_indices(values), &hist, &mut out);
        out
    }

    #[test]
    fn test_normalize_sums_to_scale() {
        let cases: Vec<Vec<u64>> = vec![
            vec![1, 1],
            vec![1_000_000, 1],
            (1..=4096).collect(),
            vec![3, 0, 5],
        ];
        for counts in cases {
            let t = FreqTable::normalize(&counts);
            assert_eq!(t.freqs().iter().sum::<u32>(), SCALE);
            for (&c, &f) in counts.iter().zip(t.freqs()) {
                assert_eq!(c == 0, f == 0);
            }
        }
    }

    #[test]
    fn test_roundtrip_skewed() {
        let mut values = vec![4u64; 5000];
        for i in 0..200 {
            values[i * 25] = (i % 5) as u64;
        }
        let out = encode_values(&values);
        let mut cursor = Cursor::new(out.as_slice());
        assert_eq!(decode(&mut cursor, values.len(), 1).unwrap(), values);
        assert!(out.len() < 1000);
    }

    #[test]
    fn test_roundtrip_wide_alphabet() {
        let values: Vec<u64> = (0..20_000u64).map(|i| (i * 7919) % 3000 + 65_000).collect();
        let out = encode_values(&values);
        let mut cursor = Cursor::new(out.as_slice());
        assert_eq!(decode(&mut cursor, values.len(), 4).unwrap(), values);
    }

    #[test]
    fn test_estimate_is_close() {
        let values: Vec<u64> = (0..10_000u64).map(|i| (i * i) % 17).collect();
        let hist = Histogram::build(&values);
        let actual = encode_values(&values).len();
        let est = estimate(&hist);
        assert!(actual.abs_diff(est) <= 8, "actual {} estimate {}", actual, est);
    }

    #[test]
    fn test_tampered_stream_is_corruption() {
        let values: Vec<u64> = (0..1000u64).map(|i| i % 3).collect();
        let mut out = encode_values(&values);
        let last = out.len() - 1;
        out[last] ^= 0x55;
        let mut cursor = Cursor::new(out.as_slice());
        let err = decode(&mut cursor, values.len(), 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_sparse_table_roundtrip() {
        let t = FreqTable::normalize(&[0, 10, 0, 0, 30]);
        let mut out = Vec::new();
        t.write_sparse(&mut out);
        assert_eq!(out.len(), t.sparse_cost());
        let mut cursor = Cursor::new(out.as_slice());
        assert_eq!(FreqTable::read_sparse(&mut cursor, 5).unwrap(), t);
    }
}
