//! Context-conditioned (order-1) rANS coding.
//!
//! Each symbol is coded with a frequency table chosen by a context. The stream
//! coder uses the previous symbol's alphabet index as the context (the first
//! symbol uses context 0). [`encode_with_contexts`] exposes the same coder for
//! an arbitrary side-channel context stream.

use std::io::Cursor;

use crate::entropy::histogram::Histogram;
use crate::entropy::rans::{self, FreqTable};
use crate::entropy::table;
use crate::error::{Result, TambakError};
use crate::kernels::leb128;

/// Cardinality limit for previous-symbol contexts. One table per symbol.
pub const MAX_CARDINALITY: usize = 64;
/// Upper bound on distinct contexts accepted by the external-context API.
pub const MAX_CONTEXTS: usize = 256;

fn previous_symbol_contexts(indices: &[u32]) -> Vec<u32> {
    let mut contexts = Vec::with_capacity(indices.len());
    let mut prev = 0u32;
    for &s in indices {
        contexts.push(prev);
        prev = s;
    }
    contexts
}

fn conditional_counts(symbols: &[u32], contexts: &[u32], nb_symbols: usize, nb_contexts: usize) -> Vec<Vec<u64>> {
    let mut counts = vec![vec![0u64; nb_symbols]; nb_contexts];
    for (&s, &c) in symbols.iter().zip(contexts) {
        counts[c as usize][s as usize] += 1;
    }
    counts
}

fn write_tables(tables: &[FreqTable], out: &mut Vec<u8>) {
    for t in tables {
        t.write_sparse(out);
    }
}

fn read_tables(cursor: &mut Cursor<&[u8]>, nb_contexts: usize, nb_symbols: usize) -> Result<Vec<FreqTable>> {
    (0..nb_contexts)
        .map(|_| FreqTable::read_sparse(cursor, nb_symbols))
        .collect()
}

//==================================================================================
// 1. Stream Coder (previous-symbol context)
//==================================================================================

/// Estimated size in bytes, or `None` when the alphabet is too large for
/// per-symbol context tables.
pub fn estimate(hist: &Histogram, indices: &[u32]) -> Option<usize> {
    let card = hist.cardinality();
    if card == 0 || card > MAX_CARDINALITY {
        return None;
    }
    let contexts = previous_symbol_contexts(indices);
    let counts = conditional_counts(indices, &contexts, card, card);
    let mut size = hist.alphabet_cost() + 4;
    let mut bits = 0f64;
    for c in &counts {
        let t = FreqTable::normalize(c);
        size += t.sparse_cost();
        bits += t.cost_bits(c);
    }
    Some(size + (bits / 8.0).ceil() as usize)
}

/// Encodes alphabet indices. The caller guarantees the cardinality limit.
pub fn encode(indices: &[u32], hist: &Histogram, out: &mut Vec<u8>) {
    let card = hist.cardinality();
    let contexts = previous_symbol_contexts(indices);
    let tables: Vec<FreqTable> = conditional_counts(indices, &contexts, card, card)
        .iter()
        .map(|c| FreqTable::normalize(c))
        .collect();
    table::write_alphabet(&hist.symbols(), out);
    write_tables(&tables, out);
    rans::encode_core(indices, &contexts, &tables, out);
}

/// Decodes `num_values` symbols, consuming the rest of the cursor's buffer.
pub fn decode(
    cursor: &mut Cursor<&[u8]>,
    num_values: usize,
    elt_width: usize,
) -> Result<Vec<u64>> {
    let symbols = table::read_alphabet(cursor, MAX_CARDINALITY, elt_width)?;
    let tables = read_tables(cursor, symbols.len(), symbols.len())?;
    let payload = table::remaining(cursor);
    let indices = rans::decode_core(payload, num_values, &tables, |_, prev| {
        prev.unwrap_or(0) as usize
    })?;
    cursor.set_position(cursor.get_ref().len() as u64);
    Ok(indices.into_iter().map(|i| symbols[i as usize]).collect())
}

//==================================================================================
// 2. External Context API
//==================================================================================

/// Encodes `symbols` (each `< nb_symbols`) conditioned on a parallel `contexts`
/// stream (each `< nb_contexts`). The decoder must be given the same contexts.
pub fn encode_with_contexts(
    symbols: &[u32],
    contexts: &[u32],
    nb_symbols: usize,
    nb_contexts: usize,
) -> Result<Vec<u8>> {
    if symbols.len() != contexts.len() {
        return Err(TambakError::parameter(format!(
            "order1: {} symbols but {} contexts",
            symbols.len(),
            contexts.len()
        )));
    }
    if nb_symbols == 0 || nb_symbols > rans::MAX_CARDINALITY {
        return Err(TambakError::parameter("order1: symbol count out of range"));
    }
    if nb_contexts == 0 || nb_contexts > MAX_CONTEXTS {
        return Err(TambakError::parameter("order1: context count out of range"));
    }
    if symbols.iter().any(|&s| s as usize >= nb_symbols) {
        return Err(TambakError::parameter("order1: symbol outside the alphabet"));
    }
    if contexts.iter().any(|&c| c as usize >= nb_contexts) {
        return Err(TambakError::parameter("order1: context outside the declared range"));
    }

    let tables: Vec<FreqTable> = conditional_counts(symbols, contexts, nb_symbols, nb_contexts)
        .iter()
        .map(|c| FreqTable::normalize(c))
        .collect();
    let mut out = Vec::new();
    leb128::encode_one(nb_contexts as u64, &mut out);
    write_tables(&tables, &mut out);
    rans::encode_core(symbols, contexts, &tables, &mut out);
    Ok(out)
}

/// Inverse of [`encode_with_contexts`]. Returns one symbol per context.
pub fn decode_with_contexts(src: &[u8], contexts: &[u32], nb_symbols: usize) -> Result<Vec<u32>> {
    if nb_symbols == 0 || nb_symbols > rans::MAX_CARDINALITY {
        return Err(TambakError::parameter("order1: symbol count out of range"));
    }
    let mut cursor = Cursor::new(src);
    let nb_contexts = leb128::decode_usize(&mut cursor)?;
    if nb_contexts == 0 || nb_contexts > MAX_CONTEXTS {
        return Err(TambakError::corruption("order1: context count out of range"));
    }
    if contexts.iter().any(|&c| c as usize >= nb_contexts) {
        return Err(TambakError::parameter("order1: context outside the declared range"));
    }
    let tables = read_tables(&mut cursor, nb_contexts, nb_symbols)?;
    let payload = table::remaining(&cursor);
    rans::decode_core(payload, contexts.len(), &tables, |i, _| contexts[i] as usize)
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
