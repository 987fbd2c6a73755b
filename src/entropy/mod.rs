// In: src/entropy/mod.rs

//! The entropy coding backend.
//!
//! Given a finalized stream of fixed-width symbols, this module picks one of
//! several statistical codecs and applies it. Selection is cost based: a
//! histogram is built once per block, every allowed and feasible strategy is
//! sized from it without encoding, and the smallest wins. Ties go to the
//! structurally simpler strategy.
//!
//! Block layout: one tag byte, the element count as a varint, then the strategy
//! body. A multi-block container nests complete blocks, each prefixed with its
//! byte length.

pub mod histogram;
pub mod huffman;
pub mod order1;
pub mod rans;
pub mod table;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;

use crate::error::{ErrorKind, Result, TambakError};
use crate::kernels::{bitpack, leb128};
use crate::utils::{bit_width, read_uint_le, width_mask, write_uint_le};
use histogram::Histogram;

const MULTI_TAG: u8 = 7;
const TAG_MASK: u8 = 0x07;

/// Default block size, in elements, for heuristic splitting.
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

//==================================================================================
// 1. Strategies and Parameters
//==================================================================================

/// Entropy strategies, ordered from structurally simplest to most complex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Raw,
    Constant,
    BitPack,
    Huffman,
    Rans,
    Order1,
}

impl Strategy {
    pub const ALL: [Strategy; 6] = [
        Strategy::Raw,
        Strategy::Constant,
        Strategy::BitPack,
        Strategy::Huffman,
        Strategy::Rans,
        Strategy::Order1,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Raw => "raw",
            Strategy::Constant => "constant",
            Strategy::BitPack => "bitpack",
            Strategy::Huffman => "huffman",
            Strategy::Rans => "rans",
            Strategy::Order1 => "order1",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of allowed strategies.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyMask(u8);

impl StrategyMask {
    pub const NONE: StrategyMask = StrategyMask(0);
    pub const ALL: StrategyMask = StrategyMask(0b11_1111);

    pub fn only(strategies: &[Strategy]) -> Self {
        strategies
            .iter()
            .fold(Self::NONE, |mask, &s| mask.with(s))
    }

    pub fn with(self, s: Strategy) -> Self {
        StrategyMask(self.0 | (1 << s.tag()))
    }

    pub fn without(self, s: Strategy) -> Self {
        StrategyMask(self.0 & !(1 << s.tag()))
    }

    pub fn contains(self, s: Strategy) -> bool {
        self.0 & (1 << s.tag()) != 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        StrategyMask(bits & Self::ALL.0)
    }
}

impl Default for StrategyMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Debug for StrategyMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(Strategy::ALL.iter().filter(|&&s| self.contains(s)))
            .finish()
    }
}

/// Everything the backend needs besides the symbols themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntropyParams {
    pub allowed: StrategyMask,
    pub compression_level: i32,
    pub decompression_level: i32,
    pub format_version: u32,
    /// Block size used by heuristic splitting.
    pub block_size: usize,
    /// Caller-supplied split points. When set, heuristic splitting is skipped.
    pub splits: Option<Vec<usize>>,
}

impl Default for EntropyParams {
    fn default() -> Self {
        Self {
            allowed: StrategyMask::ALL,
            compression_level: 6,
            decompression_level: 3,
            format_version: crate::frame::MAX_FORMAT_VERSION,
            block_size: DEFAULT_BLOCK_SIZE,
            splits: None,
        }
    }
}

impl EntropyParams {
    /// The allowed mask after speed hints and version gating.
    pub fn effective_mask(&self) -> StrategyMask {
        let mut mask = self.allowed;
        if self.compression_level <= 2 || self.format_version < 2 {
            mask = mask.without(Strategy::Order1);
        }
        if self.decompression_level <= 1 {
            mask = mask.without(Strategy::Rans).without(Strategy::Order1);
        }
        mask
    }

    fn heuristic_split_enabled(&self) -> bool {
        self.compression_level > 2 && self.block_size > 0
    }
}

//==================================================================================
// 2. Strategy Selection
//==================================================================================

fn block_overhead(n: usize) -> usize {
    1 + leb128::encoded_len(n as u64)
}

fn estimate_one(
    strategy: Strategy,
    hist: &Histogram,
    indices: &mut Option<Vec<u32>>,
    values: &[u64],
    elt_width: usize,
) -> Option<usize> {
    let n = values.len();
    let card = hist.cardinality();
    let body = match strategy {
        Strategy::Raw => Some(n * elt_width),
        Strategy::Constant => (card == 1).then_some(elt_width),
        Strategy::BitPack => {
            let (lo, hi) = (hist.min_symbol().unwrap_or(0), hist.max_symbol().unwrap_or(0));
            Some(leb128::encoded_len(lo) + 1 + bitpack::packed_size(n, bit_width(hi - lo)))
        }
        Strategy::Huffman => {
            (card > 0 && card <= huffman::MAX_CARDINALITY).then(|| huffman::estimate(hist))
        }
        Strategy::Rans => (card > 0 && card <= rans::MAX_CARDINALITY).then(|| rans::estimate(hist)),
        Strategy::Order1 => {
            if card == 0 || card > order1::MAX_CARDINALITY {
                return None;
            }
            let idx = indices.get_or_insert_with(|| hist.symbol_indices(values));
            order1::estimate(hist, idx)
        }
    }?;
    Some(block_overhead(n) + body)
}

/// Sizes every allowed strategy that can encode `values`, in strategy order.
pub fn estimate_sizes(values: &[u64], elt_width: usize, mask: StrategyMask) -> Vec<(Strategy, usize)> {
    let hist = Histogram::build(values);
    let mut indices = None;
    Strategy::ALL
        .iter()
        .filter(|&&s| mask.contains(s))
        .filter_map(|&s| estimate_one(s, &hist, &mut indices, values, elt_width).map(|sz| (s, sz)))
        .collect()
}

/// Strategies whose body is well formed for zero elements.
const EMPTY_CAPABLE: [Strategy; 2] = [Strategy::Raw, Strategy::BitPack];

fn select_from(values: &[u64], hist: &Histogram, elt_width: usize, mask: StrategyMask) -> Result<Strategy> {
    // An empty block carries no symbols, so `raw` is used for it even when the
    // mask leaves out every strategy able to encode zero elements.
    if values.is_empty() {
        return Ok(EMPTY_CAPABLE
            .into_iter()
            .find(|&s| mask.contains(s))
            .unwrap_or(Strategy::Raw));
    }
    // A constant stream is O(1) with `constant`; take it whenever allowed.
    if hist.cardinality() == 1 && mask.contains(Strategy::Constant) {
        return Ok(Strategy::Constant);
    }
    let mut indices = None;
    let mut best: Option<(Strategy, usize)> = None;
    for &s in Strategy::ALL.iter().filter(|&&s| mask.contains(s)) {
        if let Some(size) = estimate_one(s, hist, &mut indices, values, elt_width) {
            if best.map_or(true, |(_, b)| size < b) {
                best = Some((s, size));
            }
        }
    }
    best.map(|(s, _)| s).ok_or_else(|| {
        TambakError::transform_failed(format!(
            "entropy: no allowed strategy can encode this stream (mask {:?})",
            mask
        ))
    })
}

/// Picks the strategy a single block of `values` would be encoded with.
pub fn select_strategy(values: &[u64], elt_width: usize, params: &EntropyParams) -> Result<Strategy> {
    let hist = Histogram::build(values);
    select_from(values, &hist, elt_width, params.effective_mask())
}

//==================================================================================
// 3. Encoding
//==================================================================================

fn check_width(values: &[u64], elt_width: usize) -> Result<()> {
    if !matches!(elt_width, 1 | 2 | 4 | 8) {
        return Err(TambakError::logic(format!(
            "entropy: unsupported element width {}",
            elt_width
        )));
    }
    let limit = width_mask(elt_width);
    if values.iter().any(|&v| v > limit) {
        return Err(TambakError::logic(format!(
            "entropy: value exceeds {}-byte element width",
            elt_width
        )));
    }
    Ok(())
}

fn encode_block(values: &[u64], elt_width: usize, mask: StrategyMask, out: &mut Vec<u8>) -> Result<Strategy> {
    let hist = Histogram::build(values);
    let strategy = select_from(values, &hist, elt_width, mask)?;
    out.push(strategy.tag());
    leb128::encode_one(values.len() as u64, out);
    match strategy {
        Strategy::Raw => {
            for &v in values {
                write_uint_le(v, elt_width, out);
            }
        }
        Strategy::Constant => write_uint_le(values[0], elt_width, out),
        Strategy::BitPack => {
            let lo = hist.min_symbol().unwrap_or(0);
            let hi = hist.max_symbol().unwrap_or(0);
            let nb_bits = bit_width(hi - lo);
            leb128::encode_one(lo, out);
            out.push(nb_bits);
            let shifted: Vec<u64> = values.iter().map(|&v| v - lo).collect();
            bitpack::encode(&shifted, nb_bits, out)?;
        }
        Strategy::Huffman => huffman::encode(&hist.symbol_indices(values), &hist, out),
        Strategy::Rans => rans::encode(&hist.symbol_indices(values), &hist, out),
        Strategy::Order1 => order1::encode(&hist.symbol_indices(values), &hist, out),
    }
    log::trace!(
        "entropy block: {} values -> {} ({} bytes)",
        values.len(),
        strategy,
        out.len()
    );
    Ok(strategy)
}

fn encode_multi(values: &[u64], elt_width: usize, bounds: &[usize], mask: StrategyMask, out: &mut Vec<u8>) -> Result<()> {
    out.push(MULTI_TAG);
    leb128::encode_one(values.len() as u64, out);
    leb128::encode_one((bounds.len() + 1) as u64, out);
    let mut start = 0;
    let mut block = Vec::new();
    for &end in bounds.iter().chain(std::iter::once(&values.len())) {
        block.clear();
        encode_block(&values[start..end], elt_width, mask, &mut block)?;
        leb128::encode_one(block.len() as u64, out);
        out.extend_from_slice(&block);
        start = end;
    }
    Ok(())
}

fn validate_splits(splits: &[usize], n: usize) -> Result<()> {
    let mut prev = 0;
    for &s in splits {
        if s <= prev || s >= n {
            return Err(TambakError::parameter(format!(
                "entropy: split point {} must be strictly increasing and inside (0, {})",
                s, n
            )));
        }
        prev = s;
    }
    Ok(())
}

/// Encodes `values` (each fitting `elt_width` bytes) and appends the block to `out`.
pub fn encode(values: &[u64], elt_width: usize, params: &EntropyParams, out: &mut Vec<u8>) -> Result<()> {
    check_width(values, elt_width)?;
    let mask = params.effective_mask();

    if let Some(splits) = &params.splits {
        validate_splits(splits, values.len())?;
        if !splits.is_empty() {
            return encode_multi(values, elt_width, splits, mask, out);
        }
    }

    let mut single = Vec::new();
    encode_block(values, elt_width, mask, &mut single)?;

    if params.splits.is_none()
        && params.heuristic_split_enabled()
        && values.len() >= 2 * params.block_size
    {
        let bounds: Vec<usize> = (1..)
            .map(|i| i * params.block_size)
            .take_while(|&b| b < values.len())
            .collect();
        let mut multi = Vec::new();
        encode_multi(values, elt_width, &bounds, mask, &mut multi)?;
        if multi.len() < single.len() {
            out.extend_from_slice(&multi);
            return Ok(());
        }
    }
    out.extend_from_slice(&single);
    Ok(())
}

//==================================================================================
// 4. Decoding
//==================================================================================

fn decode_block(cursor: &mut Cursor<&[u8]>, elt_width: usize, max_values: usize) -> Result<Vec<u64>> {
    let tag = table::read_bytes(cursor, 1)?[0];
    let strategy = Strategy::from_tag(tag & TAG_MASK)
        .filter(|_| tag & !TAG_MASK == 0)
        .ok_or_else(|| TambakError::corruption(format!("entropy: unknown block tag {}", tag)))?;
    let n = leb128::decode_usize(cursor)?;
    if n > max_values {
        return Err(TambakError::corruption(format!(
            "entropy: block declares {} values, at most {} expected",
            n, max_values
        )));
    }

    let values = match strategy {
        Strategy::Raw => {
            let len = n
                .checked_mul(elt_width)
                .ok_or_else(|| TambakError::corruption("entropy: raw size overflows"))?;
            table::read_bytes(cursor, len)?
                .chunks_exact(elt_width)
                .map(read_uint_le)
                .collect()
        }
        Strategy::Constant => {
            let v = read_uint_le(table::read_bytes(cursor, elt_width)?);
            vec![v; n]
        }
        Strategy::BitPack => {
            let lo: u64 = leb128::decode_one(cursor)?;
            let limit = width_mask(elt_width);
            if lo > limit {
                return Err(TambakError::corruption("entropy: bitpack base exceeds element width"));
            }
            let nb_bits = table::read_bytes(cursor, 1)?[0];
            if nb_bits as usize > elt_width * 8 {
                return Err(TambakError::corruption("entropy: bit width exceeds element width"));
            }
            let packed = table::read_bytes(cursor, bitpack::packed_size(n, nb_bits))?;
            bitpack::decode(packed, nb_bits, n)?
                .into_iter()
                .map(|v| {
                    lo.checked_add(v)
                        .filter(|&x| x <= limit)
                        .ok_or_else(|| TambakError::corruption("entropy: bitpack value out of range"))
                })
                .collect::<Result<Vec<u64>>>()?
        }
        Strategy::Huffman => huffman::decode(cursor, n, elt_width)?,
        Strategy::Rans => rans::decode(cursor, n, elt_width)?,
        Strategy::Order1 => order1::decode(cursor, n, elt_width)?,
    };
    Ok(values)
}

/// Decodes a block produced by [`encode`]. `max_values` bounds the element count
/// a block may declare; the whole input must be consumed.
pub fn decode(src: &[u8], elt_width: usize, max_values: usize) -> Result<Vec<u64>> {
    if !matches!(elt_width, 1 | 2 | 4 | 8) {
        return Err(TambakError::corruption(format!(
            "entropy: unsupported element width {}",
            elt_width
        )));
    }
    let mut cursor = Cursor::new(src);
    let values = if src.first() == Some(&MULTI_TAG) {
        cursor.set_position(1);
        let total = leb128::decode_usize(&mut cursor)?;
        if total > max_values {
            return Err(TambakError::corruption("entropy: multi-block declares too many values"));
        }
        let nb_blocks = leb128::decode_usize(&mut cursor)?;
        if nb_blocks == 0 || nb_blocks > total.max(1) {
            return Err(TambakError::corruption("entropy: invalid block count"));
        }
        let mut values = Vec::with_capacity(total);
        for _ in 0..nb_blocks {
            let len = leb128::decode_usize(&mut cursor)?;
            let bytes = table::read_bytes(&mut cursor, len)?;
            let mut inner = Cursor::new(bytes);
            let block = decode_block(&mut inner, elt_width, total - values.len())?;
            if inner.position() as usize != bytes.len() {
                return Err(TambakError::corruption("entropy: trailing bytes in block"));
            }
            values.extend(block);
        }
        if values.len() != total {
            return Err(TambakError::corruption("entropy: block counts do not add up"));
        }
        values
    } else {
        decode_block(&mut cursor, elt_width, max_values)?
    };
    if cursor.position() as usize != src.len() {
        return Err(TambakError::corruption("entropy: trailing bytes after block"));
    }
    Ok(values)
}

/// The strategy of a single block, or `None` for a multi-block container.
pub fn encoded_strategy(src: &[u8]) -> Result<Option<Strategy>> {
    match src.first() {
        Some(&MULTI_TAG) => Ok(None),
        Some(&tag) => Strategy::from_tag(tag)
            .map(Some)
            .ok_or_else(|| TambakError::corruption(format!("entropy: unknown block tag {}", tag))),
        None => Err(TambakError::new(ErrorKind::Corruption, "entropy: empty block")),
    }
}

//==================================================================================
// 5. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use super::Strategy;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn encode_with(values: &[u64], width: usize, params: &EntropyParams) -> Vec<u8> {
        let mut out = Vec::new();
        encode(values, width, params, &mut out).unwrap();
        assert_eq!(decode(&out, width, values.len()).unwrap(), values);
        out
    }

    #[test]
    fn test_constant_stream_is_constant_size() {
        let params = EntropyParams::default();
        for n in [1usize, 2, 100, 100_000] {
            let values = vec![0xABCDu64; n];
            let out = encode_with(&values, 2, &params);
            assert_eq!(encoded_strategy(&out).unwrap(), Some(Strategy::Constant));
            assert_eq!(out.len(), 1 + leb128::encoded_len(n as u64) + 2);
        }
    }

    #[test]
    fn test_uniform_k_bit_stream_selects_bitpack() {
        let mut rng = StdRng::seed_from_u64(42);
        for width in [1usize, 2, 4, 8] {
            for k in 1..(width * 8) as u32 {
                let values: Vec<u64> = (0..4096).map(|_| rng.random::<u64>() & ((1u64 << k) - 1)).collect();
                let out = encode_with(&values, width, &EntropyParams::default());
                assert_eq!(
                    encoded_strategy(&out).unwrap(),
                    Some(Strategy::BitPack),
                    "width {} k {}",
                    width,
                    k
                );
            }
        }
    }

    #[test]
    fn test_wide_elements_with_few_bits_select_bitpack() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in [64usize, 4096] {
            for width in [4usize, 8] {
                for k in [1u32, 2] {
                    let values: Vec<u64> = (0..n).map(|_| rng.random::<u64>() & ((1u64 << k) - 1)).collect();
                    let params = EntropyParams::default();
                    assert_eq!(
                        select_strategy(&values, width, &params).unwrap(),
                        Strategy::BitPack,
                        "n {} width {} k {}: {:?}",
                        n,
                        width,
                        k,
                        estimate_sizes(&values, width, params.effective_mask())
                    );
                    let out = encode_with(&values, width, &params);
                    assert_eq!(out.len(), 1 + leb128::encoded_len(n as u64) + 2 + bitpack::packed_size(n, k as u8));
                }
            }
        }
    }

    #[test]
    fn test_bitpack_base_is_restored() {
        let values: Vec<u64> = (0..300u64).map(|i| 0xFFFF_FF00 + (i % 200)).collect();
        let params = EntropyParams {
            allowed: StrategyMask::only(&[Strategy::BitPack]),
            ..Default::default()
        };
        encode_with(&values, 4, &params);

        // A base wider than the element width is rejected.
        let mut forged = vec![Strategy::BitPack.tag(), 1];
        leb128::encode_one(0x1_0000u64, &mut forged);
        forged.extend_from_slice(&[0, 0]);
        assert_eq!(decode(&forged, 2, 1).unwrap_err().kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_empty_stream_respects_mask() {
        let bitpack_only = EntropyParams {
            allowed: StrategyMask::only(&[Strategy::BitPack, Strategy::Huffman]),
            ..Default::default()
        };
        assert_eq!(select_strategy(&[], 4, &bitpack_only).unwrap(), Strategy::BitPack);
        let out = encode_with(&[], 4, &bitpack_only);
        assert_eq!(encoded_strategy(&out).unwrap(), Some(Strategy::BitPack));

        // Nothing allowed can encode zero symbols; the empty raw block stands in.
        let huffman_only = EntropyParams {
            allowed: StrategyMask::only(&[Strategy::Huffman]),
            ..Default::default()
        };
        let out = encode_with(&[], 4, &huffman_only);
        assert_eq!(out, vec![Strategy::Raw.tag(), 0]);
    }

    #[test]
    fn test_raw_and_constant_only() {
        let params = EntropyParams {
            allowed: StrategyMask::only(&[Strategy::Raw, Strategy::Constant]),
            ..Default::default()
        };
        let mut values = vec![7u64; 500];
        let out = encode_with(&values, 4, &params);
        assert_eq!(out.len(), 1 + leb128::encoded_len(500) + 4);

        values.push(8);
        let out = encode_with(&values, 4, &params);
        assert_eq!(encoded_strategy(&out).unwrap(), Some(Strategy::Raw));
    }

    #[test]
    fn test_skewed_stream_uses_statistical_coder() {
        let mut rng = StdRng::seed_from_u64(1);
        let values: Vec<u64> = (0..50_000)
            .map(|_| if rng.random_bool(0.9) { 200 } else { rng.random_range(0..256) })
            .collect();
        let out = encode_with(&values, 1, &EntropyParams::default());
        assert!(out.len() < values.len() / 2);
        let strategy = encoded_strategy(&out).unwrap();
        assert!(matches!(
            strategy,
            Some(Strategy::Huffman) | Some(Strategy::Rans) | Some(Strategy::Order1) | None
        ));
    }

    #[test]
    fn test_speed_hints_restrict_strategies() {
        let params = EntropyParams {
            decompression_level: 1,
            ..Default::default()
        };
        let mask = params.effective_mask();
        assert!(!mask.contains(Strategy::Rans) && !mask.contains(Strategy::Order1));

        let fast = EntropyParams {
            compression_level: 1,
            ..Default::default()
        };
        assert!(!fast.effective_mask().contains(Strategy::Order1));
        let v1 = EntropyParams {
            format_version: 1,
            ..Default::default()
        };
        assert!(!v1.effective_mask().contains(Strategy::Order1));
    }

    #[test]
    fn test_order1_selected_for_first_order_structure() {
        let values: Vec<u64> = (0..60_000u64).map(|i| [5u64, 1, 5, 9, 1, 9][(i % 6) as usize]).collect();
        let params = EntropyParams {
            allowed: StrategyMask::only(&[Strategy::Raw, Strategy::Huffman, Strategy::Rans, Strategy::Order1]),
            block_size: 0,
            ..Default::default()
        };
        assert_eq!(select_strategy(&values, 1, &params).unwrap(), Strategy::Order1);
        encode_with(&values, 1, &params);
    }

    #[test]
    fn test_caller_splits() {
        let values: Vec<u64> = (0..1000u64).map(|i| if i < 500 { 3 } else { i % 17 }).collect();
        let params = EntropyParams {
            splits: Some(vec![500]),
            ..Default::default()
        };
        let out = encode_with(&values, 2, &params);
        assert_eq!(encoded_strategy(&out).unwrap(), None);

        for bad in [vec![0], vec![1000], vec![10, 10], vec![20, 10]] {
            let params = EntropyParams {
                splits: Some(bad),
                ..Default::default()
            };
            let err = encode(&values, 2, &params, &mut Vec::new()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ParameterInvalid);
        }
    }

    #[test]
    fn test_heuristic_split_never_grows_output() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut values = vec![1u64; 4096];
        values.extend((0..4096).map(|_| rng.random_range(0..200u64)));
        let split = EntropyParams {
            block_size: 4096,
            ..Default::default()
        };
        let single = EntropyParams {
            block_size: 0,
            ..Default::default()
        };
        let a = encode_with(&values, 1, &split);
        let b = encode_with(&values, 1, &single);
        assert!(a.len() <= b.len());
        assert_eq!(encoded_strategy(&a).unwrap(), None);
    }

    #[test]
    fn test_infeasible_mask_fails_execution() {
        let params = EntropyParams {
            allowed: StrategyMask::only(&[Strategy::Constant]),
            ..Default::default()
        };
        let err = encode(&[1, 2], 1, &params, &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransformExecutionFailure);
    }

    #[test]
    fn test_empty_stream_roundtrip() {
        let out = encode_with(&[], 8, &EntropyParams::default());
        assert_eq!(out, vec![Strategy::Raw.tag(), 0]);
    }

    #[test]
    fn test_corruption_is_reported() {
        let values: Vec<u64> = (0..300u64).map(|i| i % 11).collect();
        let out = encode_with(&values, 1, &EntropyParams::default());
        for cut in 0..out.len() {
            assert!(decode(&out[..cut], 1, values.len()).is_err());
        }
        assert!(decode(&out, 1, values.len() - 1).is_err());
        assert!(decode(&[6, 0], 1, 10).is_err());

        let constant = encode_with(&[4; 10], 1, &EntropyParams::default());
        let err = decode(&constant, 1, 9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_any_width(
            width_idx in 0usize..4,
            raw in proptest::collection::vec(any::<u64>(), 0..400),
            modulus in 1u64..1000,
        ) {
            let width = [1usize, 2, 4, 8][width_idx];
            let values: Vec<u64> = raw.iter().map(|&v| (v % modulus) & width_mask(width)).collect();
            let mut out = Vec::new();
            encode(&values, width, &EntropyParams::default(), &mut out).unwrap();
            prop_assert_eq!(decode(&out, width, values.len()).unwrap(), values);
        }
    }
}
