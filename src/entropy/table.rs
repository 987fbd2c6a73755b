//! Side-table serialization shared by the statistical coders.

use std::io::Cursor;

use crate::error::{Result, TambakError};
use crate::kernels::leb128;
use crate::utils::width_mask;

/// Writes a strictly increasing alphabet as a count followed by gap varints.
pub fn write_alphabet(symbols: &[u64], out: &mut Vec<u8>) {
    leb128::encode_one(symbols.len() as u64, out);
    let mut prev: Option<u64> = None;
    for &s in symbols {
        leb128::encode_one(
            match prev {
                None => s,
                Some(p) => s - p - 1,
            },
            out,
        );
        prev = Some(s);
    }
}

/// Reads an alphabet written by [`write_alphabet`], validating its size, order and
/// that every symbol fits in `elt_width` bytes.
pub fn read_alphabet(
    cursor: &mut Cursor<&[u8]>,
    max_cardinality: usize,
    elt_width: usize,
) -> Result<Vec<u64>> {
    let cardinality = leb128::decode_usize(cursor)?;
    if cardinality == 0 || cardinality > max_cardinality {
        return Err(TambakError::corruption(format!(
            "alphabet of {} symbols outside 1..={}",
            cardinality, max_cardinality
        )));
    }
    let limit = width_mask(elt_width);
    let mut symbols = Vec::with_capacity(cardinality);
    let mut prev: Option<u64> = None;
    for _ in 0..cardinality {
        let gap: u64 = leb128::decode_one(cursor)?;
        let symbol = match prev {
            None => Some(gap),
            Some(p) => p.checked_add(gap).and_then(|v| v.checked_add(1)),
        }
        .filter(|&s| s <= limit)
        .ok_or_else(|| TambakError::corruption("alphabet symbol out of range"))?;
        symbols.push(symbol);
        prev = Some(symbol);
    }
    Ok(symbols)
}

/// Reads exactly `len` bytes from the cursor.
pub fn read_bytes<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8]> {
    let start = cursor.position() as usize;
    let data: &'a [u8] = *cursor.get_ref();
    let end = start
        .checked_add(len)
        .filter(|&e| e <= data.len())
        .ok_or_else(|| TambakError::corruption("unexpected end of entropy block"))?;
    cursor.set_position(end as u64);
    Ok(&data[start..end])
}

/// The bytes of the cursor's buffer not consumed yet.
pub fn remaining<'a>(cursor: &Cursor<&'a [u8]>) -> &'a [u8] {
    let data: &'a [u8] = *cursor.get_ref();
    let pos = (cursor.position() as usize).min(data.len());
    &data[pos..]
}
