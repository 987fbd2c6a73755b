//! This module contains the pure, stateless kernels for LEB128 (Little-Endian
//! Base 128) variable-length integer encoding and decoding.
//!
//! Varints are the workhorse of every header in the engine: frame records,
//! entropy side tables and codec headers all use them. Decoding is panic-free and
//! reports truncation and overflow as corruption.

use num_traits::{PrimInt, Unsigned};
use std::io::Cursor;

use crate::error::{Result, TambakError};

//==================================================================================
// 1. Public API for Single-Value Operations
//==================================================================================

/// Encodes a single unsigned integer into a LEB128 byte sequence, writing to a buffer.
pub fn encode_one<T>(value: T, buffer: &mut Vec<u8>)
where
    T: PrimInt + Unsigned,
{
    let mut current = value.to_u64().unwrap_or(u64::MAX);
    loop {
        let mut byte = (current & 0x7F) as u8;
        current >>= 7;
        if current != 0 {
            byte |= 0x80;
        }
        buffer.push(byte);
        if current == 0 {
            break;
        }
    }
}

/// Decodes a single unsigned integer from a LEB128 byte stream cursor.
pub fn decode_one<T>(cursor: &mut Cursor<&[u8]>) -> Result<T>
where
    T: PrimInt + Unsigned,
{
    let mut result: u64 = 0;
    let mut shift = 0u32;
    let total_bits = (std::mem::size_of::<T>() * 8) as u32;

    loop {
        let pos = cursor.position() as usize;
        let byte = *cursor
            .get_ref()
            .get(pos)
            .ok_or_else(|| TambakError::corruption("varint: unexpected end of buffer"))?;
        cursor.set_position((pos + 1) as u64);

        if shift >= total_bits {
            return Err(TambakError::corruption("varint: integer overflow"));
        }
        let payload = (byte & 0x7F) as u64;
        // Bits that would land beyond the type's capacity mean overflow.
        if shift + 7 > total_bits && (payload >> (total_bits - shift)) != 0 {
            return Err(TambakError::corruption("varint: integer overflow"));
        }
        result |= payload << shift;

        if byte & 0x80 == 0 {
            return T::from(result)
                .ok_or_else(|| TambakError::corruption("varint: integer overflow"));
        }
        shift += 7;
    }
}

/// Decodes a `u64` varint and narrows it to `usize`.
pub fn decode_usize(cursor: &mut Cursor<&[u8]>) -> Result<usize> {
    let v: u64 = decode_one(cursor)?;
    usize::try_from(v).map_err(|_| TambakError::corruption("varint: value exceeds usize"))
}

/// The number of bytes `encode_one` emits for `value`.
pub fn encoded_len(value: u64) -> usize {
    if value == 0 {
        1
    } else {
        (70 - value.leading_zeros() as usize) / 7
    }
}

//==================================================================================
// 2. Public API for Slice Operations
//==================================================================================

/// Encodes every value of the slice back to back.
pub fn encode<T>(input_slice: &[T], output_buf: &mut Vec<u8>)
where
    T: PrimInt + Unsigned,
{
    for &val in input_slice {
        encode_one(val, output_buf);
    }
}

/// Decodes exactly `num_values` varints and requires the buffer to be fully consumed.
pub fn decode<T>(input_bytes: &[u8], num_values: usize) -> Result<Vec<T>>
where
    T: PrimInt + Unsigned,
{
    // Each value needs at least one byte, so a larger count is corrupt.
    if num_values > input_bytes.len() {
        return Err(TambakError::corruption(format!(
            "varint: {} values cannot fit in {} bytes",
            num_values,
            input_bytes.len()
        )));
    }
    let mut cursor = Cursor::new(input_bytes);
    let mut out = Vec::with_capacity(num_values);
    for _ in 0..num_values {
        out.push(decode_one::<T>(&mut cursor)?);
    }

    if (cursor.position() as usize) != input_bytes.len() {
        return Err(TambakError::corruption(
            "varint: trailing bytes after the last value",
        ));
    }
    Ok(out)
}
