//! Byte shuffling of fixed-width records.
//!
//! A row-oriented stream of `n` records of `w` bytes becomes `w` byte planes of
//! `n` bytes each: plane `i` holds byte `i` of every record. Records of a
//! structured type tend to agree on their high bytes, so the planes compress far
//! better than the interleaved rows.

use crate::error::{Result, TambakError};

//==================================================================================
// 1. Core Logic
//==================================================================================

fn shuffle_slice(input_bytes: &[u8], record_width: usize, output_buf: &mut Vec<u8>) {
    let num_records = input_bytes.len() / record_width;
    output_buf.clear();
    output_buf.resize(input_bytes.len(), 0);

    for (j, record) in input_bytes.chunks_exact(record_width).enumerate() {
        for (i, &byte) in record.iter().enumerate() {
            output_buf[i * num_records + j] = byte;
        }
    }
}

fn unshuffle_slice(input_bytes: &[u8], record_width: usize, output_buf: &mut Vec<u8>) {
    let num_records = input_bytes.len() / record_width;
    output_buf.clear();
    output_buf.resize(input_bytes.len(), 0);

    for (i, plane) in input_bytes.chunks_exact(num_records.max(1)).enumerate() {
        for (j, &byte) in plane.iter().enumerate() {
            output_buf[j * record_width + i] = byte;
        }
    }
}

fn check_shape(len: usize, record_width: usize) -> Result<()> {
    if record_width == 0 || len % record_width != 0 {
        return Err(TambakError::corruption(format!(
            "shuffle: {} bytes are not a whole number of {}-byte records",
            len, record_width
        )));
    }
    Ok(())
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Splits `input_bytes` into byte planes. Single-byte records are copied.
pub fn encode(input_bytes: &[u8], record_width: usize, output_buf: &mut Vec<u8>) -> Result<()> {
    check_shape(input_bytes.len(), record_width).map_err(|e| TambakError::logic(e.to_string()))?;
    if record_width == 1 {
        output_buf.clear();
        output_buf.extend_from_slice(input_bytes);
        return Ok(());
    }
    shuffle_slice(input_bytes, record_width, output_buf);
    Ok(())
}

/// Interleaves byte planes back into records of `record_width` bytes.
pub fn decode(input_bytes: &[u8], record_width: usize, output_buf: &mut Vec<u8>) -> Result<()> {
    check_shape(input_bytes.len(), record_width)?;
    if record_width == 1 {
        output_buf.clear();
        output_buf.extend_from_slice(input_bytes);
        return Ok(());
    }
    unshuffle_slice(input_bytes, record_width, output_buf);
    Ok(())
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_roundtrip_two_byte_records() {
        let original: Vec<u8> = vec![0x02, 0x01, 0x04, 0x03, 0x06, 0x05];

        let mut encoded = Vec::new();
        encode(&original, 2, &mut encoded).unwrap();
        assert_eq!(encoded, vec![0x02, 0x04, 0x06, 0x01, 0x03, 0x05]);

        let mut decoded = Vec::new();
        decode(&encoded, 2, &mut decoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_odd_record_width() {
        let original: Vec<u8> = (0..35).collect();
        let mut encoded = Vec::new();
        encode(&original, 7, &mut encoded).unwrap();
        assert_eq!(&encoded[..5], &[0, 7, 14, 21, 28]);

        let mut decoded = Vec::new();
        decode(&encoded, 7, &mut decoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_single_byte_records_and_empty_input() {
        let mut out = Vec::new();
        encode(&[1, 2, 3], 1, &mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3]);

        encode(&[], 4, &mut out).unwrap();
        assert!(out.is_empty());
        decode(&[], 4, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_decode_invalid_length_error() {
        let mut out = Vec::new();
        assert!(decode(&[1, 2, 3, 4, 5, 6, 7], 2, &mut out).is_err());
        assert!(decode(&[1, 2], 0, &mut out).is_err());
    }
}
