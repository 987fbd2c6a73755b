//! This module contains the pure, stateless kernels for Zstandard compression and
//! decompression.
//!
//! It backs the `zstd` byte-pipe transform and the generic fallback path. The
//! encoded form is a `u64` little-endian uncompressed length followed by a single
//! zstd frame, so the decoder can size its destination before decoding. This module
//! is a safe, panic-free wrapper around the `zstd` crate's bulk API.

use crate::error::{Result, TambakError};

/// Size of the uncompressed-length prefix.
pub const LEN_PREFIX: usize = 8;

//==================================================================================
// 1. Public API
//==================================================================================

/// Worst-case encoded size for `src_size` input bytes.
pub fn encode_bound(src_size: usize) -> usize {
    LEN_PREFIX + zstd::zstd_safe::compress_bound(src_size)
}

/// Compresses `input_bytes` into `dst`, returning the number of bytes written.
pub fn encode_into(input_bytes: &[u8], dst: &mut [u8], level: i32) -> Result<usize> {
    if dst.len() < LEN_PREFIX {
        return Err(TambakError::new(
            crate::error::ErrorKind::DstCapacityTooSmall,
            "zstd: destination cannot hold the length prefix",
        ));
    }
    let (prefix, body) = dst.split_at_mut(LEN_PREFIX);
    prefix.copy_from_slice(&(input_bytes.len() as u64).to_le_bytes());
    let written = zstd::bulk::compress_to_buffer(input_bytes, body, level)
        .map_err(|e| TambakError::transform_failed(format!("zstd: {}", e)))?;
    Ok(LEN_PREFIX + written)
}

/// Convenience wrapper returning an owned buffer.
pub fn encode(input_bytes: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut out = vec![0u8; encode_bound(input_bytes.len())];
    let written = encode_into(input_bytes, &mut out, level)?;
    out.truncate(written);
    Ok(out)
}

/// Reads the uncompressed length recorded in an encoded buffer.
pub fn decoded_size(input_bytes: &[u8]) -> Result<usize> {
    let prefix: [u8; LEN_PREFIX] = input_bytes
        .get(..LEN_PREFIX)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            TambakError::corruption("zstd: input too short to contain the size header")
        })?;
    usize::try_from(u64::from_le_bytes(prefix))
        .map_err(|_| TambakError::corruption("zstd: declared size exceeds usize"))
}

/// Decompresses into `dst`, which must be exactly `decoded_size` bytes long.
pub fn decode_into(input_bytes: &[u8], dst: &mut [u8]) -> Result<usize> {
    let expected = decoded_size(input_bytes)?;
    if dst.len() < expected {
        return Err(TambakError::corruption(format!(
            "zstd: destination holds {} bytes, header declares {}",
            dst.len(),
            expected
        )));
    }
    let written =
        zstd::bulk::decompress_to_buffer(&input_bytes[LEN_PREFIX..], &mut dst[..expected])
            .map_err(|e| TambakError::corruption(format!("zstd: {}", e)))?;
    if written != expected {
        return Err(TambakError::corruption(format!(
            "zstd: decompressed size does not match header. Expected {}, got {}.",
            expected, written
        )));
    }
    Ok(written)
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
