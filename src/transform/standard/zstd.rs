//! Zstandard as a byte-pipe transform.

use crate::error::Result;
use crate::kernels::zstd as kernel;
use crate::transform::standard::param;
use crate::transform::{PipeTransform, TransformContext};

pub(crate) struct ZstdTransform;

impl ZstdTransform {
    /// An explicit level parameter wins; otherwise the compression level maps
    /// straight onto zstd's own 1..=22 scale.
    fn level(ctx: &TransformContext<'_>) -> i32 {
        let level = ctx
            .int_param(param::ZSTD_LEVEL)
            .unwrap_or(ctx.compression_level() as i64);
        level.clamp(1, 22) as i32
    }
}

impl PipeTransform for ZstdTransform {
    fn encoded_bound(&self, src_size: usize) -> usize {
        kernel::encode_bound(src_size)
    }

    fn encode(&self, src: &[u8], dst: &mut [u8], ctx: &TransformContext<'_>) -> Result<usize> {
        kernel::encode_into(src, dst, Self::level(ctx))
    }

    fn decoded_size(&self, src: &[u8]) -> Result<usize> {
        kernel::decoded_size(src)
    }

    fn decode(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        kernel::decode_into(src, dst)
    }
}
