// In: src/bridge/stateless_api.rs

use std::sync::{Arc, OnceLock};

use crate::config::CompressionParams;
use crate::engine::{CCtx, DCtx};
use crate::error::Result;
use crate::graph::{graphs, Compressor};
use crate::types::{TypedBuffer, TypedRef};

/// The shared standard configuration: every standard node and graph, with
/// `GENERIC` as the start graph and default parameters.
pub fn default_compressor() -> Arc<Compressor> {
    static DEFAULT: OnceLock<Arc<Compressor>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| {
        let mut compressor = Compressor::new();
        // GENERIC is installed by `Compressor::new`, so selecting it cannot fail.
        let _ = compressor.select_starting_graph(graphs::GENERIC);
        Arc::new(compressor)
    }))
}

fn context() -> CCtx {
    let mut cctx = CCtx::new();
    cctx.ref_compressor(default_compressor());
    cctx
}

/// Compresses untyped bytes into a single-input frame.
pub fn compress_serial(src: &[u8]) -> Result<Vec<u8>> {
    context().compress_serial(src)
}

/// Like [`compress_serial`], with `params` applied on top of the defaults.
pub fn compress_serial_with(src: &[u8], params: &CompressionParams) -> Result<Vec<u8>> {
    let mut cctx = context();
    cctx.set_parameters(params.clone())?;
    cctx.compress_serial(src)
}

/// Compresses any number of typed inputs into one frame.
pub fn compress_typed(inputs: &[TypedRef<'_>]) -> Result<Vec<u8>> {
    context().compress(inputs)
}

/// Decompresses a frame holding exactly one serial stream.
pub fn decompress_serial(src: &[u8]) -> Result<Vec<u8>> {
    DCtx::new().decompress_serial(src)
}

/// Decompresses every output of a frame, in input order.
pub fn decompress_typed(src: &[u8]) -> Result<Vec<TypedBuffer>> {
    DCtx::new().decompress(src)
}
