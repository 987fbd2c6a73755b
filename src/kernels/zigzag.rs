//! This module contains the pure, stateless kernels for Zig-zag encoding and
//! decoding.
//!
//! This technique is a Layer 3 (Bit-Width Reduction) transform. Numeric streams
//! are stored unsigned; zig-zag reinterprets each value as a two's-complement
//! signed integer of the same width and maps small magnitudes of either sign to
//! small unsigned values.

use num_traits::{AsPrimitive, PrimInt, Signed, Unsigned};

use crate::traits::HasSigned;

//==================================================================================
// 1. Generic Core Logic
//==================================================================================

/// Zig-zag encodes a value whose bits are a signed integer of the same width.
#[inline]
pub fn encode_val<U>(n: U) -> U
where
    U: PrimInt + Unsigned + HasSigned + AsPrimitive<U::Signed>,
    U::Signed: PrimInt + Signed + AsPrimitive<U>,
{
    let bits = std::mem::size_of::<U>() * 8;
    let signed: U::Signed = n.as_();
    // The right shift on the signed type is arithmetic.
    let mapped = (signed << 1) ^ (signed >> (bits - 1));
    mapped.as_()
}

/// Inverts [`encode_val`].
#[inline]
pub fn decode_val<U>(n: U) -> U
where
    U: PrimInt + Unsigned + HasSigned + AsPrimitive<U::Signed>,
    U::Signed: PrimInt + Signed + AsPrimitive<U>,
{
    let shifted: U::Signed = (n >> 1).as_();
    let lsb: U::Signed = (n & U::one()).as_();
    (shifted ^ -lsb).as_()
}

//==================================================================================
// 2. Public API
//==================================================================================

pub fn encode<U>(input_slice: &[U]) -> Vec<U>
where
    U: PrimInt + Unsigned + HasSigned + AsPrimitive<U::Signed>,
    U::Signed: PrimInt + Signed + AsPrimitive<U>,
{
    input_slice.iter().map(|&v| encode_val(v)).collect()
}

pub fn decode<U>(input_slice: &[U]) -> Vec<U>
where
    U: PrimInt + Unsigned + HasSigned + AsPrimitive<U::Signed>,
    U::Signed: PrimInt + Signed + AsPrimitive<U>,
{
    input_slice.iter().map(|&v| decode_val(v)).collect()
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
