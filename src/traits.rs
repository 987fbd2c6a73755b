//! This module defines shared traits used across different kernels.

/// A trait that maps an unsigned integer type to its signed counterpart.
pub trait HasSigned {
    type Signed;
}

// Implement the trait for all primitive integer widths the engine stores.
macro_rules! impl_signed_pair {
    ($S:ty, $U:ty) => {
        impl HasSigned for $U {
            type Signed = $S;
        }
    };
}

impl_signed_pair!(i8, u8);
impl_signed_pair!(i16, u16);
impl_signed_pair!(i32, u32);
impl_signed_pair!(i64, u64);
