//! This module defines the core, strongly-typed data representations that flow
//! through the graph engine.
//!
//! It includes the `StreamType` enum describing what a runtime stream contains,
//! the `TypeMask` bitset nodes and graphs use to declare what they accept, and
//! the owned (`TypedBuffer`) and borrowed (`StreamView`) stream containers.

pub mod buffer;
pub mod stream_type;

// Re-export the main types for easier access.
pub use buffer::{StreamView, TypedBuffer, TypedRef};
pub use stream_type::{StreamType, TypeMask};
