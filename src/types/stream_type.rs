//! This module defines the canonical, type-safe description of a runtime stream's
//! element type, and the mask used to declare accepted input types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The element type of a runtime stream.
///
/// The tag values returned by [`StreamType::tag`] are written into frames and are
/// part of the wire contract.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    /// Untyped bytes. Element width is always 1.
    Serial,
    /// Fixed-width opaque records of any positive width.
    Struct,
    /// Little-endian unsigned integers of width 1, 2, 4 or 8.
    Numeric,
    /// Variable-length strings: content bytes plus a `u32` length per string.
    String,
}

impl StreamType {
    pub const ALL: [StreamType; 4] = [
        StreamType::Serial,
        StreamType::Struct,
        StreamType::Numeric,
        StreamType::String,
    ];

    pub fn tag(self) -> u8 {
        match self {
            StreamType::Serial => 0,
            StreamType::Struct => 1,
            StreamType::Numeric => 2,
            StreamType::String => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(StreamType::Serial),
            1 => Some(StreamType::Struct),
            2 => Some(StreamType::Numeric),
            3 => Some(StreamType::String),
            _ => None,
        }
    }

    pub fn mask(self) -> TypeMask {
        TypeMask(1 << self.tag())
    }

    /// Returns `true` if `width` is a legal element width for this type.
    pub fn is_valid_width(self, width: usize) -> bool {
        match self {
            StreamType::Serial => width == 1,
            StreamType::Struct => width > 0,
            StreamType::Numeric => matches!(width, 1 | 2 | 4 | 8),
            StreamType::String => width == 0,
        }
    }
}

/// Provides the canonical string representation for a `StreamType`.
impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A set of stream types, used by nodes and graphs to declare which inputs they
/// accept.
#[derive(Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TypeMask(u8);

impl TypeMask {
    pub const NONE: TypeMask = TypeMask(0);
    pub const SERIAL: TypeMask = TypeMask(1);
    pub const STRUCT: TypeMask = TypeMask(1 << 1);
    pub const NUMERIC: TypeMask = TypeMask(1 << 2);
    pub const STRING: TypeMask = TypeMask(1 << 3);
    pub const ANY: TypeMask = TypeMask(0b1111);

    pub fn contains(self, stream_type: StreamType) -> bool {
        self.0 & stream_type.mask().0 != 0
    }

    pub fn union(self, other: TypeMask) -> TypeMask {
        TypeMask(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The single type in this mask, if it holds exactly one.
    pub fn single(self) -> Option<StreamType> {
        let mut found = None;
        for t in StreamType::ALL {
            if self.contains(t) {
                if found.is_some() {
                    return None;
                }
                found = Some(t);
            }
        }
        found
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl From<StreamType> for TypeMask {
    fn from(t: StreamType) -> Self {
        t.mask()
    }
}

impl fmt::Debug for TypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = StreamType::ALL
            .iter()
            .filter(|t| self.contains(**t))
            .map(|t| t.to_string())
            .collect();
        write!(f, "TypeMask({})", names.join("|"))
    }
}
