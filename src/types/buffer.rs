//! Owned and borrowed stream containers.
//!
//! `StreamView` is the borrowed form handed to transforms and callers
//! (`TypedRef` is its public alias for compression inputs). `TypedBuffer` is the
//! owned form the engine materializes for every runtime stream and returns from
//! decompression.

use crate::error::{Result, TambakError};
use crate::types::StreamType;
use crate::utils;

//==================================================================================
// 1. Borrowed View
//==================================================================================

/// A borrowed, validated view over one typed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamView<'a> {
    stream_type: StreamType,
    elt_width: usize,
    data: &'a [u8],
    lens: &'a [u32],
}

/// Compression inputs are plain stream views.
pub type TypedRef<'a> = StreamView<'a>;

impl<'a> StreamView<'a> {
    /// Untyped bytes.
    pub fn serial(data: &'a [u8]) -> Self {
        Self {
            stream_type: StreamType::Serial,
            elt_width: 1,
            data,
            lens: &[],
        }
    }

    /// A numeric stream viewed from a typed slice. `T` must be 1, 2, 4 or 8 bytes.
    pub fn numeric<T: bytemuck::Pod>(values: &'a [T]) -> Result<Self> {
        Self::numeric_bytes(std::mem::size_of::<T>(), bytemuck::cast_slice(values))
    }

    /// A numeric stream over raw little-endian bytes.
    pub fn numeric_bytes(elt_width: usize, data: &'a [u8]) -> Result<Self> {
        Self::fixed(StreamType::Numeric, elt_width, data)
    }

    /// Fixed-width records.
    pub fn structs(elt_width: usize, data: &'a [u8]) -> Result<Self> {
        Self::fixed(StreamType::Struct, elt_width, data)
    }

    /// Variable-length strings. `lens` must sum exactly to `content.len()`.
    pub fn strings(content: &'a [u8], lens: &'a [u32]) -> Result<Self> {
        let total: u64 = lens.iter().map(|&l| l as u64).sum();
        if total != content.len() as u64 {
            return Err(TambakError::new(
                crate::error::ErrorKind::InputTypeUnsupported,
                format!(
                    "string lengths sum to {} but content holds {} bytes",
                    total,
                    content.len()
                ),
            ));
        }
        Ok(Self {
            stream_type: StreamType::String,
            elt_width: 0,
            data: content,
            lens,
        })
    }

    fn fixed(stream_type: StreamType, elt_width: usize, data: &'a [u8]) -> Result<Self> {
        if !stream_type.is_valid_width(elt_width) || data.len() % elt_width != 0 {
            return Err(TambakError::new(
                crate::error::ErrorKind::InputTypeUnsupported,
                format!(
                    "{} stream of {} bytes cannot have element width {}",
                    stream_type,
                    data.len(),
                    elt_width
                ),
            ));
        }
        Ok(Self {
            stream_type,
            elt_width,
            data,
            lens: &[],
        })
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// Element width in bytes; 0 for strings.
    pub fn elt_width(&self) -> usize {
        self.elt_width
    }

    pub fn nb_elts(&self) -> usize {
        match self.stream_type {
            StreamType::String => self.lens.len(),
            _ => self.data.len() / self.elt_width,
        }
    }

    /// Content size in bytes (excluding string lengths).
    pub fn content_size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn lens(&self) -> &'a [u32] {
        self.lens
    }

    /// Widens a numeric stream into `u64` values.
    pub fn uints(&self) -> Result<Vec<u64>> {
        if self.stream_type != StreamType::Numeric {
            return Err(TambakError::logic(format!(
                "uints() called on a {} stream",
                self.stream_type
            )));
        }
        utils::uints_from_bytes(self.data, self.elt_width)
    }

    /// Iterates over the strings of a string stream.
    pub fn strings_iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let data = self.data;
        let lens = self.lens;
        lens.iter().scan(0usize, move |pos, &len| {
            let start = *pos;
            *pos += len as usize;
            Some(&data[start..*pos])
        })
    }

    /// The elements `start..end` of this stream.
    pub fn slice(&self, start: usize, end: usize) -> Result<StreamView<'a>> {
        if start > end || end > self.nb_elts() {
            return Err(TambakError::logic(format!(
                "slice {}..{} out of range for {} elements",
                start,
                end,
                self.nb_elts()
            )));
        }
        let (data, lens) = match self.stream_type {
            StreamType::String => {
                let offset: usize = self.lens[..start].iter().map(|&l| l as usize).sum();
                let size: usize = self.lens[start..end].iter().map(|&l| l as usize).sum();
                (&self.data[offset..offset + size], &self.lens[start..end])
            }
            _ => (
                &self.data[start * self.elt_width..end * self.elt_width],
                self.lens,
            ),
        };
        Ok(StreamView {
            stream_type: self.stream_type,
            elt_width: self.elt_width,
            data,
            lens,
        })
    }

    pub fn to_owned_buffer(&self) -> TypedBuffer {
        TypedBuffer {
            stream_type: self.stream_type,
            elt_width: self.elt_width,
            data: self.data.to_vec(),
            lens: self.lens.to_vec(),
        }
    }
}

//==================================================================================
// 2. Owned Buffer
//==================================================================================

/// An owned typed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedBuffer {
    stream_type: StreamType,
    elt_width: usize,
    data: Vec<u8>,
    lens: Vec<u32>,
}

impl TypedBuffer {
    pub fn serial(data: Vec<u8>) -> Self {
        Self {
            stream_type: StreamType::Serial,
            elt_width: 1,
            data,
            lens: Vec::new(),
        }
    }

    pub fn numeric_from<T: bytemuck::Pod>(values: &[T]) -> Result<Self> {
        Self::from_parts(
            StreamType::Numeric,
            std::mem::size_of::<T>(),
            utils::typed_slice_to_bytes(values),
            Vec::new(),
        )
    }

    /// Builds a numeric buffer by narrowing `u64` values to `elt_width` bytes.
    pub fn numeric_from_uints(elt_width: usize, values: &[u64]) -> Result<Self> {
        Self::from_parts(
            StreamType::Numeric,
            elt_width,
            utils::uints_to_bytes(values, elt_width),
            Vec::new(),
        )
    }

    /// Validating constructor used by the engine for every materialized stream.
    pub fn from_parts(
        stream_type: StreamType,
        elt_width: usize,
        data: Vec<u8>,
        lens: Vec<u32>,
    ) -> Result<Self> {
        // Validate through the borrowed constructors so the rules live in one place.
        match stream_type {
            StreamType::Serial => {
                if elt_width != 1 {
                    return Err(TambakError::logic("serial streams have width 1"));
                }
            }
            StreamType::Numeric => {
                StreamView::numeric_bytes(elt_width, &data)?;
            }
            StreamType::Struct => {
                StreamView::structs(elt_width, &data)?;
            }
            StreamType::String => {
                StreamView::strings(&data, &lens)?;
            }
        }
        if stream_type != StreamType::String && !lens.is_empty() {
            return Err(TambakError::logic("only string streams carry lengths"));
        }
        Ok(Self {
            stream_type,
            elt_width,
            data,
            lens,
        })
    }

    /// Concatenates streams that all share `stream_type` and `elt_width`.
    pub fn concat(
        stream_type: StreamType,
        elt_width: usize,
        parts: &[StreamView<'_>],
    ) -> Result<Self> {
        let mut data = Vec::with_capacity(parts.iter().map(|p| p.data.len()).sum());
        let mut lens = Vec::new();
        for part in parts {
            if part.stream_type != stream_type || part.elt_width != elt_width {
                return Err(TambakError::corruption(format!(
                    "cannot join a {} stream of width {} into a {} stream of width {}",
                    part.stream_type, part.elt_width, stream_type, elt_width
                )));
            }
            data.extend_from_slice(part.data);
            lens.extend_from_slice(part.lens);
        }
        Self::from_parts(stream_type, elt_width, data, lens)
    }

    pub fn view(&self) -> StreamView<'_> {
        StreamView {
            stream_type: self.stream_type,
            elt_width: self.elt_width,
            data: &self.data,
            lens: &self.lens,
        }
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    pub fn elt_width(&self) -> usize {
        self.elt_width
    }

    pub fn nb_elts(&self) -> usize {
        self.view().nb_elts()
    }

    pub fn content_size(&self) -> usize {
        self.data.len()
    }

    /// Bytes held in memory by this buffer, lengths included.
    pub fn memory_size(&self) -> usize {
        self.data.len() + self.lens.len() * 4
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn lens(&self) -> &[u32] {
        &self.lens
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u32>) {
        (self.data, self.lens)
    }

    /// Copies a numeric stream out as typed values. The width of `T` must match.
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Result<Vec<T>> {
        if self.stream_type != StreamType::Numeric
            || std::mem::size_of::<T>() != self.elt_width
        {
            return Err(TambakError::new(
                crate::error::ErrorKind::InputTypeUnsupported,
                format!(
                    "cannot read a {} stream of width {} as {}-byte values",
                    self.stream_type,
                    self.elt_width,
                    std::mem::size_of::<T>()
                ),
            ));
        }
        utils::bytes_to_typed_vec(&self.data)
    }

    /// Copies the strings of a string stream out.
    pub fn to_strings(&self) -> Vec<Vec<u8>> {
        self.view().strings_iter().map(|s| s.to_vec()).collect()
    }
}
