// In: src/frame/mod.rs

//! The self-describing frame envelope.
//!
//! Layout, in order:
//!
//! 1. Magic `b"TKGF"`, format version (varint), flags byte.
//! 2. Input descriptors: count, then per input its type tag, width, element
//!    count and content size. This prefix alone is enough to size outputs.
//! 3. Transform records in encode order: wire id, input stream id, number of
//!    variable outputs, codec header.
//! 4. Stored stream descriptors in store order: stream id, type, width,
//!    element count, content size.
//! 5. Payload: the content of every stored stream, followed for string streams
//!    by their lengths as little-endian `u32`s.
//! 6. Optional `crc32` of the decompressed inputs, then optional `crc32` of
//!    every byte before it.
//!
//! Stream ids are implicit: inputs take `0..nb_inputs`, then each record's
//! outputs (singletons first, then variable outputs) take the next ids.

use serde::Serialize;
use std::io::Cursor;

use crate::error::{ErrorKind, Result, TambakError};
use crate::graph::TransformId;
use crate::kernels::leb128;
use crate::types::{StreamType, StreamView};

pub const MAGIC: [u8; 4] = *b"TKGF";
pub const MIN_FORMAT_VERSION: u32 = 1;
pub const MAX_FORMAT_VERSION: u32 = 3;

const FLAG_CONTENT_CHECKSUM: u8 = 1;
const FLAG_COMPRESSED_CHECKSUM: u8 = 1 << 1;
const KNOWN_FLAGS: u8 = FLAG_CONTENT_CHECKSUM | FLAG_COMPRESSED_CHECKSUM;

/// Hard ceiling on any single stream regenerated while decoding.
const MAX_DECODED_STREAM: u64 = 1 << 32;

/// Worst-case frame size for `src_size` bytes of input.
pub fn compress_bound(src_size: usize) -> usize {
    src_size.saturating_mul(2).saturating_add(520)
}

//==================================================================================
// 1. Frame Records
//==================================================================================

/// Type, width and size of one stream as recorded in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub stream_type: StreamType,
    pub elt_width: usize,
    pub nb_elts: usize,
    /// Content bytes, excluding string lengths.
    pub content_size: usize,
}

impl StreamInfo {
    pub fn of(view: &StreamView<'_>) -> Self {
        Self {
            stream_type: view.stream_type(),
            elt_width: view.elt_width(),
            nb_elts: view.nb_elts(),
            content_size: view.content_size(),
        }
    }

    pub fn matches(&self, view: &StreamView<'_>) -> bool {
        *self == Self::of(view)
    }

    /// Bytes needed to hold the stream, string lengths included.
    pub fn memory_size(&self) -> usize {
        match self.stream_type {
            StreamType::String => self.content_size.saturating_add(self.nb_elts.saturating_mul(4)),
            _ => self.content_size,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.stream_type.tag());
        leb128::encode_one(self.elt_width as u64, out);
        leb128::encode_one(self.nb_elts as u64, out);
        leb128::encode_one(self.content_size as u64, out);
    }

    fn encoded_len(&self) -> usize {
        1 + leb128::encoded_len(self.elt_width as u64)
            + leb128::encoded_len(self.nb_elts as u64)
            + leb128::encoded_len(self.content_size as u64)
    }

    fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let tag = read_bytes(cursor, 1)?[0];
        let stream_type = StreamType::from_tag(tag)
            .ok_or_else(|| TambakError::corruption(format!("frame: unknown stream type {}", tag)))?;
        let elt_width = leb128::decode_usize(cursor)?;
        let nb_elts = leb128::decode_usize(cursor)?;
        let content_size = leb128::decode_usize(cursor)?;
        if !stream_type.is_valid_width(elt_width) {
            return Err(TambakError::corruption(format!(
                "frame: {} stream with width {}",
                stream_type, elt_width
            )));
        }
        if stream_type != StreamType::String
            && nb_elts.checked_mul(elt_width) != Some(content_size)
        {
            return Err(TambakError::corruption(format!(
                "frame: {} elements of width {} cannot occupy {} bytes",
                nb_elts, elt_width, content_size
            )));
        }
        Ok(Self {
            stream_type,
            elt_width,
            nb_elts,
            content_size,
        })
    }
}

/// One transform application, as replayed by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransformRecord {
    pub transform_id: TransformId,
    pub input: usize,
    pub nb_variable: usize,
    pub header: Vec<u8>,
}

impl TransformRecord {
    fn write(&self, out: &mut Vec<u8>) {
        leb128::encode_one(self.transform_id.0, out);
        leb128::encode_one(self.input as u64, out);
        leb128::encode_one(self.nb_variable as u64, out);
        leb128::encode_one(self.header.len() as u64, out);
        out.extend_from_slice(&self.header);
    }

    /// Bytes this record adds to a frame.
    pub fn encoded_len(&self) -> usize {
        leb128::encoded_len(self.transform_id.0 as u64)
            + leb128::encoded_len(self.input as u64)
            + leb128::encoded_len(self.nb_variable as u64)
            + leb128::encoded_len(self.header.len() as u64)
            + self.header.len()
    }

    fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let transform_id = TransformId(leb128::decode_one(cursor)?);
        let input = leb128::decode_usize(cursor)?;
        let nb_variable = leb128::decode_usize(cursor)?;
        let header_len = leb128::decode_usize(cursor)?;
        let header = read_bytes(cursor, header_len)?.to_vec();
        Ok(Self {
            transform_id,
            input,
            nb_variable,
            header,
        })
    }
}

/// Bytes a stored stream adds to a frame: descriptor plus payload.
pub(crate) fn stored_len(id: usize, view: &StreamView<'_>) -> usize {
    let info = StreamInfo::of(view);
    leb128::encoded_len(id as u64) + info.encoded_len() + info.memory_size()
}

/// `crc32` over the logical content of the inputs.
pub(crate) fn content_checksum<'a>(streams: impl IntoIterator<Item = StreamView<'a>>) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for s in streams {
        hasher.update(s.data());
        for len in s.lens() {
            hasher.update(&len.to_le_bytes());
        }
    }
    hasher.finalize()
}

//==================================================================================
// 2. Writing
//==================================================================================

/// Checksum switches of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checksums {
    pub content: bool,
    pub compressed: bool,
}

pub(crate) fn write_frame(
    format_version: u32,
    checksums: Checksums,
    inputs: &[StreamView<'_>],
    records: &[TransformRecord],
    stored: &[(usize, StreamView<'_>)],
) -> Vec<u8> {
    let payload: usize = stored.iter().map(|(id, v)| stored_len(*id, v)).sum();
    let mut out = Vec::with_capacity(64 + payload);

    out.extend_from_slice(&MAGIC);
    leb128::encode_one(format_version, &mut out);
    let mut flags = 0u8;
    if checksums.content {
        flags |= FLAG_CONTENT_CHECKSUM;
    }
    if checksums.compressed {
        flags |= FLAG_COMPRESSED_CHECKSUM;
    }
    out.push(flags);

    leb128::encode_one(inputs.len() as u64, &mut out);
    for input in inputs {
        StreamInfo::of(input).write(&mut out);
    }

    leb128::encode_one(records.len() as u64, &mut out);
    for record in records {
        record.write(&mut out);
    }

    leb128::encode_one(stored.len() as u64, &mut out);
    for (id, view) in stored {
        leb128::encode_one(*id as u64, &mut out);
        StreamInfo::of(view).write(&mut out);
    }
    for (_, view) in stored {
        out.extend_from_slice(view.data());
        for len in view.lens() {
            out.extend_from_slice(&len.to_le_bytes());
        }
    }

    if checksums.content {
        let crc = content_checksum(inputs.iter().copied());
        out.extend_from_slice(&crc.to_le_bytes());
    }
    if checksums.compressed {
        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
    }
    out
}

//==================================================================================
// 3. Parsing
//==================================================================================

/// What the header reveals before any payload byte is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    pub format_version: u32,
    pub outputs: Vec<StreamInfo>,
    /// Sum of the outputs' content sizes.
    pub decompressed_size: usize,
    pub has_content_checksum: bool,
    pub has_compressed_checksum: bool,
}

impl FrameInfo {
    pub fn nb_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Size limit for any stream regenerated while decoding this frame.
    pub(crate) fn decode_budget(&self) -> usize {
        let bytes: u64 = self.outputs.iter().map(|o| o.memory_size() as u64).sum();
        let elts: u64 = self.outputs.iter().map(|o| o.nb_elts as u64).sum();
        let budget = bytes
            .saturating_mul(8)
            .saturating_add(elts.saturating_mul(8))
            .saturating_add(1024)
            .min(MAX_DECODED_STREAM);
        usize::try_from(budget).unwrap_or(usize::MAX)
    }

    /// Size limit for regenerating stream `id`. Frame outputs are held to their
    /// declared size; intermediate streams get the frame-wide budget.
    pub(crate) fn stream_budget(&self, id: usize) -> usize {
        let budget = self.decode_budget();
        match self.outputs.get(id) {
            Some(declared) => declared.memory_size().min(budget),
            None => budget,
        }
    }
}

/// A stored stream located in the payload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StoredStream<'a> {
    pub id: usize,
    pub info: StreamInfo,
    pub data: &'a [u8],
    pub lens: &'a [u8],
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedFrame<'a> {
    pub info: FrameInfo,
    pub records: Vec<TransformRecord>,
    pub stored: Vec<StoredStream<'a>>,
    pub content_checksum: Option<u32>,
    /// `(recorded, computed)` compressed checksums.
    pub compressed_checksum: Option<(u32, u32)>,
}

/// Reads a count that must be plausible given the bytes left, so a forged
/// count cannot trigger a huge allocation.
fn read_count(cursor: &mut Cursor<&[u8]>, min_item_size: usize, what: &str) -> Result<usize> {
    let count = leb128::decode_usize(cursor)?;
    let left = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    if count.saturating_mul(min_item_size) > left {
        return Err(TambakError::corruption(format!(
            "frame: {} {} cannot fit in the {} remaining bytes",
            count, what, left
        )));
    }
    Ok(count)
}

fn read_bytes<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8]> {
    let start = cursor.position() as usize;
    let data: &'a [u8] = cursor.get_ref();
    let end = start
        .checked_add(len)
        .filter(|&e| e <= data.len())
        .ok_or_else(|| TambakError::corruption("frame: truncated"))?;
    cursor.set_position(end as u64);
    Ok(&data[start..end])
}

fn read_u32_le(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    let bytes = read_bytes(cursor, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn parse_header(cursor: &mut Cursor<&[u8]>) -> Result<FrameInfo> {
    let magic = read_bytes(cursor, MAGIC.len())
        .map_err(|_| TambakError::corruption("frame: too short for the magic number"))?;
    if magic != MAGIC {
        return Err(TambakError::corruption("frame: bad magic number"));
    }
    let format_version: u32 = leb128::decode_one(cursor)?;
    if !(MIN_FORMAT_VERSION..=MAX_FORMAT_VERSION).contains(&format_version) {
        return Err(TambakError::new(
            ErrorKind::FormatVersionUnsupported,
            format!(
                "frame format version {} is outside the supported range {}..={}",
                format_version, MIN_FORMAT_VERSION, MAX_FORMAT_VERSION
            ),
        ));
    }
    let flags = read_bytes(cursor, 1)?[0];
    if flags & !KNOWN_FLAGS != 0 {
        return Err(TambakError::corruption(format!("frame: unknown flags {:#04x}", flags)));
    }

    let nb_inputs = read_count(cursor, 4, "inputs")?;
    if nb_inputs == 0 {
        return Err(TambakError::corruption("frame: no outputs declared"));
    }
    let outputs = (0..nb_inputs)
        .map(|_| StreamInfo::read(cursor))
        .collect::<Result<Vec<_>>>()?;
    let decompressed_size = outputs
        .iter()
        .try_fold(0usize, |acc, o| acc.checked_add(o.content_size))
        .ok_or_else(|| TambakError::corruption("frame: decompressed size overflows"))?;

    Ok(FrameInfo {
        format_version,
        outputs,
        decompressed_size,
        has_content_checksum: flags & FLAG_CONTENT_CHECKSUM != 0,
        has_compressed_checksum: flags & FLAG_COMPRESSED_CHECKSUM != 0,
    })
}

/// Parses only the header of a frame.
pub fn frame_info(src: &[u8]) -> Result<FrameInfo> {
    parse_header(&mut Cursor::new(src))
}

pub(crate) fn parse_frame(src: &[u8]) -> Result<ParsedFrame<'_>> {
    let mut cursor = Cursor::new(src);
    let info = parse_header(&mut cursor)?;

    let nb_records = read_count(&mut cursor, 4, "transform records")?;
    let records = (0..nb_records)
        .map(|_| TransformRecord::read(&mut cursor))
        .collect::<Result<Vec<_>>>()?;

    let nb_stored = read_count(&mut cursor, 5, "stored streams")?;
    let mut descriptors = Vec::with_capacity(nb_stored);
    for _ in 0..nb_stored {
        let id = leb128::decode_usize(&mut cursor)?;
        descriptors.push((id, StreamInfo::read(&mut cursor)?));
    }

    let mut stored = Vec::with_capacity(nb_stored);
    for (id, info) in descriptors {
        let data = read_bytes(&mut cursor, info.content_size)?;
        let lens = match info.stream_type {
            StreamType::String => {
                let len = info
                    .nb_elts
                    .checked_mul(4)
                    .ok_or_else(|| TambakError::corruption("frame: string count overflows"))?;
                read_bytes(&mut cursor, len)?
            }
            _ => &[],
        };
        stored.push(StoredStream { id, info, data, lens });
    }

    let content_checksum = if info.has_content_checksum {
        Some(read_u32_le(&mut cursor)?)
    } else {
        None
    };
    let compressed_checksum = if info.has_compressed_checksum {
        let covered = cursor.position() as usize;
        let recorded = read_u32_le(&mut cursor)?;
        Some((recorded, crc32fast::hash(&src[..covered])))
    } else {
        None
    };
    if cursor.position() as usize != src.len() {
        return Err(TambakError::corruption("frame: trailing bytes after the frame"));
    }

    Ok(ParsedFrame {
        info,
        records,
        stored,
        content_checksum,
        compressed_checksum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let values = [1u16, 2, 3];
        let input = StreamView::numeric(&values).unwrap();
        let content = b"abc".to_vec();
        let lens = [1u32, 2];
        let strings = StreamView::strings(&content, &lens).unwrap();
        let record = TransformRecord {
            transform_id: TransformId(7),
            input: 0,
            nb_variable: 0,
            header: vec![2, 2],
        };
        write_frame(
            2,
            Checksums {
                content: true,
                compressed: true,
            },
            &[input, strings],
            &[record],
            &[(2, StreamView::serial(b"zz")), (1, strings)],
        )
    }

    #[test]
    fn test_parse_written_frame() {
        let frame = sample();
        let parsed = parse_frame(&frame).unwrap();
        assert_eq!(parsed.info.format_version, 2);
        assert_eq!(parsed.info.outputs.len(), 2);
        assert_eq!(parsed.info.decompressed_size, 9);
        assert_eq!(parsed.records[0].transform_id, TransformId(7));
        assert_eq!(parsed.records[0].header, vec![2, 2]);
        assert_eq!(parsed.stored[0].data, b"zz");
        assert_eq!(parsed.stored[1].lens, &[1, 0, 0, 0, 2, 0, 0, 0]);
        let (recorded, computed) = parsed.compressed_checksum.unwrap();
        assert_eq!(recorded, computed);
    }

    #[test]
    fn test_info_needs_only_the_header() {
        let frame = sample();
        let info = frame_info(&frame[..24]).unwrap();
        assert_eq!(info.outputs[0].stream_type, StreamType::Numeric);
        assert_eq!(info.outputs[1].nb_elts, 2);
    }

    #[test]
    fn test_version_gating() {
        let mut frame = sample();
        frame[4] = (MAX_FORMAT_VERSION + 1) as u8;
        assert_eq!(frame_info(&frame).unwrap_err().kind(), ErrorKind::FormatVersionUnsupported);
        frame[4] = 0;
        assert_eq!(frame_info(&frame).unwrap_err().kind(), ErrorKind::FormatVersionUnsupported);
    }

    #[test]
    fn test_truncation_is_corruption() {
        let frame = sample();
        for cut in 0..frame.len() {
            let err = parse_frame(&frame[..cut]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Corruption, "cut at {}", cut);
        }
    }

    #[test]
    fn test_stored_len_matches_writer() {
        let view = StreamView::serial(b"hello");
        let with = write_frame(1, Checksums { content: false, compressed: false }, &[view], &[], &[(0, view)]);
        let without = write_frame(1, Checksums { content: false, compressed: false }, &[view], &[], &[]);
        // The stored count varint is one byte in both frames.
        assert_eq!(with.len() - without.len(), stored_len(0, &view));
    }

    #[test]
    fn test_outputs_are_budgeted_by_their_descriptors() {
        let info = parse_frame(&sample()).unwrap().info;
        let budget = info.decode_budget();
        assert_eq!(budget, 8 * (6 + 11) + 8 * (3 + 2) + 1024);
        assert_eq!(info.stream_budget(0), 6);
        assert_eq!(info.stream_budget(1), 3 + 2 * 4);
        assert_eq!(info.stream_budget(2), budget);
    }
}
