// In: src/config.rs

//! The single source of truth for all engine parameters.
//!
//! Parameters are layered. A [`Compressor`](crate::graph::Compressor) carries a
//! `CompressionParams` set, each compression context carries another, and
//! resolution walks context > compressor > built-in defaults, field by field. An
//! unset (`None`) field always inherits. The result is a fully concrete
//! [`ResolvedCompressionParams`] consumed by the engine for one call.
//!
//! Every struct here is `serde`-serializable so a parameter set can be loaded
//! from (or exported to) JSON at the application boundary.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TambakError};
use crate::frame::{MAX_FORMAT_VERSION, MIN_FORMAT_VERSION};

/// Compression and decompression levels are accepted in this range.
pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 22;

pub const DEFAULT_COMPRESSION_LEVEL: i32 = 6;
pub const DEFAULT_DECOMPRESSION_LEVEL: i32 = 3;
pub const DEFAULT_MIN_STREAM_SIZE: usize = 10;

//==================================================================================
// I. Parameter Keys & Profiles
//==================================================================================

/// Enumerated compression parameters, addressable through
/// `set_parameter` / `get_parameter` with integer values.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CParam {
    /// Keep the context's parameters across calls instead of resetting them.
    StickyParameters,
    CompressionLevel,
    DecompressionLevel,
    FormatVersion,
    /// Downgrade recoverable transform failures to warnings plus a fallback.
    PermissiveCompression,
    CompressedChecksum,
    ContentChecksum,
    /// Streams smaller than this many bytes are stored without further processing.
    MinStreamSize,
}

/// Enumerated decompression parameters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DParam {
    StickyParameters,
    CheckCompressedChecksum,
    CheckContentChecksum,
    MinFormatVersion,
    MaxFormatVersion,
}

/// Defines the trade-off between compression speed and final size.
///
/// A profile is a shorthand for a compression level; an explicit level always
/// takes precedence.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompressionProfile {
    /// Prioritizes speed. Skips order-1 modeling and block splitting.
    Fast,

    /// A balance between speed and size. This is the recommended default.
    #[default]
    Balanced,

    /// Prioritizes the smallest output at the cost of CPU time.
    HighCompression,
}

impl CompressionProfile {
    pub fn compression_level(self) -> i32 {
        match self {
            CompressionProfile::Fast => 1,
            CompressionProfile::Balanced => DEFAULT_COMPRESSION_LEVEL,
            CompressionProfile::HighCompression => 19,
        }
    }
}

fn as_bool(value: i64) -> bool {
    value != 0
}

fn check_level(value: i64) -> Result<i32> {
    i32::try_from(value)
        .ok()
        .filter(|v| (MIN_LEVEL..=MAX_LEVEL).contains(v))
        .ok_or_else(|| {
            TambakError::parameter(format!(
                "level {} outside {}..={}",
                value, MIN_LEVEL, MAX_LEVEL
            ))
        })
}

fn check_version(value: i64) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| (MIN_FORMAT_VERSION..=MAX_FORMAT_VERSION).contains(v))
        .ok_or_else(|| {
            TambakError::parameter(format!(
                "format version {} outside {}..={}",
                value, MIN_FORMAT_VERSION, MAX_FORMAT_VERSION
            ))
        })
}

//==================================================================================
// II. Compression Parameters
//==================================================================================

/// A partial compression parameter set. `None` means "inherit".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct CompressionParams {
    pub sticky_parameters: Option<bool>,
    pub compression_level: Option<i32>,
    pub decompression_level: Option<i32>,
    pub format_version: Option<u32>,
    pub permissive_compression: Option<bool>,
    pub compressed_checksum: Option<bool>,
    pub content_checksum: Option<bool>,
    pub min_stream_size: Option<usize>,

    /// Used for the compression level when no explicit level is set.
    pub profile: Option<CompressionProfile>,
}

impl CompressionParams {
    /// Sets one parameter, validating its range.
    pub fn set(&mut self, param: CParam, value: i64) -> Result<()> {
        match param {
            CParam::StickyParameters => self.sticky_parameters = Some(as_bool(value)),
            CParam::CompressionLevel => self.compression_level = Some(check_level(value)?),
            CParam::DecompressionLevel => self.decompression_level = Some(check_level(value)?),
            CParam::FormatVersion => self.format_version = Some(check_version(value)?),
            CParam::PermissiveCompression => self.permissive_compression = Some(as_bool(value)),
            CParam::CompressedChecksum => self.compressed_checksum = Some(as_bool(value)),
            CParam::ContentChecksum => self.content_checksum = Some(as_bool(value)),
            CParam::MinStreamSize => {
                let size = usize::try_from(value).map_err(|_| {
                    TambakError::parameter(format!("min stream size {} is negative", value))
                })?;
                self.min_stream_size = Some(size);
            }
        }
        Ok(())
    }

    /// The explicitly set value of one parameter, if any.
    pub fn get(&self, param: CParam) -> Option<i64> {
        match param {
            CParam::StickyParameters => self.sticky_parameters.map(i64::from),
            CParam::CompressionLevel => self.compression_level.map(i64::from),
            CParam::DecompressionLevel => self.decompression_level.map(i64::from),
            CParam::FormatVersion => self.format_version.map(i64::from),
            CParam::PermissiveCompression => self.permissive_compression.map(i64::from),
            CParam::CompressedChecksum => self.compressed_checksum.map(i64::from),
            CParam::ContentChecksum => self.content_checksum.map(i64::from),
            CParam::MinStreamSize => self.min_stream_size.map(|v| v as i64),
        }
    }

    /// Re-checks every set field. Used after loading from JSON.
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = self.compression_level {
            check_level(level as i64)?;
        }
        if let Some(level) = self.decompression_level {
            check_level(level as i64)?;
        }
        if let Some(version) = self.format_version {
            check_version(version as i64)?;
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Field-wise layering: values set in `self` win over `base`.
    pub fn overlay(&self, base: &CompressionParams) -> CompressionParams {
        CompressionParams {
            sticky_parameters: self.sticky_parameters.or(base.sticky_parameters),
            compression_level: self.compression_level.or(base.compression_level),
            decompression_level: self.decompression_level.or(base.decompression_level),
            format_version: self.format_version.or(base.format_version),
            permissive_compression: self.permissive_compression.or(base.permissive_compression),
            compressed_checksum: self.compressed_checksum.or(base.compressed_checksum),
            content_checksum: self.content_checksum.or(base.content_checksum),
            min_stream_size: self.min_stream_size.or(base.min_stream_size),
            profile: self.profile.or(base.profile),
        }
    }

    /// Fills every unset field from the built-in defaults.
    pub fn resolve(&self) -> ResolvedCompressionParams {
        let defaults = ResolvedCompressionParams::default();
        let profile_level = self.profile.map(CompressionProfile::compression_level);
        ResolvedCompressionParams {
            sticky_parameters: self.sticky_parameters.unwrap_or(defaults.sticky_parameters),
            compression_level: self
                .compression_level
                .or(profile_level)
                .unwrap_or(defaults.compression_level),
            decompression_level: self
                .decompression_level
                .unwrap_or(defaults.decompression_level),
            format_version: self.format_version.unwrap_or(defaults.format_version),
            permissive_compression: self
                .permissive_compression
                .unwrap_or(defaults.permissive_compression),
            compressed_checksum: self
                .compressed_checksum
                .unwrap_or(defaults.compressed_checksum),
            content_checksum: self.content_checksum.unwrap_or(defaults.content_checksum),
            min_stream_size: self.min_stream_size.unwrap_or(defaults.min_stream_size),
        }
    }
}

/// The concrete parameters of one compression call.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ResolvedCompressionParams {
    pub sticky_parameters: bool,
    pub compression_level: i32,
    pub decompression_level: i32,
    pub format_version: u32,
    pub permissive_compression: bool,
    pub compressed_checksum: bool,
    pub content_checksum: bool,
    pub min_stream_size: usize,
}

impl Default for ResolvedCompressionParams {
    fn default() -> Self {
        Self {
            sticky_parameters: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            decompression_level: DEFAULT_DECOMPRESSION_LEVEL,
            format_version: MAX_FORMAT_VERSION,
            permissive_compression: false,
            compressed_checksum: true,
            content_checksum: true,
            min_stream_size: DEFAULT_MIN_STREAM_SIZE,
        }
    }
}

impl ResolvedCompressionParams {
    pub fn get(&self, param: CParam) -> i64 {
        match param {
            CParam::StickyParameters => self.sticky_parameters as i64,
            CParam::CompressionLevel => self.compression_level as i64,
            CParam::DecompressionLevel => self.decompression_level as i64,
            CParam::FormatVersion => self.format_version as i64,
            CParam::PermissiveCompression => self.permissive_compression as i64,
            CParam::CompressedChecksum => self.compressed_checksum as i64,
            CParam::ContentChecksum => self.content_checksum as i64,
            CParam::MinStreamSize => self.min_stream_size as i64,
        }
    }
}

//==================================================================================
// III. Decompression Parameters
//==================================================================================

/// Decompression parameters. Unlike compression there is no layering: a
/// decompression context owns one concrete set.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct DecompressionParams {
    pub sticky_parameters: bool,
    pub check_compressed_checksum: bool,
    pub check_content_checksum: bool,
    pub min_format_version: u32,
    pub max_format_version: u32,
}

impl Default for DecompressionParams {
    fn default() -> Self {
        Self {
            sticky_parameters: false,
            check_compressed_checksum: true,
            check_content_checksum: true,
            min_format_version: MIN_FORMAT_VERSION,
            max_format_version: MAX_FORMAT_VERSION,
        }
    }
}

impl DecompressionParams {
    pub fn set(&mut self, param: DParam, value: i64) -> Result<()> {
        match param {
            DParam::StickyParameters => self.sticky_parameters = as_bool(value),
            DParam::CheckCompressedChecksum => self.check_compressed_checksum = as_bool(value),
            DParam::CheckContentChecksum => self.check_content_checksum = as_bool(value),
            DParam::MinFormatVersion => self.min_format_version = check_version(value)?,
            DParam::MaxFormatVersion => self.max_format_version = check_version(value)?,
        }
        Ok(())
    }

    pub fn get(&self, param: DParam) -> i64 {
        match param {
            DParam::StickyParameters => self.sticky_parameters as i64,
            DParam::CheckCompressedChecksum => self.check_compressed_checksum as i64,
            DParam::CheckContentChecksum => self.check_content_checksum as i64,
            DParam::MinFormatVersion => self.min_format_version as i64,
            DParam::MaxFormatVersion => self.max_format_version as i64,
        }
    }
}

//==================================================================================
// IV. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_layering_prefers_context_over_compressor() {
        let mut compressor = CompressionParams::default();
        compressor.set(CParam::CompressionLevel, 3).unwrap();
        compressor.set(CParam::ContentChecksum, 0).unwrap();

        let mut context = CompressionParams::default();
        context.set(CParam::CompressionLevel, 9).unwrap();

        let resolved = context.overlay(&compressor).resolve();
        assert_eq!(resolved.compression_level, 9);
        assert!(!resolved.content_checksum);
        assert!(resolved.compressed_checksum);
        assert_eq!(resolved.format_version, MAX_FORMAT_VERSION);
        assert_eq!(resolved.min_stream_size, DEFAULT_MIN_STREAM_SIZE);
    }

    #[test]
    fn test_profile_is_overridden_by_explicit_level() {
        let mut params = CompressionParams {
            profile: Some(CompressionProfile::HighCompression),
            ..Default::default()
        };
        assert_eq!(params.resolve().compression_level, 19);
        params.set(CParam::CompressionLevel, 2).unwrap();
        assert_eq!(params.resolve().compression_level, 2);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let mut params = CompressionParams::default();
        for (param, value) in [
            (CParam::FormatVersion, 0),
            (CParam::FormatVersion, MAX_FORMAT_VERSION as i64 + 1),
            (CParam::CompressionLevel, 23),
            (CParam::DecompressionLevel, 0),
            (CParam::MinStreamSize, -1),
        ] {
            let err = params.set(param, value).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ParameterInvalid);
        }
        assert_eq!(params, CompressionParams::default());

        let mut dparams = DecompressionParams::default();
        assert!(dparams.set(DParam::MaxFormatVersion, 99).is_err());
        dparams.set(DParam::CheckContentChecksum, 0).unwrap();
        assert_eq!(dparams.get(DParam::CheckContentChecksum), 0);
    }

    #[test]
    fn test_json_loading() {
        let params = CompressionParams::from_json(
            r#"{ "compression_level": 4, "permissive_compression": true, "profile": "fast" }"#,
        )
        .unwrap();
        assert_eq!(params.get(CParam::CompressionLevel), Some(4));
        assert_eq!(params.get(CParam::FormatVersion), None);
        assert!(params.resolve().permissive_compression);

        let err = CompressionParams::from_json(r#"{ "format_version": 42 }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterInvalid);
    }
}
