//! Pluggable block compression.
//!
//! Compression is a closed set of codecs dispatched by a match rather than
//! trait objects. Codecs are looked up by name at construction time; an
//! unknown name is a configuration error, not a runtime fallback.

use crate::error::{Error, Result};

/// Hard ceiling on decompressed block size (20 MiB).
///
/// Uncompression of an LZ4 block does not know the output size up front;
/// the output buffer is doubled on failure until this limit.
pub const MAX_UNCOMPRESSED_SIZE: usize = 20 * 1024 * 1024;

/// Block compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionKind {
    /// No compression (identity).
    None = 0,

    /// Snappy compression (fast, moderate ratio).
    #[default]
    Snappy = 1,

    /// LZ4 block compression (very fast, lower ratio).
    Lz4 = 2,
}

impl CompressionKind {
    /// Codec id as stored in the file trailer.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Registered codec name.
    pub fn name(self) -> &'static str {
        match self {
            CompressionKind::None => "none",
            CompressionKind::Snappy => "snappy",
            CompressionKind::Lz4 => "lz4",
        }
    }

    /// Convert from the trailer codec id.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionKind::None),
            1 => Some(CompressionKind::Snappy),
            2 => Some(CompressionKind::Lz4),
            _ => None,
        }
    }

    /// Look up a codec by its registered name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(CompressionKind::None),
            "snappy" => Ok(CompressionKind::Snappy),
            "lz4" => Ok(CompressionKind::Lz4),
            other => Err(Error::invalid_argument(format!(
                "unknown compression codec: {}",
                other
            ))),
        }
    }

    /// Compress `input` as one unit.
    pub fn compress(self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionKind::None => Ok(input.to_vec()),
            CompressionKind::Snappy => snap::raw::Encoder::new()
                .compress_vec(input)
                .map_err(|e| Error::compression(format!("snappy compress: {}", e))),
            CompressionKind::Lz4 => lz4::block::compress(input, None, false)
                .map_err(|e| Error::compression(format!("lz4 compress: {}", e))),
        }
    }

    /// Uncompress `input`, tolerating an unknown output size.
    pub fn uncompress(self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionKind::None => Ok(input.to_vec()),
            CompressionKind::Snappy => snap::raw::Decoder::new()
                .decompress_vec(input)
                .map_err(|e| Error::compression(format!("snappy uncompress: {}", e))),
            CompressionKind::Lz4 => lz4_uncompress(input),
        }
    }
}

/// LZ4 block decompression with an unknown output size.
///
/// Starts from a small guess and doubles the output buffer on failure,
/// up to [`MAX_UNCOMPRESSED_SIZE`].
fn lz4_uncompress(input: &[u8]) -> Result<Vec<u8>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let mut capacity = (input.len().max(64) * 4).min(MAX_UNCOMPRESSED_SIZE);
    loop {
        match lz4::block::decompress(input, Some(capacity as i32)) {
            Ok(out) => return Ok(out),
            Err(_) if capacity < MAX_UNCOMPRESSED_SIZE => {
                capacity = (capacity * 2).min(MAX_UNCOMPRESSED_SIZE);
            }
            Err(_) => {
                return Err(Error::CapacityExceeded {
                    limit: MAX_UNCOMPRESSED_SIZE,
                })
            }
        }
    }
}
