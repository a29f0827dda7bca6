//! Data block implementation.
//!
//! A data block is an ordered run of key/value entries serialized into one
//! buffer and compressed as a unit.

use crate::codec::{get_fixed32, get_varint32, put_fixed32, put_varint32};
use crate::compress::CompressionKind;
use crate::error::{Error, Result};
use crate::sstable::DATA_BLOCK_MAGIC;
use bytes::{BufMut, Bytes, BytesMut};

/// One key/value entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Opaque key bytes.
    pub key: Vec<u8>,
    /// Opaque value bytes.
    pub value: Vec<u8>,
}

impl Entry {
    /// Create a new entry.
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }
}

/// DataBlock owns a serialized entry buffer plus its parsed entry view.
///
/// Decoded payload format:
/// ```text
/// [magic: u32]
/// [key_len: varint32][value_len: u32][key bytes][value bytes]   // repeated
/// ```
///
/// A block is either built incrementally by a writer (`add_item` /
/// `clear_items` between flushes) or built once from file bytes
/// (`decode_from_bytes`) and immutable afterwards.
#[derive(Debug, Clone)]
pub struct DataBlock {
    buffer: BytesMut,
    entries: Vec<Entry>,
    compression: CompressionKind,
    compressed_size: Option<u32>,
}

impl DataBlock {
    /// Create an empty block using the given compression codec.
    pub fn new(compression: CompressionKind) -> Self {
        let mut buffer = BytesMut::new();
        put_fixed32(&mut buffer, DATA_BLOCK_MAGIC);
        Self {
            buffer,
            entries: Vec::new(),
            compression,
            compressed_size: None,
        }
    }

    /// Append one entry.
    ///
    /// Adding an entry with both key and value empty is a no-op.
    pub fn add_item(&mut self, key: &[u8], value: &[u8]) {
        if key.is_empty() && value.is_empty() {
            return;
        }

        put_varint32(&mut self.buffer, key.len() as u32);
        put_fixed32(&mut self.buffer, value.len() as u32);
        self.buffer.put_slice(key);
        self.buffer.put_slice(value);

        self.entries.push(Entry::new(key.to_vec(), value.to_vec()));
        self.compressed_size = None;
    }

    /// The parsed entries of this block.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries in this block.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the block holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size of the serialized, uncompressed payload (magic included).
    pub fn uncompressed_size(&self) -> usize {
        self.buffer.len()
    }

    /// Size of the compressed payload. Valid only after `encode_to_bytes`.
    pub fn compressed_size(&self) -> Option<u32> {
        self.compressed_size
    }

    /// Serialize and compress the block as one unit.
    pub fn encode_to_bytes(&mut self) -> Result<Bytes> {
        let compressed = self.compression.compress(&self.buffer)?;
        self.compressed_size = Some(compressed.len() as u32);
        Ok(Bytes::from(compressed))
    }

    /// Build a block from compressed file bytes.
    ///
    /// Uncompresses, verifies the magic tag, then parses entries. Any
    /// structural problem is a corruption error, never a panic.
    pub fn decode_from_bytes(data: &[u8], compression: CompressionKind) -> Result<Self> {
        let payload = compression.uncompress(data)?;

        if payload.len() < 4 {
            return Err(Error::corruption("data block too small"));
        }
        if get_fixed32(&payload) != DATA_BLOCK_MAGIC {
            return Err(Error::corruption("bad data block magic"));
        }

        let mut entries = Vec::new();
        let mut pos = 4;
        while pos < payload.len() {
            let (key_len, consumed) = get_varint32(&payload[pos..])?;
            let key_len = key_len as usize;
            pos += consumed;

            if payload.len() < pos + 4 {
                return Err(Error::corruption("data block entry truncated"));
            }
            let value_len = get_fixed32(&payload[pos..]) as usize;
            pos += 4;

            if payload.len() < pos + key_len + value_len {
                return Err(Error::corruption("data block entry truncated"));
            }
            let key = payload[pos..pos + key_len].to_vec();
            pos += key_len;
            let value = payload[pos..pos + value_len].to_vec();
            pos += value_len;

            entries.push(Entry::new(key, value));
        }

        let mut buffer = BytesMut::with_capacity(payload.len());
        buffer.put_slice(&payload);

        Ok(Self {
            buffer,
            entries,
            compression,
            compressed_size: Some(data.len() as u32),
        })
    }

    /// Reset the block for reuse between flushes, keeping allocations.
    pub fn clear_items(&mut self) {
        self.buffer.clear();
        put_fixed32(&mut self.buffer, DATA_BLOCK_MAGIC);
        self.entries.clear();
        self.compressed_size = None;
    }
}
