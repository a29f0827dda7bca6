//! Data index implementation.
//!
//! The data index is the sparse per-block directory: one
//! (offset, compressed size, first key) triple per data block, in file
//! order, enabling binary search from a key to its candidate block.

use crate::codec::{
    get_fixed32, get_fixed64, get_length_prefixed_slice, put_fixed32, put_fixed64,
    put_length_prefixed_slice,
};
use crate::error::{Error, Result};
use crate::sstable::DATA_INDEX_MAGIC;
use bytes::{Bytes, BytesMut};

/// Location and first key of one data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Absolute byte offset of the block in the file.
    pub offset: u64,
    /// On-disk (compressed) size of the block.
    pub compressed_size: u32,
    /// First key stored in the block.
    pub first_key: Vec<u8>,
}

/// The sparse block directory of one table file.
///
/// First keys are non-decreasing across blocks; the writer's sort/merge
/// discipline guarantees this, and `find_minimal_block` relies on it.
#[derive(Debug, Clone, Default)]
pub struct DataIndex {
    blocks: Vec<BlockInfo>,
    next_offset: u64,
    total_uncompressed: u64,
}

impl DataIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one block and advance the running file offset.
    pub fn add_block_info(&mut self, compressed_size: u32, uncompressed_size: u32, first_key: &[u8]) {
        self.blocks.push(BlockInfo {
            offset: self.next_offset,
            compressed_size,
            first_key: first_key.to_vec(),
        });
        self.next_offset += compressed_size as u64;
        self.total_uncompressed += uncompressed_size as u64;
    }

    /// The blocks in file order.
    pub fn blocks(&self) -> &[BlockInfo] {
        &self.blocks
    }

    /// Number of indexed blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the index holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Absolute offset one past the last indexed block.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Sum of uncompressed block payload sizes.
    pub fn total_uncompressed(&self) -> u64 {
        self.total_uncompressed
    }

    /// Find the block that may contain `key`.
    ///
    /// Lower-bound search over first keys, backed up one block: the result
    /// is the last block whose first key is `< key`, clamped at block 0.
    /// When a first key equals `key` the earlier block wins, since a run of
    /// duplicates may begin there. Callers must still confirm the block (or
    /// a later one) actually contains the key.
    pub fn find_minimal_block(&self, key: &[u8]) -> Option<usize> {
        if self.blocks.is_empty() {
            return None;
        }
        let lower = self
            .blocks
            .partition_point(|info| info.first_key.as_slice() < key);
        Some(lower.saturating_sub(1))
    }

    /// Serialize the index.
    ///
    /// Format: magic, block count, then per block
    /// `[offset: u64][compressed_size: u32][varint key_len][first_key]`.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_fixed32(&mut buf, DATA_INDEX_MAGIC);
        put_fixed32(&mut buf, self.blocks.len() as u32);

        for info in &self.blocks {
            put_fixed64(&mut buf, info.offset);
            put_fixed32(&mut buf, info.compressed_size);
            put_length_prefixed_slice(&mut buf, &info.first_key);
        }

        buf.freeze()
    }

    /// Parse an index from file bytes.
    pub fn decode_from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::corruption("data index too small"));
        }
        if get_fixed32(data) != DATA_INDEX_MAGIC {
            return Err(Error::corruption("bad data index magic"));
        }

        let count = get_fixed32(&data[4..]) as usize;
        let mut pos = 8;
        let mut index = DataIndex::new();

        for _ in 0..count {
            if data.len() < pos + 12 {
                return Err(Error::corruption("data index entry truncated"));
            }
            let offset = get_fixed64(&data[pos..]);
            let compressed_size = get_fixed32(&data[pos + 8..]);
            pos += 12;

            let (first_key, consumed) = get_length_prefixed_slice(&data[pos..])?;
            let first_key = first_key.to_vec();
            pos += consumed;

            index.blocks.push(BlockInfo {
                offset,
                compressed_size,
                first_key,
            });
        }

        if let Some(last) = index.blocks.last() {
            index.next_offset = last.offset + last.compressed_size as u64;
        }

        Ok(index)
    }
}
