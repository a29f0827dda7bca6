//! File trailer implementation.
//!
//! The trailer is a fixed-size record at the very end of a table file. It
//! is written last and read first (by seeking back `TRAILER_SIZE` from end
//! of file), and locates the file info and data index sections.

use crate::codec::{get_fixed32, get_fixed64, put_fixed32, put_fixed64};
use crate::error::{Error, Result};
use crate::sstable::{FORMAT_VERSION, TRAILER_MAGIC, TRAILER_SIZE};
use bytes::{BufMut, Bytes, BytesMut};

/// Fixed-size footer locating the structural sections of a table file.
///
/// Format:
/// ```text
/// [magic: 8 bytes]
/// [file_info_offset: u64]
/// [data_index_offset: u64]
/// [meta_index_offset: u64]
/// [total_uncompressed_bytes: u64]
/// [data_index_count: u32]
/// [meta_index_count: u32]
/// [entry_count: u32]
/// [compress_type: u32]
/// [version: u32]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTrailer {
    /// Absolute offset of the file info section.
    pub file_info_offset: u64,
    /// Absolute offset of the data index section.
    pub data_index_offset: u64,
    /// Absolute offset one past the data index (reserved meta index slot).
    pub meta_index_offset: u64,
    /// Sum of uncompressed data block payload sizes.
    pub total_uncompressed_bytes: u64,
    /// Number of data blocks in the data index.
    pub data_index_count: u32,
    /// Number of meta index entries (always 0 in this version).
    pub meta_index_count: u32,
    /// Total entry count of the table.
    pub entry_count: u32,
    /// Compression codec id for data blocks.
    pub compress_type: u32,
    /// Table format version.
    pub version: u32,
}

impl Default for FileTrailer {
    fn default() -> Self {
        Self {
            file_info_offset: 0,
            data_index_offset: 0,
            meta_index_offset: 0,
            total_uncompressed_bytes: 0,
            data_index_count: 0,
            meta_index_count: 0,
            entry_count: 0,
            compress_type: 0,
            version: FORMAT_VERSION,
        }
    }
}

impl FileTrailer {
    /// Serialize the trailer to its fixed-size form.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(TRAILER_SIZE);
        buf.put_slice(TRAILER_MAGIC);
        put_fixed64(&mut buf, self.file_info_offset);
        put_fixed64(&mut buf, self.data_index_offset);
        put_fixed64(&mut buf, self.meta_index_offset);
        put_fixed64(&mut buf, self.total_uncompressed_bytes);
        put_fixed32(&mut buf, self.data_index_count);
        put_fixed32(&mut buf, self.meta_index_count);
        put_fixed32(&mut buf, self.entry_count);
        put_fixed32(&mut buf, self.compress_type);
        put_fixed32(&mut buf, self.version);

        debug_assert_eq!(buf.len(), TRAILER_SIZE);
        buf.freeze()
    }

    /// Parse a trailer.
    ///
    /// Fails unless `data` is exactly `TRAILER_SIZE` bytes and the magic
    /// matches. This is the first structural check a corrupted or truncated
    /// file trips.
    pub fn decode_from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != TRAILER_SIZE {
            return Err(Error::corruption(format!(
                "trailer size mismatch: expected {}, got {}",
                TRAILER_SIZE,
                data.len()
            )));
        }
        if &data[..8] != TRAILER_MAGIC {
            return Err(Error::corruption("bad trailer magic"));
        }

        Ok(Self {
            file_info_offset: get_fixed64(&data[8..]),
            data_index_offset: get_fixed64(&data[16..]),
            meta_index_offset: get_fixed64(&data[24..]),
            total_uncompressed_bytes: get_fixed64(&data[32..]),
            data_index_count: get_fixed32(&data[40..]),
            meta_index_count: get_fixed32(&data[44..]),
            entry_count: get_fixed32(&data[48..]),
            compress_type: get_fixed32(&data[52..]),
            version: get_fixed32(&data[56..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let trailer = FileTrailer {
            file_info_offset: 1234,
            data_index_offset: 2345,
            meta_index_offset: 3456,
            total_uncompressed_bytes: 99999,
            data_index_count: 12,
            meta_index_count: 0,
            entry_count: 1000,
            compress_type: 1,
            version: FORMAT_VERSION,
        };

        let encoded = trailer.encode_to_bytes();
        assert_eq!(encoded.len(), TRAILER_SIZE);

        let decoded = FileTrailer::decode_from_bytes(&encoded).unwrap();
        assert_eq!(decoded, trailer);
    }

    #[test]
    fn test_wrong_size_fails() {
        let trailer = FileTrailer::default();
        let encoded = trailer.encode_to_bytes();

        assert!(FileTrailer::decode_from_bytes(&encoded[..TRAILER_SIZE - 1]).is_err());

        let mut long = encoded.to_vec();
        long.push(0);
        assert!(FileTrailer::decode_from_bytes(&long).is_err());
    }

    #[test]
    fn test_bad_magic_fails() {
        let mut encoded = FileTrailer::default().encode_to_bytes().to_vec();
        encoded[0] ^= 0xff;

        let result = FileTrailer::decode_from_bytes(&encoded);
        assert!(matches!(result, Err(Error::Corruption(_))));
    }
}
