//! File info block implementation.
//!
//! File info is the small whole-file metadata section: arbitrary
//! string-to-string metadata supplied by the writer's caller, plus derived
//! statistics (average key/value length, comparator name, last key).

use crate::codec::{get_fixed32, get_length_prefixed_slice, put_fixed32, put_length_prefixed_slice};
use crate::error::{Error, Result};
use crate::sstable::{AVG_KEY_LEN_KEY, AVG_VALUE_LEN_KEY, COMPARATOR_KEY, LAST_KEY_KEY};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;

/// Marker byte for a reserved (statistics) entry.
const MARKER_RESERVED: u8 = 1;

/// Marker byte for a caller-supplied metadata entry.
const MARKER_METADATA: u8 = 0;

/// Comparator name written by this engine. Keys are ordered by raw byte
/// comparison.
pub const BYTEWISE_COMPARATOR: &str = "bytewise";

/// Whole-file metadata: caller key/value pairs plus derived statistics.
///
/// Wire form: fixed32 entry count, then per entry
/// `[varint name_len][name][marker: u8][varint value_len][value]`.
/// The four reserved names decode into the statistics fields rather than
/// the generic map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    metadata: BTreeMap<String, String>,
    /// Average key length across all entries, in bytes.
    pub avg_key_len: u32,
    /// Average value length across all entries, in bytes.
    pub avg_value_len: u32,
    /// Comparator name; this engine always writes [`BYTEWISE_COMPARATOR`].
    pub comparator: String,
    /// Last (largest) key in the table.
    pub last_key: Vec<u8>,
    /// Total entry count. Carried by the trailer on disk, not re-encoded
    /// here; readers fill it in after decoding the trailer.
    pub item_num: u64,
}

impl FileInfo {
    /// Create an empty file info with the engine's comparator.
    pub fn new() -> Self {
        Self {
            comparator: BYTEWISE_COMPARATOR.to_string(),
            ..Self::default()
        }
    }

    /// Set a caller metadata entry. Keys are unique; a repeated key
    /// overwrites the earlier value.
    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    /// Look up a caller metadata entry.
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// All caller metadata entries.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Fill in the derived statistics from writer totals.
    pub fn set_stats(&mut self, item_num: u64, total_key_bytes: u64, total_value_bytes: u64, last_key: &[u8]) {
        self.item_num = item_num;
        if item_num > 0 {
            self.avg_key_len = (total_key_bytes / item_num) as u32;
            self.avg_value_len = (total_value_bytes / item_num) as u32;
        }
        self.last_key = last_key.to_vec();
    }

    /// Serialize the file info block.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        let count = self.metadata.len() + 4;
        put_fixed32(&mut buf, count as u32);

        let mut stat = BytesMut::new();
        put_fixed32(&mut stat, self.avg_key_len);
        Self::put_entry(&mut buf, AVG_KEY_LEN_KEY, MARKER_RESERVED, &stat);

        stat.clear();
        put_fixed32(&mut stat, self.avg_value_len);
        Self::put_entry(&mut buf, AVG_VALUE_LEN_KEY, MARKER_RESERVED, &stat);

        Self::put_entry(&mut buf, COMPARATOR_KEY, MARKER_RESERVED, self.comparator.as_bytes());
        Self::put_entry(&mut buf, LAST_KEY_KEY, MARKER_RESERVED, &self.last_key);

        for (name, value) in &self.metadata {
            Self::put_entry(&mut buf, name, MARKER_METADATA, value.as_bytes());
        }

        buf.freeze()
    }

    fn put_entry(buf: &mut BytesMut, name: &str, marker: u8, value: &[u8]) {
        put_length_prefixed_slice(buf, name.as_bytes());
        buf.put_u8(marker);
        put_length_prefixed_slice(buf, value);
    }

    /// Parse a file info block from file bytes.
    pub fn decode_from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::corruption("file info too small"));
        }
        let count = get_fixed32(data) as usize;
        let mut rest = &data[4..];
        let mut info = FileInfo::new();

        for _ in 0..count {
            let (name, consumed) = get_length_prefixed_slice(rest)?;
            let name = std::str::from_utf8(name)
                .map_err(|_| Error::corruption("file info name not utf-8"))?
                .to_string();
            rest = &rest[consumed..];

            if rest.is_empty() {
                return Err(Error::corruption("file info entry truncated"));
            }
            let _marker = rest.get_u8();

            let (value, consumed) = get_length_prefixed_slice(rest)?;
            let value = value.to_vec();
            rest = &rest[consumed..];

            match name.as_str() {
                AVG_KEY_LEN_KEY => {
                    if value.len() != 4 {
                        return Err(Error::corruption("bad avg key len stat"));
                    }
                    info.avg_key_len = get_fixed32(&value);
                }
                AVG_VALUE_LEN_KEY => {
                    if value.len() != 4 {
                        return Err(Error::corruption("bad avg value len stat"));
                    }
                    info.avg_value_len = get_fixed32(&value);
                }
                COMPARATOR_KEY => {
                    info.comparator = String::from_utf8(value)
                        .map_err(|_| Error::corruption("comparator not utf-8"))?;
                }
                LAST_KEY_KEY => {
                    info.last_key = value;
                }
                _ => {
                    let value = String::from_utf8(value)
                        .map_err(|_| Error::corruption("metadata value not utf-8"))?;
                    info.metadata.insert(name, value);
                }
            }
        }

        Ok(info)
    }
}
