//! Table file readers.
//!
//! Two variants share one iterator contract:
//!
//! - [`OnDiskReader`] keeps only the trailer, file info and data index in
//!   memory and fetches data blocks lazily through a bounded LRU cache.
//!   Suited to point and range lookups.
//! - [`InMemoryReader`] loads every block once at open and serves all
//!   reads from a sorted in-memory index. Suited to repeated full scans
//!   at the cost of O(file size) memory.
//!
//! Iterators are forward-only and restartable only via a fresh `seek`.

use crate::cache::SharedBlockCache;
use crate::compress::CompressionKind;
use crate::config::Options;
use crate::error::{Error, Result};
use crate::sstable::block::DataBlock;
use crate::sstable::file_info::FileInfo;
use crate::sstable::index::DataIndex;
use crate::sstable::trailer::FileTrailer;
use crate::sstable::TRAILER_SIZE;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Read and decode the trailer from the end of an open file.
fn read_trailer(file: &mut File) -> Result<FileTrailer> {
    let file_size = file.metadata()?.len();
    if file_size < TRAILER_SIZE as u64 {
        return Err(Error::corruption("file too small to be a table file"));
    }

    file.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
    let mut buf = [0u8; TRAILER_SIZE];
    file.read_exact(&mut buf)?;
    FileTrailer::decode_from_bytes(&buf)
}

/// Read an exact byte range from an open file.
fn read_range(file: &mut File, offset: u64, len: usize) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read and decode the file info section located by `trailer`.
fn read_file_info(file: &mut File, trailer: &FileTrailer) -> Result<FileInfo> {
    let len = (trailer.data_index_offset - trailer.file_info_offset) as usize;
    let buf = read_range(file, trailer.file_info_offset, len)?;
    let mut info = FileInfo::decode_from_bytes(&buf)?;
    info.item_num = trailer.entry_count as u64;
    Ok(info)
}

/// Read and decode the data index section located by `trailer`.
fn read_data_index(file: &mut File, trailer: &FileTrailer) -> Result<DataIndex> {
    let len = (trailer.meta_index_offset - trailer.data_index_offset) as usize;
    let buf = read_range(file, trailer.data_index_offset, len)?;
    let index = DataIndex::decode_from_bytes(&buf)?;
    if index.len() != trailer.data_index_count as usize {
        return Err(Error::corruption("data index count mismatch"));
    }
    Ok(index)
}

/// Lazy reader with an LRU block cache.
#[derive(Debug)]
pub struct OnDiskReader {
    file: Mutex<File>,
    index: DataIndex,
    file_info: FileInfo,
    trailer: FileTrailer,
    compression: CompressionKind,
    cache: SharedBlockCache,
}

impl OnDiskReader {
    /// Open a table file, reading only the trailer, file info and index.
    pub fn open<P: AsRef<Path>>(path: P, options: &Options) -> Result<Self> {
        let mut file = File::open(path)?;
        let trailer = read_trailer(&mut file)?;

        let compression = CompressionKind::from_u8(trailer.compress_type as u8)
            .ok_or_else(|| Error::corruption("unknown compression codec id"))?;
        let file_info = read_file_info(&mut file, &trailer)?;
        let index = read_data_index(&mut file, &trailer)?;

        Ok(Self {
            file: Mutex::new(file),
            index,
            file_info,
            trailer,
            compression,
            cache: SharedBlockCache::new(options.block_cache_capacity),
        })
    }

    /// Load one data block, hitting the cache first.
    ///
    /// On a miss the exact compressed range is read under the file mutex,
    /// decoded, and inserted into the cache. Multiple threads may call this
    /// concurrently on one reader; fetches serialize at block granularity.
    pub fn load_data_block(&self, block_id: usize) -> Result<Arc<DataBlock>> {
        if let Some(block) = self.cache.get(block_id as u64) {
            return Ok(block);
        }

        let blocks = self.index.blocks();
        let info = blocks
            .get(block_id)
            .ok_or_else(|| Error::invalid_argument(format!("no such block: {}", block_id)))?;
        let end = match blocks.get(block_id + 1) {
            Some(next) => next.offset,
            None => self.trailer.file_info_offset,
        };
        let len = (end - info.offset) as usize;

        let raw = {
            let mut file = self.file.lock();
            read_range(&mut file, info.offset, len)?
        };

        let block = Arc::new(DataBlock::decode_from_bytes(&raw, self.compression)?);
        self.cache.put(block_id as u64, Arc::clone(&block));
        Ok(block)
    }

    /// Point lookup: the value of the first entry whose key equals `key`.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut iter = OnDiskIter::new(self);
        iter.seek(key)?;
        if iter.valid() && iter.key() == key {
            Ok(Some(iter.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Number of data blocks in the file.
    pub fn num_blocks(&self) -> usize {
        self.index.len()
    }

    /// First (smallest) key, from the data index.
    pub fn first_key(&self) -> Option<&[u8]> {
        self.index.blocks().first().map(|b| b.first_key.as_slice())
    }

    /// Total entry count.
    pub fn entry_count(&self) -> u32 {
        self.trailer.entry_count
    }

    /// The file's metadata block.
    pub fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    /// The block cache, for statistics inspection.
    pub fn cache(&self) -> &SharedBlockCache {
        &self.cache
    }

    /// Iterator positioned before the first entry; call `seek` or use
    /// [`SSTableReader::new_iterator`] for a first-entry position.
    fn iter(&self) -> OnDiskIter<'_> {
        OnDiskIter::new(self)
    }
}

/// Forward iterator over an [`OnDiskReader`].
pub struct OnDiskIter<'a> {
    reader: &'a OnDiskReader,
    block_idx: usize,
    entry_idx: usize,
    block: Option<Arc<DataBlock>>,
    valid: bool,
}

impl<'a> OnDiskIter<'a> {
    fn new(reader: &'a OnDiskReader) -> Self {
        Self {
            reader,
            block_idx: 0,
            entry_idx: 0,
            block: None,
            valid: false,
        }
    }

    /// Position at the first entry of the table.
    pub fn seek_to_first(&mut self) -> Result<()> {
        if self.reader.index.is_empty() {
            self.valid = false;
            return Ok(());
        }
        self.block_idx = 0;
        self.entry_idx = 0;
        self.block = Some(self.reader.load_data_block(0)?);
        self.valid = true;
        Ok(())
    }

    /// Position at the first entry with key `>= key`, or become invalid.
    ///
    /// The index narrows the search to a candidate block; entries before
    /// `key` in that block (and any block whose run ends below `key`) are
    /// skipped, which also handles duplicate keys spanning blocks.
    pub fn seek(&mut self, key: &[u8]) -> Result<()> {
        let block_idx = match self.reader.index.find_minimal_block(key) {
            Some(idx) => idx,
            None => {
                self.valid = false;
                return Ok(());
            }
        };

        self.block_idx = block_idx;
        loop {
            let block = self.reader.load_data_block(self.block_idx)?;
            let pos = block
                .entries()
                .partition_point(|e| e.key.as_slice() < key);
            if pos < block.len() {
                self.entry_idx = pos;
                self.block = Some(block);
                self.valid = true;
                return Ok(());
            }
            self.block_idx += 1;
            if self.block_idx >= self.reader.index.len() {
                self.valid = false;
                self.block = None;
                return Ok(());
            }
        }
    }

    /// Advance one entry, crossing block boundaries as needed.
    pub fn next(&mut self) -> Result<()> {
        if !self.valid {
            return Ok(());
        }

        self.entry_idx += 1;
        let block_len = self.block.as_ref().map(|b| b.len()).unwrap_or(0);
        if self.entry_idx < block_len {
            return Ok(());
        }

        self.block_idx += 1;
        if self.block_idx >= self.reader.index.len() {
            self.valid = false;
            self.block = None;
            return Ok(());
        }
        self.block = Some(self.reader.load_data_block(self.block_idx)?);
        self.entry_idx = 0;
        Ok(())
    }

    /// Whether the iterator is positioned at an entry.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// The current key.
    pub fn key(&self) -> &[u8] {
        assert!(self.valid, "iterator not valid");
        &self.block.as_ref().unwrap().entries()[self.entry_idx].key
    }

    /// The current value.
    pub fn value(&self) -> &[u8] {
        assert!(self.valid, "iterator not valid");
        &self.block.as_ref().unwrap().entries()[self.entry_idx].value
    }
}

/// Eager reader serving everything from memory.
#[derive(Debug)]
pub struct InMemoryReader {
    /// Keys with their values, grouped by equal key, sorted by key;
    /// values within a group keep file (value-sorted) order.
    groups: Vec<(Vec<u8>, Vec<Vec<u8>>)>,
    file_info: FileInfo,
    trailer: FileTrailer,
}

impl InMemoryReader {
    /// Open a table file and load every data block once.
    pub fn open<P: AsRef<Path>>(path: P, _options: &Options) -> Result<Self> {
        let mut file = File::open(path)?;
        let trailer = read_trailer(&mut file)?;
        let compression = CompressionKind::from_u8(trailer.compress_type as u8)
            .ok_or_else(|| Error::corruption("unknown compression codec id"))?;
        let file_info = read_file_info(&mut file, &trailer)?;
        let index = read_data_index(&mut file, &trailer)?;

        let mut groups: Vec<(Vec<u8>, Vec<Vec<u8>>)> = Vec::new();
        let blocks = index.blocks();
        for (i, info) in blocks.iter().enumerate() {
            let end = match blocks.get(i + 1) {
                Some(next) => next.offset,
                None => trailer.file_info_offset,
            };
            let raw = read_range(&mut file, info.offset, (end - info.offset) as usize)?;
            let block = DataBlock::decode_from_bytes(&raw, compression)?;

            for entry in block.entries() {
                match groups.last_mut() {
                    Some((key, values)) if key == &entry.key => values.push(entry.value.clone()),
                    _ => groups.push((entry.key.clone(), vec![entry.value.clone()])),
                }
            }
        }

        Ok(Self {
            groups,
            file_info,
            trailer,
        })
    }

    /// Point lookup: the first value stored under `key`.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let pos = self.groups.partition_point(|(k, _)| k.as_slice() < key);
        match self.groups.get(pos) {
            Some((k, values)) if k.as_slice() == key => Ok(Some(values[0].clone())),
            _ => Ok(None),
        }
    }

    /// Total entry count.
    pub fn entry_count(&self) -> u32 {
        self.trailer.entry_count
    }

    /// First (smallest) key.
    pub fn first_key(&self) -> Option<&[u8]> {
        self.groups.first().map(|(k, _)| k.as_slice())
    }

    /// The file's metadata block.
    pub fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    fn iter(&self) -> InMemoryIter<'_> {
        InMemoryIter {
            reader: self,
            group_idx: 0,
            value_idx: 0,
            valid: false,
        }
    }
}

/// Forward iterator over an [`InMemoryReader`].
pub struct InMemoryIter<'a> {
    reader: &'a InMemoryReader,
    group_idx: usize,
    value_idx: usize,
    valid: bool,
}

impl<'a> InMemoryIter<'a> {
    /// Position at the first entry of the table.
    pub fn seek_to_first(&mut self) -> Result<()> {
        self.group_idx = 0;
        self.value_idx = 0;
        self.valid = !self.reader.groups.is_empty();
        Ok(())
    }

    /// Position at the first entry with key `>= key`, or become invalid.
    pub fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.group_idx = self
            .reader
            .groups
            .partition_point(|(k, _)| k.as_slice() < key);
        self.value_idx = 0;
        self.valid = self.group_idx < self.reader.groups.len();
        Ok(())
    }

    /// Advance one entry.
    pub fn next(&mut self) -> Result<()> {
        if !self.valid {
            return Ok(());
        }
        self.value_idx += 1;
        if self.value_idx >= self.reader.groups[self.group_idx].1.len() {
            self.group_idx += 1;
            self.value_idx = 0;
            self.valid = self.group_idx < self.reader.groups.len();
        }
        Ok(())
    }

    /// Whether the iterator is positioned at an entry.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// The current key.
    pub fn key(&self) -> &[u8] {
        assert!(self.valid, "iterator not valid");
        &self.reader.groups[self.group_idx].0
    }

    /// The current value.
    pub fn value(&self) -> &[u8] {
        assert!(self.valid, "iterator not valid");
        &self.reader.groups[self.group_idx].1[self.value_idx]
    }
}

/// A table file reader, opened in one of the two [`crate::config::ReaderMode`]s.
#[derive(Debug)]
pub enum SSTableReader {
    /// Lazy variant with a block cache.
    OnDisk(OnDiskReader),
    /// Eager fully loaded variant.
    InMemory(InMemoryReader),
}

impl SSTableReader {
    /// Open a table file with the mode carried by `options`.
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        match options.reader_mode {
            crate::config::ReaderMode::OnDisk => {
                Ok(SSTableReader::OnDisk(OnDiskReader::open(path, &options)?))
            }
            crate::config::ReaderMode::InMemory => Ok(SSTableReader::InMemory(
                InMemoryReader::open(path, &options)?,
            )),
        }
    }

    /// Point lookup: the value of the first entry whose key equals `key`.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            SSTableReader::OnDisk(r) => r.lookup(key),
            SSTableReader::InMemory(r) => r.lookup(key),
        }
    }

    /// New iterator positioned at the first entry (invalid when empty).
    pub fn new_iterator(&self) -> Result<SSTableIter<'_>> {
        let mut iter = match self {
            SSTableReader::OnDisk(r) => SSTableIter::OnDisk(r.iter()),
            SSTableReader::InMemory(r) => SSTableIter::InMemory(r.iter()),
        };
        iter.seek_to_first()?;
        Ok(iter)
    }

    /// Total entry count.
    pub fn entry_count(&self) -> u32 {
        match self {
            SSTableReader::OnDisk(r) => r.entry_count(),
            SSTableReader::InMemory(r) => r.entry_count(),
        }
    }

    /// The file's metadata block.
    pub fn file_info(&self) -> &FileInfo {
        match self {
            SSTableReader::OnDisk(r) => r.file_info(),
            SSTableReader::InMemory(r) => r.file_info(),
        }
    }

    /// Caller metadata lookup on the open file.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.file_info().get_metadata(key)
    }

    /// First (smallest) key, or `None` for an empty table.
    pub fn first_key(&self) -> Option<&[u8]> {
        match self {
            SSTableReader::OnDisk(r) => r.first_key(),
            SSTableReader::InMemory(r) => r.first_key(),
        }
    }

    /// Last (largest) key, from the file info stats.
    pub fn last_key(&self) -> &[u8] {
        &self.file_info().last_key
    }

    /// Read one metadata value without loading any data blocks.
    pub fn get_metadata<P: AsRef<Path>>(path: P, key: &str) -> Result<Option<String>> {
        let mut file = File::open(path)?;
        let trailer = read_trailer(&mut file)?;
        let info = read_file_info(&mut file, &trailer)?;
        Ok(info.get_metadata(key).map(str::to_string))
    }

    /// Read the entry count without loading any data blocks.
    pub fn get_entry_count<P: AsRef<Path>>(path: P) -> Result<u32> {
        let mut file = File::open(path)?;
        Ok(read_trailer(&mut file)?.entry_count)
    }
}

/// Iterator over either reader variant, sharing one contract.
pub enum SSTableIter<'a> {
    /// Iterator over an on-disk reader.
    OnDisk(OnDiskIter<'a>),
    /// Iterator over an in-memory reader.
    InMemory(InMemoryIter<'a>),
}

impl<'a> SSTableIter<'a> {
    /// Position at the first entry of the table.
    pub fn seek_to_first(&mut self) -> Result<()> {
        match self {
            SSTableIter::OnDisk(it) => it.seek_to_first(),
            SSTableIter::InMemory(it) => it.seek_to_first(),
        }
    }

    /// Position at the first entry with key `>= key`, or become invalid.
    pub fn seek(&mut self, key: &[u8]) -> Result<()> {
        match self {
            SSTableIter::OnDisk(it) => it.seek(key),
            SSTableIter::InMemory(it) => it.seek(key),
        }
    }

    /// Advance one entry, becoming invalid at end of table.
    pub fn next(&mut self) -> Result<()> {
        match self {
            SSTableIter::OnDisk(it) => it.next(),
            SSTableIter::InMemory(it) => it.next(),
        }
    }

    /// Whether the iterator is positioned at an entry.
    pub fn valid(&self) -> bool {
        match self {
            SSTableIter::OnDisk(it) => it.valid(),
            SSTableIter::InMemory(it) => it.valid(),
        }
    }

    /// The current key.
    pub fn key(&self) -> &[u8] {
        match self {
            SSTableIter::OnDisk(it) => it.key(),
            SSTableIter::InMemory(it) => it.key(),
        }
    }

    /// The current value.
    pub fn value(&self) -> &[u8] {
        match self {
            SSTableIter::OnDisk(it) => it.value(),
            SSTableIter::InMemory(it) => it.value(),
        }
    }
}
