//! Table file writers.
//!
//! All writers target a temporary sibling path and publish by atomic
//! rename only after a successful flush; a failed or abandoned writer
//! removes its temp file. A writer is single-use: `flush` consumes it.

use crate::config::Options;
use crate::error::{Error, Result};
use crate::sstable::block::DataBlock;
use crate::sstable::file_info::FileInfo;
use crate::sstable::index::DataIndex;
use crate::sstable::trailer::FileTrailer;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Build a sibling path by appending `suffix` to `path`'s file name.
pub(crate) fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Streaming writer for entries already in final sorted order.
///
/// Entries are appended straight into data blocks, rolling to a new block
/// whenever the current block's uncompressed size reaches
/// `Options::block_size`. Used directly as the output stage of an external
/// merge, and indirectly by [`SingleWriter`] after its in-memory sort.
pub struct UnsortedWriter {
    final_path: PathBuf,
    temp_path: PathBuf,
    file: BufWriter<File>,
    block: DataBlock,
    index: DataIndex,
    file_info: FileInfo,
    options: Options,
    last_key: Vec<u8>,
    item_num: u64,
    total_key_bytes: u64,
    total_value_bytes: u64,
    finished: bool,
}

impl UnsortedWriter {
    /// Create a writer targeting `path`. The file appears at `path` only
    /// after a successful `flush`.
    pub fn new<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        options.validate()?;
        let final_path = path.as_ref().to_path_buf();
        let temp_path = sibling_path(&final_path, ".tmp");
        let file = BufWriter::new(File::create(&temp_path)?);

        Ok(Self {
            final_path,
            temp_path,
            file,
            block: DataBlock::new(options.compression),
            index: DataIndex::new(),
            file_info: FileInfo::new(),
            options,
            last_key: Vec::new(),
            item_num: 0,
            total_key_bytes: 0,
            total_value_bytes: 0,
            finished: false,
        })
    }

    /// Append one entry. Keys must arrive in non-decreasing order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() && value.is_empty() {
            return Ok(());
        }
        if !self.last_key.is_empty() && key < self.last_key.as_slice() {
            return Err(Error::invalid_argument(
                "keys must be added in sorted order",
            ));
        }

        self.block.add_item(key, value);
        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.item_num += 1;
        self.total_key_bytes += key.len() as u64;
        self.total_value_bytes += value.len() as u64;

        if self.block.uncompressed_size() >= self.options.block_size {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Append one entry, aborting the process on failure.
    ///
    /// A caller convenience for code that treats a write failure as fatal;
    /// the `Result`-returning [`add`](Self::add) is the primary path.
    pub fn add_or_die(&mut self, key: &[u8], value: &[u8]) {
        if let Err(e) = self.add(key, value) {
            panic!("add_or_die failed: {}", e);
        }
    }

    /// Attach a metadata entry to be written into the file info block.
    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.file_info.add_metadata(key, value);
    }

    /// Number of entries added so far.
    pub fn item_num(&self) -> u64 {
        self.item_num
    }

    /// Write the current data block and index it.
    fn flush_block(&mut self) -> Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }

        let uncompressed = self.block.uncompressed_size() as u32;
        let encoded = self.block.encode_to_bytes()?;
        let first_key = self.block.entries()[0].key.clone();

        self.file.write_all(&encoded)?;
        self.index
            .add_block_info(encoded.len() as u32, uncompressed, &first_key);
        self.block.clear_items();
        Ok(())
    }

    /// Finish the file: remaining block, file info, data index, trailer,
    /// then publish by rename. The temp file is removed on any failure.
    pub fn flush(mut self) -> Result<()> {
        let result = self.finish();
        if let Err(ref e) = result {
            log::warn!(
                "abandoning partially written table {}: {}",
                self.temp_path.display(),
                e
            );
        }
        result
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_block()?;

        self.file_info.set_stats(
            self.item_num,
            self.total_key_bytes,
            self.total_value_bytes,
            &self.last_key,
        );

        let file_info_offset = self.index.next_offset();
        let info_bytes = self.file_info.encode_to_bytes();
        self.file.write_all(&info_bytes)?;

        let data_index_offset = file_info_offset + info_bytes.len() as u64;
        let index_bytes = self.index.encode_to_bytes();
        self.file.write_all(&index_bytes)?;

        let meta_index_offset = data_index_offset + index_bytes.len() as u64;
        let trailer = FileTrailer {
            file_info_offset,
            data_index_offset,
            meta_index_offset,
            total_uncompressed_bytes: self.index.total_uncompressed(),
            data_index_count: self.index.len() as u32,
            meta_index_count: 0,
            entry_count: self.item_num as u32,
            compress_type: self.options.compression.id() as u32,
            version: crate::sstable::FORMAT_VERSION,
        };
        self.file.write_all(&trailer.encode_to_bytes())?;

        self.file.flush()?;
        self.file.get_ref().sync_all()?;

        fs::rename(&self.temp_path, &self.final_path)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for UnsortedWriter {
    fn drop(&mut self) {
        if !self.finished {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// Buffering writer that sorts at flush time.
///
/// Entries are held in memory and stably sorted by key, value as the
/// secondary key, then streamed through the unsorted path. Suitable for
/// datasets that fit in memory; see `CompositedWriter` for larger inputs.
pub struct SingleWriter {
    path: PathBuf,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    metadata: BTreeMap<String, String>,
    options: Options,
    entry_bytes: u64,
}

impl SingleWriter {
    /// Create a writer targeting `path`.
    pub fn new<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            entries: Vec::new(),
            metadata: BTreeMap::new(),
            options,
            entry_bytes: 0,
        })
    }

    /// Buffer one entry, in any order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() && value.is_empty() {
            return Ok(());
        }
        self.entry_bytes += (key.len() + value.len()) as u64;
        self.entries.push((key.to_vec(), value.to_vec()));
        Ok(())
    }

    /// Buffer one entry, aborting the process on failure.
    pub fn add_or_die(&mut self, key: &[u8], value: &[u8]) {
        if let Err(e) = self.add(key, value) {
            panic!("add_or_die failed: {}", e);
        }
    }

    /// Attach a metadata entry.
    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    /// Number of entries buffered so far.
    pub fn item_num(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Total key + value bytes buffered so far.
    pub fn entry_bytes(&self) -> u64 {
        self.entry_bytes
    }

    /// Sort the buffered entries and write the file.
    pub fn flush(mut self) -> Result<()> {
        self.entries
            .sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut inner = UnsortedWriter::new(&self.path, self.options.clone())?;
        for (key, value) in &self.metadata {
            inner.add_metadata(key, value);
        }
        for (key, value) in &self.entries {
            inner.add(key, value)?;
        }
        inner.flush()
    }
}
