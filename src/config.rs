//! Configuration options for table writers and readers.

use crate::compress::CompressionKind;
use crate::error::Result;

/// How a table file is opened for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderMode {
    /// Lazy reads through a bounded LRU block cache.
    #[default]
    OnDisk,

    /// Eager full load into a sorted in-memory index.
    InMemory,
}

/// Configuration options shared by writers and readers.
#[derive(Debug, Clone)]
pub struct Options {
    /// Uncompressed size threshold at which a data block is rolled.
    /// Default: 4KB
    pub block_size: usize,

    /// On-disk reader block cache capacity, in blocks.
    /// Set to 0 to disable caching.
    /// Default: 1024
    pub block_cache_capacity: usize,

    /// Compression codec for data blocks.
    /// Default: CompressionKind::Snappy
    pub compression: CompressionKind,

    /// Accumulated entry bytes at which a composited writer spills a
    /// sorted batch to a temporary file.
    /// Default: 64MB
    pub batch_write_size: usize,

    /// Reader variant to open table files with.
    /// Default: ReaderMode::OnDisk
    pub reader_mode: ReaderMode,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            block_size: 4 * 1024,
            block_cache_capacity: 1024,
            compression: CompressionKind::default(),
            batch_write_size: 64 * 1024 * 1024,
            reader_mode: ReaderMode::default(),
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data block size threshold.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the block cache capacity in blocks.
    pub fn block_cache_capacity(mut self, capacity: usize) -> Self {
        self.block_cache_capacity = capacity;
        self
    }

    /// Sets the compression codec.
    pub fn compression(mut self, compression: CompressionKind) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the compression codec by registered name.
    pub fn compression_by_name(mut self, name: &str) -> Result<Self> {
        self.compression = CompressionKind::from_name(name)?;
        Ok(self)
    }

    /// Sets the composited writer spill threshold.
    pub fn batch_write_size(mut self, size: usize) -> Self {
        self.batch_write_size = size;
        self
    }

    /// Sets the reader variant.
    pub fn reader_mode(mut self, mode: ReaderMode) -> Self {
        self.reader_mode = mode;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(crate::Error::invalid_argument("block_size must be > 0"));
        }
        if self.batch_write_size == 0 {
            return Err(crate::Error::invalid_argument(
                "batch_write_size must be > 0",
            ));
        }
        Ok(())
    }
}
