//! blocktable: a sorted, block-structured, immutable table file format.
//!
//! A table file stores sorted key/value entries in compressed data blocks,
//! followed by caller metadata, a sparse block index, and a fixed-size
//! trailer that anchors everything:
//!
//! ```text
//! [DataBlock]+ [FileInfo] [DataIndex] [FileTrailer]
//! ```
//!
//! Writing goes through one of four writers depending on how much the
//! caller knows about the input: [`UnsortedWriter`] streams pre-sorted
//! entries, [`SingleWriter`] buffers and sorts in memory,
//! [`CompositedWriter`] spills sorted batches and merges them, and
//! [`ShardingWriter`] fans entries out across N shard files. Reading goes
//! through [`SSTableReader`] for a single file or [`MergedReader`] for a
//! group of related files.
//!
//! # Example
//!
//! ```no_run
//! use blocktable::{Options, SSTableReader, SingleWriter};
//!
//! # fn main() -> blocktable::Result<()> {
//! let mut writer = SingleWriter::new("data.sst", Options::default())?;
//! writer.add(b"banana", b"yellow")?;
//! writer.add(b"apple", b"red")?;
//! writer.flush()?;
//!
//! let reader = SSTableReader::open("data.sst", Options::default())?;
//! assert_eq!(reader.lookup(b"apple")?, Some(b"red".to_vec()));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod compress;
pub mod config;
pub mod error;
pub mod sstable;

pub use cache::{BlockCache, CacheStats, SharedBlockCache};
pub use compress::CompressionKind;
pub use config::{Options, ReaderMode};
pub use error::{Error, Result};
pub use sstable::{
    CompositedWriter, DataBlock, DataIndex, FileInfo, FileTrailer, MergedIterator, MergedReader,
    SSTableIter, SSTableReader, ShardingKind, ShardingWriter, SingleWriter, UnsortedWriter,
};
