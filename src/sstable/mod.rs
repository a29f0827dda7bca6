//! SSTable (Sorted String Table) implementation.
//!
//! An SSTable is an immutable, sorted file of key/value entries. The format
//! is built for sequential writes and random reads:
//!
//! ```text
//! [Data Block 1]
//! [Data Block 2]
//! ...
//! [Data Block N]
//! [File Info]       // stats + arbitrary key/value metadata
//! [Data Index]      // (offset, compressed size, first key) per block
//! [File Trailer]    // fixed size, locates the sections above
//! ```
//!
//! The trailer is read first by seeking back from end of file. Each data
//! block is independently compressed and carries a magic tag at the start
//! of its decoded payload; so does the data index.
//!
//! Keys are opaque byte strings ordered lexicographically; duplicate keys
//! are permitted and ordered by value.

pub mod block;
pub mod composite;
pub mod file_info;
pub mod index;
pub mod merged;
pub mod reader;
pub mod sharding;
pub mod trailer;
pub mod writer;

pub use block::{DataBlock, Entry};
pub use composite::CompositedWriter;
pub use file_info::FileInfo;
pub use index::{BlockInfo, DataIndex};
pub use merged::{MergedIterator, MergedReader};
pub use reader::{InMemoryReader, OnDiskReader, SSTableIter, SSTableReader};
pub use sharding::{ShardingKind, ShardingWriter};
pub use trailer::FileTrailer;
pub use writer::{SingleWriter, UnsortedWriter};

/// Default data block size threshold (4KB).
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Magic tag at the start of every decoded data block payload.
pub const DATA_BLOCK_MAGIC: u32 = 0x424c4b44; // "DBLK"

/// Magic tag at the start of the encoded data index.
pub const DATA_INDEX_MAGIC: u32 = 0x58444944; // "DIDX"

/// Magic tag preceding the fixed trailer fields.
pub const TRAILER_MAGIC: &[u8; 8] = b"SSTBTRLR";

/// Current table format version.
pub const FORMAT_VERSION: u32 = 1;

/// Encoded trailer size in bytes: magic + 4 fixed64 + 5 fixed32 fields.
pub const TRAILER_SIZE: usize = 8 + 4 * 8 + 5 * 4;

/// Reserved file-info name for the average key length statistic.
pub const AVG_KEY_LEN_KEY: &str = "hfile.AVG_KEY_LEN";

/// Reserved file-info name for the average value length statistic.
pub const AVG_VALUE_LEN_KEY: &str = "hfile.AVG_VALUE_LEN";

/// Reserved file-info name for the comparator.
pub const COMPARATOR_KEY: &str = "hfile.COMPARATOR";

/// Reserved file-info name for the last key in the table.
pub const LAST_KEY_KEY: &str = "hfile.LASTKEY";

/// Metadata key carrying a shard's index within its set.
pub const SHARD_ID_KEY: &str = "shard_id";

/// Metadata key carrying the total shard count of a set.
pub const SHARD_TOTAL_NUM_KEY: &str = "shard_total_num";

/// Metadata key carrying the registered sharding policy name.
pub const SHARD_POLICY_KEY: &str = "shard_policy";

/// Metadata key carrying the shared id of a shard set.
pub const SSTABLE_SET_ID_KEY: &str = "sstable_set_id";
