//! Block caching for the on-disk reader.

pub mod lru;

pub use lru::{BlockCache, CacheStats, SharedBlockCache};
