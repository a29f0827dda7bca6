//! LRU (Least Recently Used) cache for decoded data blocks.
//!
//! The cache is bounded by entry count and evicts in strict LRU order.
//! Values are reference-counted blocks, so the cache and any in-flight
//! iterator share one decoded copy; the last reference drop frees it.

use crate::sstable::block::DataBlock;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Statistics for cache performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Total number of cache lookups.
    pub lookups: u64,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of insertions.
    pub insertions: u64,
    /// Number of evictions.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}

/// Bounded LRU cache mapping block id to a shared decoded block.
///
/// The base form is not synchronized; wrap it in [`SharedBlockCache`] when
/// multiple threads load blocks through one reader.
#[derive(Debug)]
pub struct BlockCache {
    /// Maximum number of cached blocks.
    capacity: usize,
    /// Cached blocks by id.
    blocks: HashMap<u64, Arc<DataBlock>>,
    /// LRU queue (most recently used at the back).
    lru_queue: VecDeque<u64>,
    /// Cache statistics.
    stats: CacheStats,
}

impl BlockCache {
    /// Create a new cache holding at most `capacity` blocks.
    /// A capacity of 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            blocks: HashMap::new(),
            lru_queue: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    /// Get a block by id, marking it most recently used on a hit.
    pub fn get(&mut self, block_id: u64) -> Option<Arc<DataBlock>> {
        self.stats.lookups += 1;

        if self.capacity == 0 {
            self.stats.misses += 1;
            return None;
        }

        match self.blocks.get(&block_id) {
            Some(block) => {
                let block = Arc::clone(block);
                self.touch(block_id);
                self.stats.hits += 1;
                Some(block)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert a block, evicting the least recently used entry if full.
    pub fn put(&mut self, block_id: u64, block: Arc<DataBlock>) {
        if self.capacity == 0 {
            return;
        }

        if self.blocks.insert(block_id, block).is_some() {
            // Re-insert of a known id just refreshes its position.
            self.touch(block_id);
        } else {
            self.lru_queue.push_back(block_id);
            while self.blocks.len() > self.capacity {
                self.evict_one();
            }
        }
        self.stats.insertions += 1;
    }

    /// Move `block_id` to the most recently used position.
    fn touch(&mut self, block_id: u64) {
        if let Some(pos) = self.lru_queue.iter().position(|&id| id == block_id) {
            self.lru_queue.remove(pos);
        }
        self.lru_queue.push_back(block_id);
    }

    /// Evict the least recently used block.
    fn evict_one(&mut self) {
        if let Some(id) = self.lru_queue.pop_front() {
            self.blocks.remove(&id);
            self.stats.evictions += 1;
        }
    }

    /// Remove all cached blocks.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.lru_queue.clear();
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Maximum number of cached blocks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }
}

/// Thread-safe wrapper around [`BlockCache`] for concurrent reader use.
#[derive(Debug)]
pub struct SharedBlockCache {
    inner: Mutex<BlockCache>,
}

impl SharedBlockCache {
    /// Create a new shared cache holding at most `capacity` blocks.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BlockCache::new(capacity)),
        }
    }

    /// Get a block by id.
    pub fn get(&self, block_id: u64) -> Option<Arc<DataBlock>> {
        self.inner.lock().get(block_id)
    }

    /// Insert a block.
    pub fn put(&self, block_id: u64, block: Arc<DataBlock>) {
        self.inner.lock().put(block_id, block)
    }

    /// Remove all cached blocks.
    pub fn clear(&self) {
        self.inner.lock().clear()
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressionKind;

    fn block_with(key: &[u8]) -> Arc<DataBlock> {
        let mut block = DataBlock::new(CompressionKind::None);
        block.add_item(key, b"value");
        Arc::new(block)
    }

    #[test]
    fn test_cache_basic_operations() {
        let mut cache = BlockCache::new(4);

        assert!(cache.get(1).is_none());

        let block = block_with(b"a");
        cache.put(1, Arc::clone(&block));
        let hit = cache.get(1).unwrap();
        assert_eq!(hit.entries(), block.entries());

        let stats = cache.stats();
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.insertions, 1);
    }

    #[test]
    fn test_cache_never_exceeds_capacity() {
        let mut cache = BlockCache::new(3);

        for id in 0..10 {
            cache.put(id, block_with(&[id as u8]));
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions, 7);
    }

    #[test]
    fn test_cache_evicts_lru_first() {
        let mut cache = BlockCache::new(3);
        cache.put(1, block_with(b"1"));
        cache.put(2, block_with(b"2"));
        cache.put(3, block_with(b"3"));

        // Touch 1, making 2 the least recently used.
        cache.get(1);
        cache.put(4, block_with(b"4"));

        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
        assert!(cache.get(3).is_some());
        assert!(cache.get(4).is_some());
    }

    #[test]
    fn test_cache_reinsert_refreshes() {
        let mut cache = BlockCache::new(2);
        cache.put(1, block_with(b"1"));
        cache.put(2, block_with(b"2"));

        // Re-insert 1; 2 becomes LRU.
        cache.put(1, block_with(b"1b"));
        cache.put(3, block_with(b"3"));

        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn test_cache_disabled_when_capacity_zero() {
        let mut cache = BlockCache::new(0);
        cache.put(1, block_with(b"1"));
        assert!(cache.get(1).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_cache_clear() {
        let mut cache = BlockCache::new(4);
        cache.put(1, block_with(b"1"));
        cache.put(2, block_with(b"2"));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn test_shared_cache_concurrent_access() {
        use std::thread;

        let cache = Arc::new(SharedBlockCache::new(64));
        let mut handles = vec![];

        for i in 0..8u64 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                let block = block_with(&[i as u8]);
                cache.put(i, Arc::clone(&block));
                assert!(cache.get(i).is_some());
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 8);
    }

    #[test]
    fn test_blocks_shared_with_iterators() {
        let mut cache = BlockCache::new(1);
        let block = block_with(b"shared");
        cache.put(1, Arc::clone(&block));

        let held = cache.get(1).unwrap();
        // Evict it; the held reference keeps the block alive.
        cache.put(2, block_with(b"other"));
        assert!(cache.get(1).is_none());
        assert_eq!(held.entries()[0].key, b"shared");
    }
}
