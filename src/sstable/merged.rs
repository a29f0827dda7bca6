//! Merged reader: point lookups and ordered iteration across a group of
//! related table files.
//!
//! Files are grouped into shard sets by their `sstable_set_id` metadata.
//! A sharded set routes lookups straight to the one responsible shard via
//! its recorded policy; files without sharding provenance form one
//! best-effort "unshardable" set that is probed linearly.

use crate::config::Options;
use crate::error::{Error, Result};
use crate::sstable::reader::{SSTableIter, SSTableReader};
use crate::sstable::sharding::ShardingKind;
use crate::sstable::{
    SHARD_ID_KEY, SHARD_POLICY_KEY, SHARD_TOTAL_NUM_KEY, SSTABLE_SET_ID_KEY,
};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, BTreeMap};
use std::path::{Path, PathBuf};

/// One shard set: either a complete sharded group with a routing policy,
/// or the unshardable remainder probed file by file.
#[derive(Debug)]
struct ShardSet {
    /// Routing policy and shard count; `None` for the unshardable set.
    policy: Option<(ShardingKind, u32)>,
    /// Reader indices. For a sharded set, position equals `shard_id`.
    members: Vec<usize>,
}

/// Reader over N related table files.
#[derive(Debug)]
pub struct MergedReader {
    readers: Vec<(PathBuf, SSTableReader)>,
    sets: Vec<ShardSet>,
}

impl MergedReader {
    /// Open every path with the mode carried by `options` and group the
    /// files into shard sets. Inconsistent or incomplete sets (mismatched
    /// policy or total, duplicate or out-of-range shard ids, missing
    /// shards) fail fast.
    pub fn open<P: AsRef<Path>>(paths: &[P], options: Options) -> Result<Self> {
        let mut readers = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref().to_path_buf();
            let reader = SSTableReader::open(&path, options.clone())?;
            readers.push((path, reader));
        }

        let mut grouped: BTreeMap<String, Vec<(usize, u32, ShardingKind, u32)>> = BTreeMap::new();
        let mut unshardable = Vec::new();

        for (idx, (path, reader)) in readers.iter().enumerate() {
            let info = reader.file_info();
            let set_id = info.get_metadata(SSTABLE_SET_ID_KEY).unwrap_or("");
            if set_id.is_empty() {
                unshardable.push(idx);
                continue;
            }

            let shard_id = parse_u32(info.get_metadata(SHARD_ID_KEY), SHARD_ID_KEY, path)?;
            let total = parse_u32(
                info.get_metadata(SHARD_TOTAL_NUM_KEY),
                SHARD_TOTAL_NUM_KEY,
                path,
            )?;
            let policy_name = info.get_metadata(SHARD_POLICY_KEY).ok_or_else(|| {
                Error::invalid_argument(format!("{}: missing {}", path.display(), SHARD_POLICY_KEY))
            })?;
            let policy = ShardingKind::from_name(policy_name)?;

            grouped
                .entry(set_id.to_string())
                .or_default()
                .push((idx, shard_id, policy, total));
        }

        let mut sets = Vec::new();
        for (set_id, files) in grouped {
            sets.push(Self::build_set(&set_id, files)?);
        }
        if !unshardable.is_empty() {
            sets.push(ShardSet {
                policy: None,
                members: unshardable,
            });
        }

        Ok(Self { readers, sets })
    }

    fn build_set(set_id: &str, files: Vec<(usize, u32, ShardingKind, u32)>) -> Result<ShardSet> {
        let (_, _, policy, total) = files[0];
        let mut members: Vec<Option<usize>> = vec![None; total as usize];

        for (idx, shard_id, file_policy, file_total) in files {
            if file_policy != policy || file_total != total {
                return Err(Error::invalid_argument(format!(
                    "shard set {}: mismatched policy or shard total",
                    set_id
                )));
            }
            let slot = members.get_mut(shard_id as usize).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "shard set {}: shard id {} out of range",
                    set_id, shard_id
                ))
            })?;
            if slot.replace(idx).is_some() {
                return Err(Error::invalid_argument(format!(
                    "shard set {}: duplicate shard id {}",
                    set_id, shard_id
                )));
            }
        }

        let members = members
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                Error::invalid_argument(format!("shard set {}: missing shard files", set_id))
            })?;

        Ok(ShardSet {
            policy: Some((policy, total)),
            members,
        })
    }

    /// Point lookup across all sets.
    ///
    /// A sharded set is asked through its one responsible shard; an
    /// unsharded set is probed file by file. When several files hold the
    /// key, the lexicographically smallest value wins. That tie-break is
    /// inherited policy, not a documented merge semantic.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut best: Option<Vec<u8>> = None;

        for set in &self.sets {
            match set.policy {
                Some((policy, total)) => {
                    let shard = policy.shard(key, total) as usize;
                    let idx = set.members[shard];
                    if let Some(value) = self.readers[idx].1.lookup(key)? {
                        keep_smallest(&mut best, value);
                    }
                }
                None => {
                    for &idx in &set.members {
                        if let Some(value) = self.readers[idx].1.lookup(key)? {
                            keep_smallest(&mut best, value);
                        }
                    }
                }
            }
        }

        Ok(best)
    }

    /// Globally merged, ordered iteration over all files, starting from
    /// the first entry with key `>= key`.
    pub fn seek(&self, key: &[u8]) -> Result<MergedIterator<'_>> {
        let mut iters = Vec::with_capacity(self.readers.len());
        let mut heap = BinaryHeap::new();

        for (source, (_, reader)) in self.readers.iter().enumerate() {
            let mut iter = reader.new_iterator()?;
            iter.seek(key)?;
            if iter.valid() {
                heap.push(MergeEntry {
                    key: iter.key().to_vec(),
                    value: iter.value().to_vec(),
                    source,
                });
            }
            iters.push(iter);
        }

        Ok(MergedIterator { iters, heap })
    }

    /// Total entry count across all open files.
    pub fn entry_count(&self) -> u64 {
        self.readers
            .iter()
            .map(|(_, r)| r.entry_count() as u64)
            .sum()
    }

    /// Every caller metadata entry of every open file.
    pub fn iterate_metadata(&self) -> Vec<(&Path, &str, &str)> {
        self.readers
            .iter()
            .flat_map(|(path, reader)| {
                reader
                    .file_info()
                    .metadata()
                    .iter()
                    .map(move |(k, v)| (path.as_path(), k.as_str(), v.as_str()))
            })
            .collect()
    }

    /// Number of open files.
    pub fn file_count(&self) -> usize {
        self.readers.len()
    }
}

fn parse_u32(value: Option<&str>, name: &str, path: &Path) -> Result<u32> {
    let value = value.ok_or_else(|| {
        Error::invalid_argument(format!("{}: missing {}", path.display(), name))
    })?;
    value.parse().map_err(|_| {
        Error::invalid_argument(format!("{}: bad {}: {}", path.display(), name, value))
    })
}

fn keep_smallest(best: &mut Option<Vec<u8>>, candidate: Vec<u8>) {
    match best {
        Some(current) if *current <= candidate => {}
        _ => *best = Some(candidate),
    }
}

/// Entry in the merge heap, ordered by (key, value, source index).
struct MergeEntry {
    key: Vec<u8>,
    value: Vec<u8>,
    source: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value && self.source == other.source
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for a min-heap: smallest (key, value) first.
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.value.cmp(&self.value))
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Globally merged iterator across the files of a [`MergedReader`].
///
/// Pops the minimum (key, value), advances the contributing file's
/// iterator, and reinserts it while it stays valid.
pub struct MergedIterator<'a> {
    iters: Vec<SSTableIter<'a>>,
    heap: BinaryHeap<MergeEntry>,
}

impl<'a> MergedIterator<'a> {
    /// Pop the next entry, surfacing any error met while advancing the
    /// contributing file. The writer paths drain through this so a read
    /// failure mid-merge fails the whole operation instead of silently
    /// truncating the stream.
    pub fn try_next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let entry = match self.heap.pop() {
            Some(entry) => entry,
            None => return Ok(None),
        };
        self.advance_source(entry.source)?;
        Ok(Some((entry.key, entry.value)))
    }

    fn advance_source(&mut self, source: usize) -> Result<()> {
        let iter = &mut self.iters[source];
        iter.next()?;
        if iter.valid() {
            self.heap.push(MergeEntry {
                key: iter.key().to_vec(),
                value: iter.value().to_vec(),
                source,
            });
        }
        Ok(())
    }
}

impl<'a> Iterator for MergedIterator<'a> {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        match self.try_next() {
            Ok(item) => item,
            Err(e) => {
                log::error!("error advancing merged iterator: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressionKind;
    use crate::sstable::index::DataIndex;
    use crate::sstable::trailer::FileTrailer;
    use crate::sstable::writer::SingleWriter;
    use crate::sstable::TRAILER_SIZE;
    use tempfile::TempDir;

    fn options() -> Options {
        Options::default().compression(CompressionKind::None)
    }

    fn write_table(path: &Path, entries: &[(&[u8], &[u8])]) {
        let mut writer = SingleWriter::new(path, options()).unwrap();
        for (key, value) in entries {
            writer.add(key, value).unwrap();
        }
        writer.flush().unwrap();
    }

    #[test]
    fn test_merged_iteration_interleaves() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.sst");
        let b = dir.path().join("b.sst");
        write_table(&a, &[(b"a", b"1"), (b"c", b"3"), (b"e", b"5")]);
        write_table(&b, &[(b"b", b"2"), (b"d", b"4"), (b"f", b"6")]);

        let merged = MergedReader::open(&[&a, &b], options()).unwrap();
        let result: Vec<_> = merged.seek(b"").unwrap().collect();

        assert_eq!(
            result,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"c".to_vec(), b"3".to_vec()),
                (b"d".to_vec(), b"4".to_vec()),
                (b"e".to_vec(), b"5".to_vec()),
                (b"f".to_vec(), b"6".to_vec()),
            ]
        );
    }

    #[test]
    fn test_merged_seek_starts_mid_stream() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.sst");
        let b = dir.path().join("b.sst");
        write_table(&a, &[(b"a", b"1"), (b"c", b"3")]);
        write_table(&b, &[(b"b", b"2"), (b"d", b"4")]);

        let merged = MergedReader::open(&[&a, &b], options()).unwrap();
        let result: Vec<_> = merged.seek(b"c").unwrap().collect();

        assert_eq!(
            result,
            vec![(b"c".to_vec(), b"3".to_vec()), (b"d".to_vec(), b"4".to_vec())]
        );
    }

    #[test]
    fn test_merged_duplicate_keys_ordered_by_value() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.sst");
        let b = dir.path().join("b.sst");
        write_table(&a, &[(b"k", b"zz")]);
        write_table(&b, &[(b"k", b"aa")]);

        let merged = MergedReader::open(&[&a, &b], options()).unwrap();
        let result: Vec<_> = merged.seek(b"").unwrap().collect();

        assert_eq!(
            result,
            vec![(b"k".to_vec(), b"aa".to_vec()), (b"k".to_vec(), b"zz".to_vec())]
        );
    }

    #[test]
    fn test_unsharded_lookup_keeps_smallest_value() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.sst");
        let b = dir.path().join("b.sst");
        let c = dir.path().join("c.sst");
        write_table(&a, &[(b"k", b"mm")]);
        write_table(&b, &[(b"k", b"aa")]);
        write_table(&c, &[(b"other", b"x")]);

        let merged = MergedReader::open(&[&a, &b, &c], options()).unwrap();
        assert_eq!(merged.lookup(b"k").unwrap(), Some(b"aa".to_vec()));
        assert_eq!(merged.lookup(b"other").unwrap(), Some(b"x".to_vec()));
        assert_eq!(merged.lookup(b"absent").unwrap(), None);
    }

    #[test]
    fn test_empty_file_participates() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.sst");
        let b = dir.path().join("b.sst");
        write_table(&a, &[(b"a", b"1")]);
        write_table(&b, &[]);

        let merged = MergedReader::open(&[&a, &b], options()).unwrap();
        assert_eq!(merged.entry_count(), 1);
        let result: Vec<_> = merged.seek(b"").unwrap().collect();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_try_next_surfaces_block_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.sst");
        let opts = options().block_size(32);

        let mut writer = SingleWriter::new(&path, opts.clone()).unwrap();
        for i in 0..50u32 {
            let key = format!("{:09}", i);
            writer.add(key.as_bytes(), b"v").unwrap();
        }
        writer.flush().unwrap();

        // Clobber the second data block's magic, leaving the trailer and
        // index intact so the file still opens.
        let mut bytes = std::fs::read(&path).unwrap();
        let trailer =
            FileTrailer::decode_from_bytes(&bytes[bytes.len() - TRAILER_SIZE..]).unwrap();
        let index = DataIndex::decode_from_bytes(
            &bytes[trailer.data_index_offset as usize..trailer.meta_index_offset as usize],
        )
        .unwrap();
        assert!(index.len() > 1);
        let offset = index.blocks()[1].offset as usize;
        bytes[offset..offset + 4].copy_from_slice(&[0xff; 4]);
        std::fs::write(&path, &bytes).unwrap();

        let merged = MergedReader::open(&[&path], opts).unwrap();
        let mut stream = merged.seek(b"").unwrap();
        let err = loop {
            match stream.try_next() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("corrupt block went unreported"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn test_metadata_aggregation() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.sst");
        let b = dir.path().join("b.sst");

        let mut writer = SingleWriter::new(&a, options()).unwrap();
        writer.add(b"k", b"v").unwrap();
        writer.add_metadata("table", "a");
        writer.flush().unwrap();

        let mut writer = SingleWriter::new(&b, options()).unwrap();
        writer.add(b"k", b"v").unwrap();
        writer.add_metadata("table", "b");
        writer.flush().unwrap();

        let merged = MergedReader::open(&[&a, &b], options()).unwrap();
        let metadata = merged.iterate_metadata();
        assert_eq!(metadata.len(), 2);
        assert!(metadata.iter().any(|(_, k, v)| *k == "table" && *v == "a"));
        assert!(metadata.iter().any(|(_, k, v)| *k == "table" && *v == "b"));
    }
}
