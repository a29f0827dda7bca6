//! Composited writer: external sort for inputs too large to sort in memory.
//!
//! Entries accumulate in a [`SingleWriter`] until `Options::batch_write_size`
//! bytes, at which point the batch is flushed to a temporary spill file and
//! a fresh batch starts. At flush time all spills are opened through the
//! merged reader and drained, globally sorted, into one [`UnsortedWriter`]
//! at the final path.

use crate::config::{Options, ReaderMode};
use crate::error::Result;
use crate::sstable::merged::MergedReader;
use crate::sstable::writer::{sibling_path, SingleWriter, UnsortedWriter};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Writer that spills sorted batches to disk and merges them at flush.
pub struct CompositedWriter {
    final_path: PathBuf,
    options: Options,
    current: SingleWriter,
    spill_paths: Vec<PathBuf>,
    spill_seq: usize,
    metadata: BTreeMap<String, String>,
    item_num: u64,
    finished: bool,
}

impl CompositedWriter {
    /// Create a writer targeting `path`.
    pub fn new<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        options.validate()?;
        let final_path = path.as_ref().to_path_buf();
        let first_spill = sibling_path(&final_path, ".spill0");
        let current = SingleWriter::new(&first_spill, options.clone())?;

        Ok(Self {
            final_path,
            options,
            current,
            spill_paths: vec![first_spill],
            spill_seq: 1,
            metadata: BTreeMap::new(),
            item_num: 0,
            finished: false,
        })
    }

    /// Append one entry, in any order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.current.add(key, value)?;
        self.item_num += 1;

        if self.current.entry_bytes() as usize >= self.options.batch_write_size {
            self.roll_spill()?;
        }
        Ok(())
    }

    /// Append one entry, aborting the process on failure.
    pub fn add_or_die(&mut self, key: &[u8], value: &[u8]) {
        if let Err(e) = self.add(key, value) {
            panic!("add_or_die failed: {}", e);
        }
    }

    /// Attach a metadata entry for the final file.
    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    /// Number of entries added so far.
    pub fn item_num(&self) -> u64 {
        self.item_num
    }

    /// Number of spill files written so far (the open batch included).
    pub fn spill_count(&self) -> usize {
        self.spill_paths.len()
    }

    /// Flush the full current batch and start a new one.
    fn roll_spill(&mut self) -> Result<()> {
        let next_path = sibling_path(&self.final_path, &format!(".spill{}", self.spill_seq));
        self.spill_seq += 1;
        let next = SingleWriter::new(&next_path, self.options.clone())?;

        let full = std::mem::replace(&mut self.current, next);
        self.spill_paths.push(next_path);
        full.flush()
    }

    /// Merge all spills into the final file and delete them.
    pub fn flush(mut self) -> Result<()> {
        let result = self.merge_spills();

        for path in &self.spill_paths {
            let _ = fs::remove_file(path);
        }
        self.finished = true;
        result
    }

    fn merge_spills(&mut self) -> Result<()> {
        let full = std::mem::replace(
            &mut self.current,
            SingleWriter::new(&self.final_path, self.options.clone())?,
        );
        full.flush()?;

        // Spills are individually sorted; the merged reader yields the
        // globally sorted stream across them.
        let reader_options = self.options.clone().reader_mode(ReaderMode::OnDisk);
        let merged = MergedReader::open(&self.spill_paths, reader_options)?;

        let mut writer = UnsortedWriter::new(&self.final_path, self.options.clone())?;
        for (key, value) in &self.metadata {
            writer.add_metadata(key, value);
        }
        let mut stream = merged.seek(b"")?;
        while let Some((key, value)) = stream.try_next()? {
            writer.add(&key, &value)?;
        }
        writer.flush()
    }
}

impl Drop for CompositedWriter {
    fn drop(&mut self) {
        if !self.finished {
            for path in &self.spill_paths {
                let _ = fs::remove_file(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressionKind;
    use crate::sstable::reader::SSTableReader;
    use tempfile::TempDir;

    fn options() -> Options {
        Options::default().compression(CompressionKind::None)
    }

    #[test]
    fn test_composited_single_batch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.sst");

        let mut writer = CompositedWriter::new(&path, options()).unwrap();
        writer.add(b"banana", b"2").unwrap();
        writer.add(b"apple", b"1").unwrap();
        writer.flush().unwrap();

        let reader = SSTableReader::open(&path, options()).unwrap();
        assert_eq!(reader.entry_count(), 2);
        assert_eq!(reader.lookup(b"apple").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_composited_multiple_spills() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.sst");

        // Tiny batch threshold so every few entries spill.
        let mut writer = CompositedWriter::new(&path, options().batch_write_size(64)).unwrap();
        let mut keys: Vec<u32> = (0..200).collect();
        // Deliberately unsorted input.
        keys.reverse();
        for i in keys {
            let key = format!("key{:06}", i);
            let value = format!("value{:06}", i);
            writer.add(key.as_bytes(), value.as_bytes()).unwrap();
        }
        assert!(writer.spill_count() > 1);
        writer.flush().unwrap();

        let reader = SSTableReader::open(&path, options()).unwrap();
        assert_eq!(reader.entry_count(), 200);

        // Globally sorted output.
        let mut iter = reader.new_iterator().unwrap();
        let mut prev: Option<Vec<u8>> = None;
        let mut count = 0;
        while iter.valid() {
            if let Some(prev) = &prev {
                assert!(prev.as_slice() <= iter.key());
            }
            prev = Some(iter.key().to_vec());
            count += 1;
            iter.next().unwrap();
        }
        assert_eq!(count, 200);
    }

    #[test]
    fn test_composited_removes_spill_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.sst");

        let mut writer = CompositedWriter::new(&path, options().batch_write_size(32)).unwrap();
        for i in 0..50 {
            writer.add(format!("k{:04}", i).as_bytes(), b"v").unwrap();
        }
        writer.flush().unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|name| name.to_string_lossy().contains("spill"))
            .collect();
        assert!(leftovers.is_empty(), "leftover spills: {:?}", leftovers);
        assert!(path.exists());
    }

    #[test]
    fn test_composited_drop_removes_spill_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.sst");

        let mut writer = CompositedWriter::new(&path, options().batch_write_size(32)).unwrap();
        for i in 0..50 {
            writer.add(format!("k{:04}", i).as_bytes(), b"v").unwrap();
        }
        assert!(writer.spill_count() > 1);
        drop(writer);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|name| name.to_string_lossy().contains("spill"))
            .collect();
        assert!(leftovers.is_empty(), "leftover spills: {:?}", leftovers);
        assert!(!path.exists());
    }

    #[test]
    fn test_composited_metadata_propagates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.sst");

        let mut writer = CompositedWriter::new(&path, options()).unwrap();
        writer.add(b"k", b"v").unwrap();
        writer.add_metadata("origin", "composite-test");
        writer.flush().unwrap();

        assert_eq!(
            SSTableReader::get_metadata(&path, "origin").unwrap(),
            Some("composite-test".to_string())
        );
    }

    #[test]
    fn test_composited_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.sst");

        let writer = CompositedWriter::new(&path, options()).unwrap();
        writer.flush().unwrap();

        assert_eq!(SSTableReader::get_entry_count(&path).unwrap(), 0);
    }
}
