//! Horizontal sharding: partition one logical dataset into N sibling files.
//!
//! A shard set is N table files sharing one `sstable_set_id`, each stamped
//! with its `shard_id`, the total count, and the sharding policy name. The
//! merged reader uses the same policy to route a lookup straight to the
//! one responsible shard.

use crate::config::Options;
use crate::error::{Error, Result};
use crate::sstable::composite::CompositedWriter;
use crate::sstable::writer::sibling_path;
use crate::sstable::{
    SHARD_ID_KEY, SHARD_POLICY_KEY, SHARD_TOTAL_NUM_KEY, SSTABLE_SET_ID_KEY,
};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Key-to-shard routing policy.
///
/// A closed set of policies looked up by registered name; the name is
/// stamped into each shard's metadata so readers reconstruct the routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardingKind {
    /// Route by CRC32 fingerprint of the key, modulo the shard count.
    Fingerprint,
}

impl ShardingKind {
    /// Registered policy name.
    pub fn name(self) -> &'static str {
        match self {
            ShardingKind::Fingerprint => "fingerprint",
        }
    }

    /// Look up a policy by its registered name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "fingerprint" => Ok(ShardingKind::Fingerprint),
            other => Err(Error::invalid_argument(format!(
                "unknown sharding policy: {}",
                other
            ))),
        }
    }

    /// The shard index responsible for `key`, in `[0, total)`.
    pub fn shard(self, key: &[u8], total: u32) -> u32 {
        match self {
            ShardingKind::Fingerprint => crc32fast::hash(key) % total,
        }
    }
}

/// A set id shared by all files of one shard set: a fingerprint of the
/// target path and the current timestamp.
pub(crate) fn generate_set_id(path: &Path) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(&nanos.to_le_bytes());
    format!("{:08x}-{:08x}", hasher.finalize(), nanos as u32)
}

/// The sibling file paths of an N-way shard set rooted at `path`.
pub fn shard_paths<P: AsRef<Path>>(path: P, shard_num: u32) -> Vec<PathBuf> {
    (0..shard_num)
        .map(|i| sibling_path(path.as_ref(), &format!(".shard{}", i)))
        .collect()
}

/// Writer that partitions entries across N composited writers.
pub struct ShardingWriter {
    shards: Vec<CompositedWriter>,
    policy: ShardingKind,
    shard_num: u32,
    set_id: String,
}

impl ShardingWriter {
    /// Create an N-way sharding writer rooted at `path` with the policy
    /// registered under `policy_name`. Shard files appear at
    /// [`shard_paths`]`(path, shard_num)`.
    pub fn new<P: AsRef<Path>>(
        path: P,
        shard_num: u32,
        policy_name: &str,
        options: Options,
    ) -> Result<Self> {
        if shard_num == 0 {
            return Err(Error::invalid_argument("shard_num must be > 0"));
        }
        let policy = ShardingKind::from_name(policy_name)?;
        options.validate()?;

        let shards = shard_paths(path.as_ref(), shard_num)
            .into_iter()
            .map(|p| CompositedWriter::new(p, options.clone()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            shards,
            policy,
            shard_num,
            set_id: generate_set_id(path.as_ref()),
        })
    }

    /// Append one entry, routed to its responsible shard.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let shard = self.policy.shard(key, self.shard_num) as usize;
        self.shards[shard].add(key, value)
    }

    /// Append one entry, aborting the process on failure.
    pub fn add_or_die(&mut self, key: &[u8], value: &[u8]) {
        if let Err(e) = self.add(key, value) {
            panic!("add_or_die failed: {}", e);
        }
    }

    /// Attach a metadata entry, replicated into every shard file.
    pub fn add_metadata(&mut self, key: &str, value: &str) {
        for shard in &mut self.shards {
            shard.add_metadata(key, value);
        }
    }

    /// The set id that will be stamped into every shard file.
    pub fn set_id(&self) -> &str {
        &self.set_id
    }

    /// Stamp sharding provenance into each shard's metadata and flush all
    /// shard files.
    pub fn flush(self) -> Result<()> {
        let shard_num = self.shard_num;
        for (i, mut shard) in self.shards.into_iter().enumerate() {
            shard.add_metadata(SHARD_ID_KEY, &i.to_string());
            shard.add_metadata(SHARD_TOTAL_NUM_KEY, &shard_num.to_string());
            shard.add_metadata(SHARD_POLICY_KEY, self.policy.name());
            shard.add_metadata(SSTABLE_SET_ID_KEY, &self.set_id);
            shard.flush()?;
        }
        Ok(())
    }
}
