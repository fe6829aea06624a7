//! Configuration options for the filesystem engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::content::{BlockContentStore, ContentStore, MemoryContentStore};

/// Default maximum length of a single name, in bytes.
pub const DEFAULT_MAX_NAME_LEN: usize = 255;

/// Default largest size a regular file may reach, in bytes (1 GiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

/// Backend that holds regular-file bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageBackend {
    /// One growable buffer per file, unbounded.
    #[default]
    Memory,
    /// Fixed-size blocks from a bounded pool.
    Blocks {
        /// Bytes per block.
        block_size: usize,
        /// Maximum number of blocks.
        max_blocks: usize,
    },
}

impl StorageBackend {
    /// Build an empty content store for this backend.
    pub fn build(&self) -> Box<dyn ContentStore> {
        match self {
            StorageBackend::Memory => Box::new(MemoryContentStore::new()),
            StorageBackend::Blocks {
                block_size,
                max_blocks,
            } => Box::new(BlockContentStore::new(*block_size, *max_blocks)),
        }
    }
}

/// Configuration for an [`InodeFs`](crate::InodeFs) instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsOptions {
    /// Longest accepted name for a new entry.
    pub max_name_len: usize,

    /// Maximum number of live inodes (root included). `None` is unbounded.
    pub max_inodes: Option<usize>,

    /// Largest size a write or truncate may grow a file to.
    pub max_file_size: u64,

    /// Content store backend.
    pub storage: StorageBackend,

    /// File the namespace is restored from on `load` and written to on
    /// `flush` and `shutdown`. `None` keeps the filesystem purely in memory.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_inodes: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            storage: StorageBackend::default(),
            snapshot_path: None,
        }
    }
}

impl FsOptions {
    /// Set the name length limit.
    ///
    /// # Arguments
    /// * `len` - Longest accepted name in bytes
    pub fn with_max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Bound the number of live inodes.
    ///
    /// # Arguments
    /// * `max` - Maximum inode count, root included
    pub fn with_max_inodes(mut self, max: usize) -> Self {
        self.max_inodes = Some(max);
        self
    }

    /// Cap the size of any one regular file.
    ///
    /// # Arguments
    /// * `max` - Largest file size in bytes
    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    /// Select the content store backend.
    pub fn with_storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    /// Use the block backend.
    ///
    /// # Arguments
    /// * `block_size` - Bytes per block
    /// * `max_blocks` - Maximum number of blocks
    pub fn with_blocks(self, block_size: usize, max_blocks: usize) -> Self {
        self.with_storage(StorageBackend::Blocks {
            block_size,
            max_blocks,
        })
    }

    /// Persist the namespace to `path`.
    pub fn with_snapshot_path(mut self, path: PathBuf) -> Self {
        self.snapshot_path = Some(path);
        self
    }

    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
