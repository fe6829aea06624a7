//! Inode primitives for the filesystem engine.
//!
//! The inode table holds identity and metadata; the directory tree holds
//! names. Keeping the two apart is what lets several names share one file.

mod dir;
mod table;
mod types;

pub use dir::DirectoryTree;
pub use table::{InodeTable, LinkOutcome};
pub use types::{DirEntry, InodeId, InodeKind, InodeRecord, Metadata, ROOT_INODE};
