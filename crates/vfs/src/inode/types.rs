//! Core inode types.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::content::ContentRef;

/// Unique identifier for an inode.
pub type InodeId = u64;

/// Root directory inode ID (always 1 per FUSE convention).
pub const ROOT_INODE: InodeId = 1;

/// Type of inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InodeKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// Identity and metadata for one filesystem object, independent of names.
#[derive(Debug, Clone)]
pub struct InodeRecord {
    /// Inode ID.
    pub id: InodeId,
    /// Object type.
    pub kind: InodeKind,
    /// Number of directory entries naming this inode.
    pub link_count: u32,
    /// Size in bytes (always 0 for directories).
    pub size: u64,
    /// Content store handle (files only).
    pub content: Option<ContentRef>,
    /// Containing directory (directories only; the root is its own parent).
    pub parent: InodeId,
    /// Last access time.
    pub atime: SystemTime,
    /// Last content modification time.
    pub mtime: SystemTime,
    /// Last metadata change time.
    pub ctime: SystemTime,
}

impl InodeRecord {
    /// Fresh record with all timestamps set to now.
    pub fn new(id: InodeId, kind: InodeKind, content: Option<ContentRef>) -> Self {
        let now: SystemTime = SystemTime::now();
        Self {
            id,
            kind,
            link_count: 0,
            size: 0,
            content,
            parent: ROOT_INODE,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// Whether this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    /// Public metadata view.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            ino: self.id,
            kind: self.kind,
            size: self.size,
            link_count: self.link_count,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
        }
    }
}

/// Attributes returned by `stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Inode ID.
    pub ino: InodeId,
    /// Object type.
    pub kind: InodeKind,
    /// Size in bytes.
    pub size: u64,
    /// Number of directory entries naming the inode.
    pub link_count: u32,
    /// Last access time.
    pub atime: SystemTime,
    /// Last content modification time.
    pub mtime: SystemTime,
    /// Last metadata change time.
    pub ctime: SystemTime,
}

impl Metadata {
    /// Whether this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    /// Whether this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == InodeKind::File
    }
}

/// One entry returned by `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name.
    pub name: String,
    /// Inode the entry names.
    pub ino: InodeId,
    /// Type of that inode.
    pub kind: InodeKind,
}
