//! In-memory, inode-based filesystem engine.
//!
//! Files and directories are identified by inodes, separately from the names
//! that refer to them. A regular file may carry several names (hard links);
//! its bytes live until the last name is removed. Byte I/O goes through
//! handles with private cursors, and every operation is safe to call from
//! many threads at once.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: InodeFs (namespace operations, handle I/O, snapshots)
//! Layer 2: PathResolver, HandleManager
//! Layer 1: Primitives (InodeTable, DirectoryTree, ContentStore)
//! ```
//!
//! # Example
//!
//! ```
//! use inodefs_vfs::{FsOptions, InodeFs, OpenMode};
//!
//! let fs = InodeFs::new(FsOptions::default());
//! fs.write_file("/a.txt", b"Hello").unwrap();
//! fs.link("/a.txt", "/b.txt").unwrap();
//! fs.unlink("/a.txt").unwrap();
//!
//! let fh = fs.open("/b.txt", OpenMode::Read).unwrap();
//! assert_eq!(fs.read(fh, 5).unwrap(), b"Hello");
//! fs.close(fh).unwrap();
//! ```

pub mod content;
pub mod error;
pub mod fs;
pub mod handle;
pub mod inode;
pub mod options;
pub mod path;
pub mod snapshot;

pub use content::{BlockContentStore, ContentRef, ContentStore, MemoryContentStore};
pub use error::{ContentError, FsError, Result, SnapshotError};
pub use fs::{FsStats, InodeFs};
pub use handle::{HandleId, OpenHandle, OpenMode};
pub use inode::{DirEntry, InodeId, InodeKind, Metadata, ROOT_INODE};
pub use options::{FsOptions, StorageBackend, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_NAME_LEN};
pub use snapshot::Snapshot;
