//! Byte storage for regular files.
//!
//! Content is addressed by a [`ContentRef`] owned by the file's inode, never
//! by path. Every directory entry that names the inode therefore reads and
//! writes the same bytes, which is what makes hard links work.
//!
//! Two backends implement [`ContentStore`]:
//! - [`MemoryContentStore`]: one growable buffer per file.
//! - [`BlockContentStore`]: fixed-size blocks from a bounded pool.

mod block;
mod store;

pub use block::BlockContentStore;
pub use store::{ContentRef, ContentStore, MemoryContentStore};
