//! Open file handle tracking.
//!
//! A handle is a per-open cursor over an inode's content. Handles never hold
//! names, so unlinking another hard link to the same file does not disturb
//! them. Each handle sits behind its own mutex so concurrent
//! users of distinct handles never contend, while two threads sharing one
//! handle see its offset advance consistently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{FsError, Result};
use crate::inode::InodeId;

/// Identifier handed to callers for an open file.
pub type HandleId = u64;

/// How a handle was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read from offset 0.
    Read,
    /// Create if missing, truncate to empty, write from offset 0.
    WriteTruncate,
    /// Create if missing, every write lands at the current end of content.
    Append,
}

impl OpenMode {
    /// Whether opening a missing path creates the file.
    pub fn creates(self) -> bool {
        !matches!(self, OpenMode::Read)
    }

    /// Whether `read` is allowed.
    pub fn can_read(self) -> bool {
        matches!(self, OpenMode::Read)
    }

    /// Whether `write` is allowed.
    pub fn can_write(self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// State of one open handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenHandle {
    /// Inode the handle reads and writes.
    pub inode: InodeId,
    /// Open mode.
    pub mode: OpenMode,
    /// Byte cursor.
    pub offset: u64,
}

/// Table of open handles.
pub struct HandleManager {
    /// Next handle ID to allocate.
    next_handle: AtomicU64,
    /// Open handles by ID.
    handles: Mutex<HashMap<HandleId, Arc<Mutex<OpenHandle>>>>,
}

impl HandleManager {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new handle.
    ///
    /// # Arguments
    /// * `inode` - Target inode
    /// * `mode` - Open mode
    /// * `offset` - Initial cursor
    ///
    /// # Returns
    /// The new handle ID.
    pub fn insert(&self, inode: InodeId, mode: OpenMode, offset: u64) -> HandleId {
        let id: HandleId = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let handle: OpenHandle = OpenHandle {
            inode,
            mode,
            offset,
        };
        self.handles
            .lock()
            .insert(id, Arc::new(Mutex::new(handle)));
        id
    }

    /// Shared access to an open handle.
    ///
    /// # Returns
    /// `BadHandle` if the ID is unknown or closed.
    pub fn get(&self, id: HandleId) -> Result<Arc<Mutex<OpenHandle>>> {
        self.handles
            .lock()
            .get(&id)
            .cloned()
            .ok_or(FsError::BadHandle(id))
    }

    /// Close a handle.
    ///
    /// # Returns
    /// The handle's final state.
    pub fn remove(&self, id: HandleId) -> Result<OpenHandle> {
        let handle: Arc<Mutex<OpenHandle>> = self
            .handles
            .lock()
            .remove(&id)
            .ok_or(FsError::BadHandle(id))?;
        let state: OpenHandle = handle.lock().clone();
        Ok(state)
    }

    /// Close every handle.
    ///
    /// # Returns
    /// Number of handles that were open.
    pub fn clear(&self) -> usize {
        let mut handles = self.handles.lock();
        let count: usize = handles.len();
        handles.clear();
        count
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Whether no handles are open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all open handles, sorted by ID.
    pub fn list(&self) -> Vec<(HandleId, OpenHandle)> {
        let handles = self.handles.lock();
        let mut out: Vec<(HandleId, OpenHandle)> = handles
            .iter()
            .map(|(&id, h)| (id, h.lock().clone()))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }
}

impl Default for HandleManager {
    fn default() -> Self {
        Self::new()
    }
}
