//! The filesystem engine: namespace operations and handle I/O.

use std::time::{Instant, SystemTime};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::content::{ContentRef, ContentStore};
use crate::error::{ContentError, FsError, Result};
use crate::handle::{HandleId, HandleManager, OpenHandle, OpenMode};
use crate::inode::{
    DirEntry, DirectoryTree, InodeId, InodeKind, InodeRecord, InodeTable, LinkOutcome, Metadata,
};
use crate::options::FsOptions;
use crate::path::PathResolver;
use crate::snapshot::Snapshot;

/// Chunk size used by the whole-file convenience readers.
const READ_CHUNK: u64 = 64 * 1024;

/// Inode table, directory tree and content store, guarded together.
pub(crate) struct Namespace {
    pub(crate) inodes: InodeTable,
    pub(crate) tree: DirectoryTree,
    pub(crate) store: Box<dyn ContentStore>,
}

impl Namespace {
    /// Empty namespace holding only the root directory.
    pub(crate) fn new(options: &FsOptions) -> Self {
        Self {
            inodes: InodeTable::new(options.max_inodes),
            tree: DirectoryTree::new(),
            store: options.storage.build(),
        }
    }

    fn resolver(&self, max_name_len: usize) -> PathResolver<'_> {
        PathResolver::new(&self.inodes, &self.tree, max_name_len)
    }

    /// Record for an inode known to be live. A miss is internal corruption.
    fn record(&self, id: InodeId) -> &InodeRecord {
        match self.inodes.get(id) {
            Ok(record) => record,
            Err(_) => panic!("namespace references missing inode {}", id),
        }
    }

    /// Allocate a file inode with fresh content and link it as `parent/name`.
    fn create_file(&mut self, parent: InodeId, name: &str) -> Result<InodeId> {
        let content: ContentRef = self.store.create().map_err(content_failure)?;
        let id: InodeId = match self.inodes.allocate(InodeKind::File, Some(content)) {
            Ok(id) => id,
            Err(e) => {
                self.store.release(content).map_err(content_failure)?;
                return Err(e);
            }
        };
        self.tree.insert(parent, name, id)?;
        self.inodes.increment_link(id)?;
        self.inodes.touch(parent)?;
        Ok(id)
    }

    /// Release whatever a destroyed inode owned.
    fn reclaim(&mut self, outcome: LinkOutcome) -> Result<()> {
        if let LinkOutcome::Destroyed(record) = outcome {
            if let Some(content) = record.content {
                self.store.release(content).map_err(content_failure)?;
            }
            tracing::trace!("inode {} destroyed", record.id);
        }
        Ok(())
    }
}

/// Map a backend failure to a caller-visible error. An unknown reference
/// means the inode table and content store disagree, which is fatal.
pub(crate) fn content_failure(err: ContentError) -> FsError {
    match err {
        ContentError::NoSpace => FsError::NoSpace,
        ContentError::TooLarge => FsError::FileTooLarge(u64::MAX),
        ContentError::UnknownRef(content) => {
            panic!("content store lost {} still owned by an inode", content)
        }
    }
}

/// Content reference of a regular file record.
fn file_content(record: &InodeRecord) -> ContentRef {
    match record.content {
        Some(content) => content,
        None => panic!("file inode {} has no content", record.id),
    }
}

/// Statistics snapshot from the engine.
#[derive(Debug, Clone)]
pub struct FsStats {
    /// Number of live inodes, root included.
    pub inode_count: usize,
    /// Number of open handles.
    pub open_handles: usize,
    /// Open handles with their state.
    pub open_handle_list: Vec<(HandleId, OpenHandle)>,
    /// Bytes held by the content store.
    pub bytes_stored: u64,
    /// Time since the engine was created.
    pub uptime_secs: u64,
}

/// Inode-based filesystem engine.
///
/// All namespace state sits behind one reader-writer lock: lookups, `stat`,
/// `readdir` and reads share it, every mutation (each write included) holds
/// it exclusively. Handles carry their own mutex; the lock order is handle,
/// then namespace.
///
/// # Example
///
/// ```
/// use inodefs_vfs::{FsOptions, InodeFs, OpenMode};
///
/// let fs = InodeFs::new(FsOptions::default());
/// fs.mkdir("/docs").unwrap();
/// let fh = fs.open("/docs/a.txt", OpenMode::WriteTruncate).unwrap();
/// fs.write(fh, b"Hello").unwrap();
/// fs.close(fh).unwrap();
/// assert_eq!(fs.read_file("/docs/a.txt").unwrap(), b"Hello");
/// ```
pub struct InodeFs {
    state: RwLock<Namespace>,
    handles: HandleManager,
    options: FsOptions,
    start_time: Instant,
}

impl InodeFs {
    /// Create an empty filesystem.
    pub fn new(options: FsOptions) -> Self {
        tracing::info!(
            "filesystem created (storage: {:?}, max_inodes: {:?})",
            options.storage,
            options.max_inodes
        );
        let namespace: Namespace = Namespace::new(&options);
        Self::with_namespace(namespace, options)
    }

    /// Create a filesystem, restoring it from `options.snapshot_path` when
    /// that file exists.
    pub fn load(options: FsOptions) -> Result<Self> {
        match &options.snapshot_path {
            Some(path) if path.exists() => {
                let snapshot: Snapshot = Snapshot::load(path)?;
                tracing::info!("restoring filesystem from {}", path.display());
                Self::from_snapshot(snapshot, options)
            }
            _ => Ok(Self::new(options)),
        }
    }

    /// Rebuild a filesystem from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot, options: FsOptions) -> Result<Self> {
        let namespace: Namespace = snapshot.restore(&options)?;
        Ok(Self::with_namespace(namespace, options))
    }

    fn with_namespace(namespace: Namespace, options: FsOptions) -> Self {
        Self {
            state: RwLock::new(namespace),
            handles: HandleManager::new(),
            options,
            start_time: Instant::now(),
        }
    }

    /// Engine configuration.
    pub fn options(&self) -> &FsOptions {
        &self.options
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Namespace> {
        self.state.read()
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Namespace> {
        self.state.write()
    }

    // -------------------------------------------------------------------------
    // Namespace operations
    // -------------------------------------------------------------------------

    /// Create a directory. Intermediate directories must already exist.
    ///
    /// # Returns
    /// Inode ID of the new directory.
    pub fn mkdir(&self, path: &str) -> Result<InodeId> {
        tracing::debug!("mkdir: {}", path);
        let mut guard = self.write_state();
        let ns: &mut Namespace = &mut guard;

        let (parent, name): (InodeId, &str) =
            ns.resolver(self.options.max_name_len).resolve_parent(path)?;
        if ns.tree.lookup(parent, name).is_ok() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        let id: InodeId = ns.inodes.allocate(InodeKind::Directory, None)?;
        ns.inodes.set_parent(id, parent)?;
        ns.tree.add_dir(id);
        ns.tree.insert(parent, name, id)?;
        ns.inodes.increment_link(id)?;
        ns.inodes.touch(parent)?;
        Ok(id)
    }

    /// Remove an empty directory.
    pub fn rmdir(&self, path: &str) -> Result<()> {
        tracing::debug!("rmdir: {}", path);
        let mut guard = self.write_state();
        let ns: &mut Namespace = &mut guard;

        let (parent, name): (InodeId, &str) =
            ns.resolver(self.options.max_name_len).resolve_parent(path)?;
        let id: InodeId = ns
            .tree
            .lookup(parent, name)
            .map_err(|_| FsError::NotFound(path.to_string()))?;

        if !ns.record(id).is_dir() {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        if !ns.tree.is_empty(id)? {
            return Err(FsError::NotEmpty(path.to_string()));
        }

        ns.tree.remove(parent, name)?;
        ns.tree.remove_dir(id)?;
        let outcome: LinkOutcome = ns.inodes.decrement_link(id)?;
        ns.reclaim(outcome)?;
        ns.inodes.touch(parent)?;
        Ok(())
    }

    /// Create an empty regular file, truncating it if it already exists.
    ///
    /// # Returns
    /// A write handle positioned at offset 0.
    pub fn create(&self, path: &str) -> Result<HandleId> {
        self.open(path, OpenMode::WriteTruncate)
    }

    /// Remove a name. The file's inode and content are destroyed only when
    /// this was its last name.
    pub fn unlink(&self, path: &str) -> Result<()> {
        tracing::debug!("unlink: {}", path);
        let mut guard = self.write_state();
        let ns: &mut Namespace = &mut guard;

        let (parent, name): (InodeId, &str) =
            ns.resolver(self.options.max_name_len).resolve_parent(path)?;
        let id: InodeId = ns
            .tree
            .lookup(parent, name)
            .map_err(|_| FsError::NotFound(path.to_string()))?;

        if ns.record(id).is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }

        ns.tree.remove(parent, name)?;
        let outcome: LinkOutcome = ns.inodes.decrement_link(id)?;
        ns.reclaim(outcome)?;
        ns.inodes.touch(parent)?;
        Ok(())
    }

    /// Add `new_path` as another name for the file at `existing_path`.
    pub fn link(&self, existing_path: &str, new_path: &str) -> Result<()> {
        tracing::debug!("link: {} -> {}", new_path, existing_path);
        let mut guard = self.write_state();
        let ns: &mut Namespace = &mut guard;

        let target: InodeId = ns
            .resolver(self.options.max_name_len)
            .resolve(existing_path)?;
        if ns.record(target).is_dir() {
            return Err(FsError::IsADirectory(existing_path.to_string()));
        }

        let (parent, name): (InodeId, &str) = ns
            .resolver(self.options.max_name_len)
            .resolve_parent(new_path)?;
        if ns.tree.lookup(parent, name).is_ok() {
            return Err(FsError::AlreadyExists(new_path.to_string()));
        }

        ns.tree.insert(parent, name, target)?;
        ns.inodes.increment_link(target)?;
        ns.inodes.touch(parent)?;
        Ok(())
    }

    /// Shrink or zero-extend a regular file.
    pub fn truncate(&self, path: &str, size: u64) -> Result<()> {
        tracing::debug!("truncate: {} to {}", path, size);
        let mut guard = self.write_state();
        let ns: &mut Namespace = &mut guard;

        let id: InodeId = ns.resolver(self.options.max_name_len).resolve(path)?;
        let record: &InodeRecord = ns.record(id);
        if record.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let content: ContentRef = file_content(record);
        if size > self.options.max_file_size {
            return Err(FsError::FileTooLarge(size));
        }

        ns.store.truncate(content, size).map_err(content_failure)?;
        ns.inodes.set_size(id, size)
    }

    /// Attributes of the object at `path`.
    pub fn stat(&self, path: &str) -> Result<Metadata> {
        let ns = self.read_state();
        let id: InodeId = ns.resolver(self.options.max_name_len).resolve(path)?;
        Ok(ns.record(id).metadata())
    }

    /// Attributes of an inode by ID.
    pub fn stat_inode(&self, id: InodeId) -> Result<Metadata> {
        let ns = self.read_state();
        Ok(ns.inodes.get(id)?.metadata())
    }

    /// Attributes of the entry `name` inside directory `parent`.
    pub fn lookup(&self, parent: InodeId, name: &str) -> Result<Metadata> {
        let ns = self.read_state();
        if !ns.inodes.get(parent)?.is_dir() {
            return Err(FsError::NotADirectory(format!("inode {}", parent)));
        }
        let id: InodeId = ns.tree.lookup(parent, name)?;
        Ok(ns.record(id).metadata())
    }

    /// Entries of the directory at `path`, sorted by name. `.` and `..` are
    /// not included.
    pub fn readdir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let ns = self.read_state();
        let id: InodeId = ns.resolver(self.options.max_name_len).resolve(path)?;
        if !ns.record(id).is_dir() {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        let entries: Vec<DirEntry> = ns
            .tree
            .entries(id)?
            .into_iter()
            .map(|(name, ino)| DirEntry {
                name,
                ino,
                kind: ns.record(ino).kind,
            })
            .collect();
        Ok(entries)
    }

    /// Names in the directory at `path`, sorted.
    pub fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.readdir(path)?.into_iter().map(|e| e.name).collect())
    }

    /// Set access and modification times.
    pub fn set_times(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        tracing::debug!("set_times: {}", path);
        let mut guard = self.write_state();
        let ns: &mut Namespace = &mut guard;
        let id: InodeId = ns.resolver(self.options.max_name_len).resolve(path)?;
        ns.inodes.set_times(id, atime, mtime)
    }

    /// Whether `path` names anything.
    pub fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    /// Whether `path` names a directory.
    pub fn is_dir(&self, path: &str) -> bool {
        self.stat(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    /// Whether `path` names a regular file.
    pub fn is_file(&self, path: &str) -> bool {
        self.stat(path).map(|m| m.is_file()).unwrap_or(false)
    }

    // -------------------------------------------------------------------------
    // Handle operations
    // -------------------------------------------------------------------------

    /// Open a regular file.
    ///
    /// `Read` requires the file to exist. `WriteTruncate` and `Append` create
    /// it when missing; `WriteTruncate` empties an existing file and `Append`
    /// positions the cursor at its end.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<HandleId> {
        tracing::debug!("open: {} ({:?})", path, mode);
        let (inode, offset): (InodeId, u64) = if mode.creates() {
            self.open_for_write(path, mode)?
        } else {
            let ns = self.read_state();
            let id: InodeId = ns.resolver(self.options.max_name_len).resolve(path)?;
            if ns.record(id).is_dir() {
                return Err(FsError::IsADirectory(path.to_string()));
            }
            (id, 0)
        };
        Ok(self.handles.insert(inode, mode, offset))
    }

    fn open_for_write(&self, path: &str, mode: OpenMode) -> Result<(InodeId, u64)> {
        let mut guard = self.write_state();
        let ns: &mut Namespace = &mut guard;

        let existing: Result<InodeId> = ns.resolver(self.options.max_name_len).resolve(path);
        let id: InodeId = match existing {
            Ok(id) => id,
            Err(FsError::NotFound(_)) => {
                let (parent, name): (InodeId, &str) =
                    ns.resolver(self.options.max_name_len).resolve_parent(path)?;
                let id: InodeId = ns.create_file(parent, name)?;
                return Ok((id, 0));
            }
            Err(e) => return Err(e),
        };

        let record: &InodeRecord = ns.record(id);
        if record.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let size: u64 = record.size;
        let content: ContentRef = file_content(record);

        match mode {
            OpenMode::Append => Ok((id, size)),
            _ => {
                ns.store.truncate(content, 0).map_err(content_failure)?;
                ns.inodes.set_size(id, 0)?;
                Ok((id, 0))
            }
        }
    }

    /// Read up to `max_len` bytes at the handle's cursor and advance it.
    ///
    /// # Returns
    /// An empty vector at end of file.
    pub fn read(&self, handle: HandleId, max_len: usize) -> Result<Vec<u8>> {
        let shared = self.handles.get(handle)?;
        let mut state = shared.lock();
        let data: Vec<u8> = self.read_inner(handle, &state, state.offset, max_len)?;
        state.offset += data.len() as u64;
        Ok(data)
    }

    /// Read up to `max_len` bytes at `offset` without moving the cursor.
    pub fn read_at(&self, handle: HandleId, offset: u64, max_len: usize) -> Result<Vec<u8>> {
        let shared = self.handles.get(handle)?;
        let state = shared.lock();
        self.read_inner(handle, &state, offset, max_len)
    }

    fn read_inner(
        &self,
        handle: HandleId,
        state: &OpenHandle,
        offset: u64,
        max_len: usize,
    ) -> Result<Vec<u8>> {
        if !state.mode.can_read() {
            return Err(FsError::InvalidOperation(format!(
                "handle {} is not open for reading",
                handle
            )));
        }
        let ns = self.read_state();
        let record: &InodeRecord = ns
            .inodes
            .get(state.inode)
            .map_err(|_| FsError::BadHandle(handle))?;
        let content: ContentRef = file_content(record);
        ns.store
            .read(content, offset, max_len as u64)
            .map_err(content_failure)
    }

    /// Read from the cursor to end of file.
    pub fn read_to_end(&self, handle: HandleId) -> Result<Vec<u8>> {
        let mut out: Vec<u8> = Vec::new();
        loop {
            let chunk: Vec<u8> = self.read(handle, READ_CHUNK as usize)?;
            if chunk.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&chunk);
        }
    }

    /// Write `data` at the handle's cursor (or at end of file for `Append`
    /// handles) and advance the cursor past it.
    ///
    /// # Returns
    /// Number of bytes written.
    pub fn write(&self, handle: HandleId, data: &[u8]) -> Result<usize> {
        let shared = self.handles.get(handle)?;
        let mut state = shared.lock();
        let end: u64 = self.write_inner(handle, &state, state.offset, data)?;
        state.offset = end;
        Ok(data.len())
    }

    /// Write `data` at `offset` without moving the cursor. `Append` handles
    /// still write at end of file.
    pub fn write_at(&self, handle: HandleId, offset: u64, data: &[u8]) -> Result<usize> {
        let shared = self.handles.get(handle)?;
        let state = shared.lock();
        self.write_inner(handle, &state, offset, data)?;
        Ok(data.len())
    }

    /// Apply one write atomically.
    ///
    /// # Returns
    /// Offset just past the written bytes.
    fn write_inner(
        &self,
        handle: HandleId,
        state: &OpenHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<u64> {
        if !state.mode.can_write() {
            return Err(FsError::InvalidOperation(format!(
                "handle {} is not open for writing",
                handle
            )));
        }
        let mut guard = self.write_state();
        let ns: &mut Namespace = &mut guard;

        let record: &InodeRecord = ns
            .inodes
            .get(state.inode)
            .map_err(|_| FsError::BadHandle(handle))?;
        let content: ContentRef = file_content(record);
        let start: u64 = match state.mode {
            OpenMode::Append => record.size,
            _ => offset,
        };
        let end: u64 = start
            .checked_add(data.len() as u64)
            .ok_or(FsError::FileTooLarge(u64::MAX))?;
        if !data.is_empty() && end > self.options.max_file_size {
            return Err(FsError::FileTooLarge(end));
        }

        let new_size: u64 = ns
            .store
            .write(content, start, data)
            .map_err(content_failure)?;
        ns.inodes.set_size(state.inode, new_size)?;
        Ok(end)
    }

    /// Close a handle.
    pub fn close(&self, handle: HandleId) -> Result<()> {
        self.handles.remove(handle).map(|_| ())
    }

    // -------------------------------------------------------------------------
    // Whole-file conveniences
    // -------------------------------------------------------------------------

    /// Read an entire file.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let handle: HandleId = self.open(path, OpenMode::Read)?;
        let data: Result<Vec<u8>> = self.read_to_end(handle);
        self.close(handle)?;
        data
    }

    /// Replace a file's content, creating it if missing.
    pub fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.put(path, OpenMode::WriteTruncate, data)
    }

    /// Append to a file, creating it if missing.
    pub fn append_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.put(path, OpenMode::Append, data)
    }

    fn put(&self, path: &str, mode: OpenMode, data: &[u8]) -> Result<()> {
        let handle: HandleId = self.open(path, mode)?;
        let written: Result<usize> = self.write(handle, data);
        self.close(handle)?;
        written.map(|_| ())
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Capture the whole namespace, file bytes included.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let ns = self.read_state();
        Snapshot::capture(&ns)
    }

    /// Write a snapshot to `options.snapshot_path`, if one is configured.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.options.snapshot_path else {
            return Ok(());
        };
        let snapshot: Snapshot = self.snapshot()?;
        snapshot.save(path)?;
        tracing::debug!("flushed snapshot to {}", path.display());
        Ok(())
    }

    /// Current statistics.
    pub fn stats(&self) -> FsStats {
        let open_handle_list: Vec<(HandleId, OpenHandle)> = self.handles.list();
        let ns = self.read_state();
        FsStats {
            inode_count: ns.inodes.len(),
            open_handles: open_handle_list.len(),
            open_handle_list,
            bytes_stored: ns.store.bytes_stored(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Close every handle and persist the namespace if configured.
    ///
    /// # Returns
    /// Statistics taken just before the handles were closed.
    pub fn shutdown(self) -> Result<FsStats> {
        let stats: FsStats = self.stats();
        let closed: usize = self.handles.clear();
        if closed > 0 {
            tracing::warn!("shutdown closed {} open handles", closed);
        }
        self.flush()?;
        tracing::info!(
            "filesystem shut down ({} inodes, {} bytes)",
            stats.inode_count,
            stats.bytes_stored
        );
        Ok(stats)
    }
}
