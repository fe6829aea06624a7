//! Inode table: the single source of truth for file identity.

use std::collections::HashMap;
use std::time::SystemTime;

use super::types::{InodeId, InodeKind, InodeRecord, ROOT_INODE};
use crate::content::ContentRef;
use crate::error::{FsError, Result};

/// Result of dropping one link from an inode.
#[derive(Debug)]
pub enum LinkOutcome {
    /// Inode is still referenced; carries the remaining link count.
    Alive(u32),
    /// Last link is gone. The record has been removed from the table and the
    /// caller must release its content.
    Destroyed(InodeRecord),
}

/// Maps inode IDs to inode records.
///
/// A record is present iff its link count is at least 1, except between
/// [`InodeTable::allocate`] and the caller linking it into a directory within
/// the same logical operation. The root is created pinned with one link.
#[derive(Debug)]
pub struct InodeTable {
    records: HashMap<InodeId, InodeRecord>,
    /// Next inode ID to allocate. IDs are never reused.
    next_id: InodeId,
    /// Maximum number of live inodes, if bounded.
    capacity: Option<usize>,
}

impl InodeTable {
    /// Create a table holding only the root directory.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of live inodes, root included
    pub fn new(capacity: Option<usize>) -> Self {
        let mut root: InodeRecord = InodeRecord::new(ROOT_INODE, InodeKind::Directory, None);
        root.link_count = 1;

        let mut records: HashMap<InodeId, InodeRecord> = HashMap::new();
        records.insert(ROOT_INODE, root);

        Self {
            records,
            next_id: ROOT_INODE + 1,
            capacity,
        }
    }

    /// Rebuild a table from previously exported records.
    pub(crate) fn restore(
        records: Vec<InodeRecord>,
        next_id: InodeId,
        capacity: Option<usize>,
    ) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id, r)).collect(),
            next_id,
            capacity,
        }
    }

    /// Allocate an unlinked inode.
    ///
    /// # Arguments
    /// * `kind` - Object type
    /// * `content` - Content store handle for files, `None` for directories
    ///
    /// # Returns
    /// The new inode ID, with a link count of 0.
    pub fn allocate(&mut self, kind: InodeKind, content: Option<ContentRef>) -> Result<InodeId> {
        if let Some(cap) = self.capacity {
            if self.records.len() >= cap {
                return Err(FsError::NoSpace);
            }
        }
        let id: InodeId = self.next_id;
        self.next_id += 1;
        self.records.insert(id, InodeRecord::new(id, kind, content));
        Ok(id)
    }

    /// Get an inode record.
    pub fn get(&self, id: InodeId) -> Result<&InodeRecord> {
        self.records.get(&id).ok_or_else(|| not_found(id))
    }

    fn get_mut(&mut self, id: InodeId) -> Result<&mut InodeRecord> {
        self.records.get_mut(&id).ok_or_else(|| not_found(id))
    }

    /// Whether an inode exists.
    pub fn contains(&self, id: InodeId) -> bool {
        self.records.contains_key(&id)
    }

    /// Add one link.
    ///
    /// # Returns
    /// The new link count. Fails with `InvalidOperation` when the inode is a
    /// directory that is already linked: directories are never hard-linked.
    pub fn increment_link(&mut self, id: InodeId) -> Result<u32> {
        let record: &mut InodeRecord = self.get_mut(id)?;
        if record.kind == InodeKind::Directory && record.link_count >= 1 {
            return Err(FsError::InvalidOperation(format!(
                "directory inode {} cannot be hard-linked",
                id
            )));
        }
        record.link_count += 1;
        record.ctime = SystemTime::now();
        Ok(record.link_count)
    }

    /// Drop one link, destroying the inode when none remain.
    pub fn decrement_link(&mut self, id: InodeId) -> Result<LinkOutcome> {
        if id == ROOT_INODE {
            return Err(FsError::InvalidOperation("cannot unlink the root".to_string()));
        }
        let record: &mut InodeRecord = self.get_mut(id)?;
        record.link_count = record.link_count.saturating_sub(1);
        record.ctime = SystemTime::now();
        if record.link_count > 0 {
            return Ok(LinkOutcome::Alive(record.link_count));
        }
        let destroyed: InodeRecord = self
            .records
            .remove(&id)
            .ok_or_else(|| not_found(id))?;
        Ok(LinkOutcome::Destroyed(destroyed))
    }

    /// Record a new size after a content change; bumps mtime and ctime.
    pub fn set_size(&mut self, id: InodeId, new_size: u64) -> Result<()> {
        let record: &mut InodeRecord = self.get_mut(id)?;
        let now: SystemTime = SystemTime::now();
        record.size = new_size;
        record.mtime = now;
        record.ctime = now;
        Ok(())
    }

    /// Mark a directory's entry list as modified.
    pub fn touch(&mut self, id: InodeId) -> Result<()> {
        let record: &mut InodeRecord = self.get_mut(id)?;
        let now: SystemTime = SystemTime::now();
        record.mtime = now;
        record.ctime = now;
        Ok(())
    }

    /// Set access and modification times explicitly.
    pub fn set_times(&mut self, id: InodeId, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        let record: &mut InodeRecord = self.get_mut(id)?;
        record.atime = atime;
        record.mtime = mtime;
        record.ctime = SystemTime::now();
        Ok(())
    }

    /// Set the containing directory of a directory inode.
    pub fn set_parent(&mut self, id: InodeId, parent: InodeId) -> Result<()> {
        self.get_mut(id)?.parent = parent;
        Ok(())
    }

    /// Number of live inodes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty (never true once constructed).
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Next ID that will be allocated.
    pub fn next_id(&self) -> InodeId {
        self.next_id
    }

    /// Iterate all live records.
    pub fn records(&self) -> impl Iterator<Item = &InodeRecord> {
        self.records.values()
    }
}

fn not_found(id: InodeId) -> FsError {
    FsError::NotFound(format!("inode {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_has_root() {
        let table: InodeTable = InodeTable::new(None);
        let root: &InodeRecord = table.get(ROOT_INODE).unwrap();
        assert_eq!(root.kind, InodeKind::Directory);
        assert_eq!(root.link_count, 1);
        assert_eq!(root.parent, ROOT_INODE);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_allocate_starts_unlinked() {
        let mut table: InodeTable = InodeTable::new(None);
        let id: InodeId = table
            .allocate(InodeKind::File, Some(ContentRef::new(0)))
            .unwrap();

        assert!(id > ROOT_INODE);
        let record: &InodeRecord = table.get(id).unwrap();
        assert_eq!(record.link_count, 0);
        assert_eq!(record.size, 0);
        assert_eq!(record.content, Some(ContentRef::new(0)));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut table: InodeTable = InodeTable::new(None);
        let first: InodeId = table.allocate(InodeKind::File, None).unwrap();
        table.increment_link(first).unwrap();
        table.decrement_link(first).unwrap();

        let second: InodeId = table.allocate(InodeKind::File, None).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_link_counting_destroys_at_zero() {
        let mut table: InodeTable = InodeTable::new(None);
        let id: InodeId = table.allocate(InodeKind::File, None).unwrap();

        assert_eq!(table.increment_link(id).unwrap(), 1);
        assert_eq!(table.increment_link(id).unwrap(), 2);

        assert!(matches!(table.decrement_link(id).unwrap(), LinkOutcome::Alive(1)));
        match table.decrement_link(id).unwrap() {
            LinkOutcome::Destroyed(record) => assert_eq!(record.id, id),
            other => panic!("expected destroyed, got {:?}", other),
        }
        assert!(!table.contains(id));
        assert!(matches!(table.get(id), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_directory_cannot_be_linked_twice() {
        let mut table: InodeTable = InodeTable::new(None);
        let id: InodeId = table.allocate(InodeKind::Directory, None).unwrap();
        table.increment_link(id).unwrap();

        let result = table.increment_link(id);
        assert!(matches!(result, Err(FsError::InvalidOperation(_))));
        assert_eq!(table.get(id).unwrap().link_count, 1);
    }

    #[test]
    fn test_root_cannot_be_unlinked() {
        let mut table: InodeTable = InodeTable::new(None);
        assert!(matches!(
            table.decrement_link(ROOT_INODE),
            Err(FsError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_unknown_inode() {
        let mut table: InodeTable = InodeTable::new(None);
        assert!(matches!(table.increment_link(99), Err(FsError::NotFound(_))));
        assert!(matches!(table.set_size(99, 1), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_capacity_limit() {
        let mut table: InodeTable = InodeTable::new(Some(2));
        table.allocate(InodeKind::File, None).unwrap();
        assert!(matches!(
            table.allocate(InodeKind::File, None),
            Err(FsError::NoSpace)
        ));
    }

    #[test]
    fn test_set_size() {
        let mut table: InodeTable = InodeTable::new(None);
        let id: InodeId = table.allocate(InodeKind::File, None).unwrap();
        table.set_size(id, 5000).unwrap();
        assert_eq!(table.get(id).unwrap().size, 5000);
    }
}
