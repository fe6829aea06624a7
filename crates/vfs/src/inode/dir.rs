//! Directory tree: the hierarchical namespace.

use std::collections::{BTreeMap, HashMap};

use super::types::{InodeId, ROOT_INODE};
use crate::error::{FsError, Result};

/// Maps `(parent, name)` to child inode IDs.
///
/// Each directory inode owns one entry table. Inserting or removing entries
/// never touches link counts; callers pair these calls with the inode table.
#[derive(Debug)]
pub struct DirectoryTree {
    /// Entry tables by directory inode ID: name → child inode ID.
    dirs: HashMap<InodeId, BTreeMap<String, InodeId>>,
}

impl DirectoryTree {
    /// Create a tree holding only the empty root directory.
    pub fn new() -> Self {
        let mut dirs: HashMap<InodeId, BTreeMap<String, InodeId>> = HashMap::new();
        dirs.insert(ROOT_INODE, BTreeMap::new());
        Self { dirs }
    }

    /// Register an empty entry table for a new directory inode.
    pub fn add_dir(&mut self, id: InodeId) {
        self.dirs.entry(id).or_default();
    }

    /// Drop the entry table of a removed directory.
    ///
    /// # Returns
    /// `NotEmpty` if the directory still has entries.
    pub fn remove_dir(&mut self, id: InodeId) -> Result<()> {
        match self.dirs.get(&id) {
            Some(entries) if !entries.is_empty() => {
                Err(FsError::NotEmpty(format!("inode {}", id)))
            }
            Some(_) => {
                self.dirs.remove(&id);
                Ok(())
            }
            None => Err(not_a_directory(id)),
        }
    }

    fn entries_of(&self, parent: InodeId) -> Result<&BTreeMap<String, InodeId>> {
        self.dirs.get(&parent).ok_or_else(|| not_a_directory(parent))
    }

    fn entries_of_mut(&mut self, parent: InodeId) -> Result<&mut BTreeMap<String, InodeId>> {
        self.dirs.get_mut(&parent).ok_or_else(|| not_a_directory(parent))
    }

    /// Look up a child by name.
    pub fn lookup(&self, parent: InodeId, name: &str) -> Result<InodeId> {
        self.entries_of(parent)?
            .get(name)
            .copied()
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    /// Add an entry.
    ///
    /// # Returns
    /// `AlreadyExists` if `name` is taken in `parent`.
    pub fn insert(&mut self, parent: InodeId, name: &str, child: InodeId) -> Result<()> {
        let entries: &mut BTreeMap<String, InodeId> = self.entries_of_mut(parent)?;
        if entries.contains_key(name) {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        entries.insert(name.to_string(), child);
        Ok(())
    }

    /// Remove an entry.
    ///
    /// # Returns
    /// The inode ID the entry named.
    pub fn remove(&mut self, parent: InodeId, name: &str) -> Result<InodeId> {
        self.entries_of_mut(parent)?
            .remove(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    /// Names in a directory, sorted.
    pub fn list(&self, parent: InodeId) -> Result<Vec<String>> {
        Ok(self.entries_of(parent)?.keys().cloned().collect())
    }

    /// `(name, child)` pairs in a directory, sorted by name.
    pub fn entries(&self, parent: InodeId) -> Result<Vec<(String, InodeId)>> {
        Ok(self
            .entries_of(parent)?
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect())
    }

    /// Whether a directory has no entries.
    pub fn is_empty(&self, parent: InodeId) -> Result<bool> {
        Ok(self.entries_of(parent)?.is_empty())
    }

    /// All directory inode IDs with an entry table.
    pub fn dir_ids(&self) -> impl Iterator<Item = InodeId> + '_ {
        self.dirs.keys().copied()
    }
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

fn not_a_directory(id: InodeId) -> FsError {
    FsError::NotADirectory(format!("inode {}", id))
}
