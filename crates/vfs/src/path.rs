//! Path resolution over the directory tree.
//!
//! Paths are slash-separated and always walked from the root; a leading `/`
//! is optional. Empty segments and `.` are skipped, `..` moves to the
//! containing directory (the root is its own parent). Missing intermediate
//! directories are never created.

use crate::error::{FsError, Result};
use crate::inode::{DirectoryTree, InodeId, InodeRecord, InodeTable, ROOT_INODE};

/// Walks paths through a borrowed view of the namespace.
pub struct PathResolver<'a> {
    inodes: &'a InodeTable,
    tree: &'a DirectoryTree,
    max_name_len: usize,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver.
    ///
    /// # Arguments
    /// * `inodes` - Inode table
    /// * `tree` - Directory tree
    /// * `max_name_len` - Longest name accepted for a new entry
    pub fn new(inodes: &'a InodeTable, tree: &'a DirectoryTree, max_name_len: usize) -> Self {
        Self {
            inodes,
            tree,
            max_name_len,
        }
    }

    /// Record for an inode reached through the tree. A miss means an entry
    /// points at a destroyed inode, which is unrecoverable.
    fn record(&self, id: InodeId) -> &'a InodeRecord {
        match self.inodes.get(id) {
            Ok(record) => record,
            Err(_) => panic!("directory entry points at missing inode {}", id),
        }
    }

    /// Resolve a path to the inode it names.
    ///
    /// # Returns
    /// `NotFound` if any segment is missing, `NotADirectory` if a segment
    /// other than the last names a regular file.
    pub fn resolve(&self, path: &str) -> Result<InodeId> {
        let mut current: InodeId = ROOT_INODE;
        let mut walked: String = String::new();

        for segment in path.split('/') {
            if segment.is_empty() {
                continue;
            }
            // `.` and `..` are directory entries, so they too need a directory.
            if !self.record(current).is_dir() {
                return Err(FsError::NotADirectory(display(&walked)));
            }
            match segment {
                "." => continue,
                ".." => {
                    current = self.record(current).parent;
                }
                name => {
                    walked.push('/');
                    walked.push_str(name);
                    current = self
                        .tree
                        .lookup(current, name)
                        .map_err(|_| FsError::NotFound(walked.clone()))?;
                }
            }
        }

        Ok(current)
    }

    /// Resolve everything but the final segment.
    ///
    /// # Returns
    /// The parent directory's inode ID and the final name. Fails with
    /// `InvalidOperation` when the path has no final name (the root, `.` or
    /// `..`), `NameTooLong` when the name exceeds the limit, and
    /// `NotADirectory` when the parent is a regular file.
    pub fn resolve_parent<'p>(&self, path: &'p str) -> Result<(InodeId, &'p str)> {
        let trimmed: &str = path.trim_end_matches('/');
        let (parent_path, name): (&str, &str) = match trimmed.rfind('/') {
            Some(pos) => (&trimmed[..pos], &trimmed[pos + 1..]),
            None => ("", trimmed),
        };

        if name.is_empty() || name == "." || name == ".." {
            return Err(FsError::InvalidOperation(format!(
                "path has no final component: {}",
                path
            )));
        }
        if name.len() > self.max_name_len {
            return Err(FsError::NameTooLong(name.to_string()));
        }

        let parent: InodeId = self.resolve(parent_path)?;
        if !self.record(parent).is_dir() {
            return Err(FsError::NotADirectory(display(parent_path)));
        }
        Ok((parent, name))
    }
}

fn display(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::InodeKind;

    /// Build `/a/b` (directories) and `/a/f` (file).
    fn sample() -> (InodeTable, DirectoryTree, InodeId, InodeId, InodeId) {
        let mut inodes: InodeTable = InodeTable::new(None);
        let mut tree: DirectoryTree = DirectoryTree::new();

        let a: InodeId = inodes.allocate(InodeKind::Directory, None).unwrap();
        inodes.increment_link(a).unwrap();
        tree.add_dir(a);
        tree.insert(ROOT_INODE, "a", a).unwrap();

        let b: InodeId = inodes.allocate(InodeKind::Directory, None).unwrap();
        inodes.increment_link(b).unwrap();
        inodes.set_parent(b, a).unwrap();
        tree.add_dir(b);
        tree.insert(a, "b", b).unwrap();

        let f: InodeId = inodes.allocate(InodeKind::File, None).unwrap();
        inodes.increment_link(f).unwrap();
        tree.insert(a, "f", f).unwrap();

        (inodes, tree, a, b, f)
    }

    #[test]
    fn test_resolve_root() {
        let (inodes, tree, ..) = sample();
        let resolver: PathResolver<'_> = PathResolver::new(&inodes, &tree, 255);
        assert_eq!(resolver.resolve("/").unwrap(), ROOT_INODE);
        assert_eq!(resolver.resolve("").unwrap(), ROOT_INODE);
    }

    #[test]
    fn test_resolve_nested() {
        let (inodes, tree, a, b, f) = sample();
        let resolver: PathResolver<'_> = PathResolver::new(&inodes, &tree, 255);
        assert_eq!(resolver.resolve("/a").unwrap(), a);
        assert_eq!(resolver.resolve("a/b").unwrap(), b);
        assert_eq!(resolver.resolve("/a//b/").unwrap(), b);
        assert_eq!(resolver.resolve("/a/./f").unwrap(), f);
        assert_eq!(resolver.resolve("/a/b/../f").unwrap(), f);
        assert_eq!(resolver.resolve("/..").unwrap(), ROOT_INODE);
    }

    #[test]
    fn test_resolve_missing() {
        let (inodes, tree, ..) = sample();
        let resolver: PathResolver<'_> = PathResolver::new(&inodes, &tree, 255);
        match resolver.resolve("/a/missing/x") {
            Err(FsError::NotFound(path)) => assert_eq!(path, "/a/missing"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_through_file() {
        let (inodes, tree, ..) = sample();
        let resolver: PathResolver<'_> = PathResolver::new(&inodes, &tree, 255);
        assert!(matches!(
            resolver.resolve("/a/f/x"),
            Err(FsError::NotADirectory(_))
        ));
        assert!(matches!(
            resolver.resolve("/a/f/.."),
            Err(FsError::NotADirectory(_))
        ));
        assert!(matches!(
            resolver.resolve("/a/f/."),
            Err(FsError::NotADirectory(_))
        ));
        assert!(matches!(
            resolver.resolve("/a/f/../b"),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_resolve_parent() {
        let (inodes, tree, a, b, _) = sample();
        let resolver: PathResolver<'_> = PathResolver::new(&inodes, &tree, 255);
        assert_eq!(resolver.resolve_parent("/new").unwrap(), (ROOT_INODE, "new"));
        assert_eq!(resolver.resolve_parent("/a/new").unwrap(), (a, "new"));
        assert_eq!(resolver.resolve_parent("a/b/new/").unwrap(), (b, "new"));
    }

    #[test]
    fn test_resolve_parent_rejects_bad_names() {
        let (inodes, tree, ..) = sample();
        let resolver: PathResolver<'_> = PathResolver::new(&inodes, &tree, 4);
        assert!(matches!(
            resolver.resolve_parent("/"),
            Err(FsError::InvalidOperation(_))
        ));
        assert!(matches!(
            resolver.resolve_parent("/a/.."),
            Err(FsError::InvalidOperation(_))
        ));
        assert!(matches!(
            resolver.resolve_parent("/toolong"),
            Err(FsError::NameTooLong(_))
        ));
        assert!(matches!(
            resolver.resolve_parent("/a/f/x"),
            Err(FsError::NotADirectory(_))
        ));
        assert!(matches!(
            resolver.resolve_parent("/nope/x"),
            Err(FsError::NotFound(_))
        ));
    }
}
