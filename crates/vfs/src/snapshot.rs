//! Whole-namespace snapshots for persistence across restarts.
//!
//! A snapshot holds every live inode (with file bytes inline) and every
//! directory entry. Hard links survive a round trip: a file named twice is
//! stored once and referenced by two entries.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::content::{ContentRef, ContentStore};
use crate::error::{ContentError, FsError, Result, SnapshotError};
use crate::fs::{content_failure, Namespace};
use crate::inode::{DirectoryTree, InodeId, InodeKind, InodeRecord, InodeTable, ROOT_INODE};
use crate::options::FsOptions;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One inode in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeSnapshot {
    pub id: InodeId,
    pub kind: InodeKind,
    pub link_count: u32,
    pub parent: InodeId,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    /// File bytes. `None` for directories.
    pub data: Option<Vec<u8>>,
}

/// One directory entry in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub parent: InodeId,
    pub name: String,
    pub child: InodeId,
}

/// Serializable image of a whole namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Next inode ID to allocate, so IDs stay unique across restarts.
    pub next_id: InodeId,
    /// Inodes sorted by ID.
    pub inodes: Vec<InodeSnapshot>,
    /// Entries sorted by parent, then name.
    pub entries: Vec<EntrySnapshot>,
}

impl Snapshot {
    /// Capture a namespace.
    pub(crate) fn capture(ns: &Namespace) -> Result<Self> {
        let mut records: Vec<&InodeRecord> = ns.inodes.records().collect();
        records.sort_by_key(|r| r.id);

        let mut inodes: Vec<InodeSnapshot> = Vec::with_capacity(records.len());
        for record in records {
            let data: Option<Vec<u8>> = match record.content {
                Some(content) => Some(
                    ns.store
                        .read(content, 0, record.size)
                        .map_err(content_failure)?,
                ),
                None => None,
            };
            inodes.push(InodeSnapshot {
                id: record.id,
                kind: record.kind,
                link_count: record.link_count,
                parent: record.parent,
                atime: record.atime,
                mtime: record.mtime,
                ctime: record.ctime,
                data,
            });
        }

        let mut dir_ids: Vec<InodeId> = ns.tree.dir_ids().collect();
        dir_ids.sort_unstable();
        let mut entries: Vec<EntrySnapshot> = Vec::new();
        for parent in dir_ids {
            for (name, child) in ns.tree.entries(parent)? {
                entries.push(EntrySnapshot {
                    parent,
                    name,
                    child,
                });
            }
        }

        Ok(Self {
            version: SNAPSHOT_VERSION,
            next_id: ns.inodes.next_id(),
            inodes,
            entries,
        })
    }

    /// Write the snapshot as JSON. The file is replaced atomically.
    pub fn save(&self, path: &Path) -> std::result::Result<(), SnapshotError> {
        let tmp = path.with_extension("tmp");
        {
            let file: File = File::create(&tmp)?;
            let mut writer: BufWriter<File> = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read a snapshot written by [`Snapshot::save`].
    pub fn load(path: &Path) -> std::result::Result<Self, SnapshotError> {
        let file: File = File::open(path)?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(snapshot)
    }

    /// Check the namespace invariants without building anything.
    pub fn validate(&self) -> std::result::Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!("unsupported version {}", self.version)));
        }

        let mut kinds: HashMap<InodeId, &InodeSnapshot> = HashMap::new();
        for inode in &self.inodes {
            if inode.id == 0 || inode.id >= self.next_id {
                return Err(corrupt(format!(
                    "inode {} outside allocated range (next id {})",
                    inode.id, self.next_id
                )));
            }
            if kinds.insert(inode.id, inode).is_some() {
                return Err(corrupt(format!("duplicate inode {}", inode.id)));
            }
            match (inode.kind, &inode.data) {
                (InodeKind::File, None) => {
                    return Err(corrupt(format!("file inode {} has no data", inode.id)))
                }
                (InodeKind::Directory, Some(_)) => {
                    return Err(corrupt(format!("directory inode {} has data", inode.id)))
                }
                _ => {}
            }
        }

        match kinds.get(&ROOT_INODE) {
            Some(root) if root.kind == InodeKind::Directory => {
                if root.parent != ROOT_INODE {
                    return Err(corrupt(format!(
                        "root records parent {} instead of itself",
                        root.parent
                    )));
                }
            }
            _ => return Err(corrupt("missing root directory")),
        }

        let mut names: HashSet<(InodeId, &str)> = HashSet::new();
        let mut refs: HashMap<InodeId, u32> = HashMap::new();
        let mut children: BTreeMap<InodeId, Vec<InodeId>> = BTreeMap::new();
        for entry in &self.entries {
            if !valid_name(&entry.name) {
                return Err(corrupt(format!("invalid entry name {:?}", entry.name)));
            }
            match kinds.get(&entry.parent) {
                Some(parent) if parent.kind == InodeKind::Directory => {}
                _ => {
                    return Err(corrupt(format!(
                        "entry {:?} has no directory parent {}",
                        entry.name, entry.parent
                    )))
                }
            }
            let child: &InodeSnapshot = kinds.get(&entry.child).copied().ok_or_else(|| {
                corrupt(format!(
                    "entry {:?} names missing inode {}",
                    entry.name, entry.child
                ))
            })?;
            if child.kind == InodeKind::Directory && child.parent != entry.parent {
                return Err(corrupt(format!(
                    "directory {} linked from {} but records parent {}",
                    child.id, entry.parent, child.parent
                )));
            }
            if !names.insert((entry.parent, entry.name.as_str())) {
                return Err(corrupt(format!(
                    "duplicate name {:?} in directory {}",
                    entry.name, entry.parent
                )));
            }
            *refs.entry(entry.child).or_default() += 1;
            children.entry(entry.parent).or_default().push(entry.child);
        }

        for inode in &self.inodes {
            let expected: u32 = if inode.id == ROOT_INODE {
                if refs.contains_key(&ROOT_INODE) {
                    return Err(corrupt("root is named by an entry"));
                }
                1
            } else {
                refs.get(&inode.id).copied().unwrap_or(0)
            };
            if inode.link_count != expected || expected == 0 {
                return Err(corrupt(format!(
                    "inode {} has link count {} but {} entries",
                    inode.id, inode.link_count, expected
                )));
            }
            if inode.kind == InodeKind::Directory && expected > 1 {
                return Err(corrupt(format!("directory {} is hard-linked", inode.id)));
            }
        }

        // Every inode must hang off the root.
        let mut seen: HashSet<InodeId> = HashSet::from([ROOT_INODE]);
        let mut queue: VecDeque<InodeId> = VecDeque::from([ROOT_INODE]);
        while let Some(dir) = queue.pop_front() {
            for &child in children.get(&dir).into_iter().flatten() {
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        if seen.len() != self.inodes.len() {
            return Err(corrupt(format!(
                "{} inodes unreachable from the root",
                self.inodes.len() - seen.len()
            )));
        }

        Ok(())
    }

    /// Validate and rebuild a namespace with a fresh content store.
    pub(crate) fn restore(self, options: &FsOptions) -> Result<Namespace> {
        self.validate()?;
        if let Some(cap) = options.max_inodes {
            if self.inodes.len() > cap {
                return Err(FsError::NoSpace);
            }
        }

        let mut store: Box<dyn ContentStore> = options.storage.build();
        let mut tree: DirectoryTree = DirectoryTree::new();
        let mut records: Vec<InodeRecord> = Vec::with_capacity(self.inodes.len());

        for inode in self.inodes {
            let mut record: InodeRecord = InodeRecord::new(inode.id, inode.kind, None);
            if let Some(data) = inode.data {
                if data.len() as u64 > options.max_file_size {
                    return Err(FsError::FileTooLarge(data.len() as u64));
                }
                let content: ContentRef = store.create().map_err(restore_failure)?;
                store.write(content, 0, &data).map_err(restore_failure)?;
                record.size = data.len() as u64;
                record.content = Some(content);
            } else {
                tree.add_dir(inode.id);
            }
            record.link_count = inode.link_count;
            record.parent = inode.parent;
            record.atime = inode.atime;
            record.mtime = inode.mtime;
            record.ctime = inode.ctime;
            records.push(record);
        }

        for entry in &self.entries {
            tree.insert(entry.parent, &entry.name, entry.child)?;
        }

        tracing::info!(
            "restored {} inodes and {} entries",
            records.len(),
            self.entries.len()
        );
        Ok(Namespace {
            inodes: InodeTable::restore(records, self.next_id, options.max_inodes),
            tree,
            store,
        })
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

fn corrupt(msg: impl Into<String>) -> SnapshotError {
    SnapshotError::Corrupt(msg.into())
}

fn restore_failure(err: ContentError) -> FsError {
    match err {
        ContentError::NoSpace => {
            tracing::warn!("snapshot does not fit the configured content store");
            FsError::NoSpace
        }
        ContentError::TooLarge => FsError::FileTooLarge(u64::MAX),
        ContentError::UnknownRef(content) => panic!("fresh content store lost {}", content),
    }
}
