//! Fixed-size block backend with a bounded block pool.

use std::collections::HashMap;

use super::store::{ContentRef, ContentStore};
use crate::error::ContentError;

/// Default block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Default number of blocks in the pool.
pub const DEFAULT_MAX_BLOCKS: usize = 16 * 1024;

/// Block list and logical length of one file.
#[derive(Debug, Default)]
struct BlockFile {
    /// Pool indices, in file order.
    blocks: Vec<usize>,
    /// Logical length in bytes.
    len: u64,
}

/// Content store that carves file bytes into fixed-size blocks.
///
/// Blocks come from a pool capped at `max_blocks`; released blocks go on a
/// free list and are reused before the pool grows. Bytes past a file's
/// logical length inside its last block are always zero, so truncate-extend
/// and sparse writes read back zeros without extra bookkeeping.
///
/// A write or extend that needs more blocks than remain fails with
/// [`ContentError::NoSpace`] and leaves the file untouched.
#[derive(Debug)]
pub struct BlockContentStore {
    block_size: usize,
    max_blocks: usize,
    /// Allocated block buffers; grows lazily up to `max_blocks`.
    pool: Vec<Box<[u8]>>,
    /// Indices of pool blocks not owned by any file.
    free: Vec<usize>,
    files: HashMap<ContentRef, BlockFile>,
    next_ref: u64,
}

impl BlockContentStore {
    /// Create a store.
    ///
    /// # Arguments
    /// * `block_size` - Bytes per block (clamped to at least 1)
    /// * `max_blocks` - Maximum number of blocks in the pool
    pub fn new(block_size: usize, max_blocks: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            max_blocks,
            pool: Vec::new(),
            free: Vec::new(),
            files: HashMap::new(),
            next_ref: 0,
        }
    }

    /// Blocks that can still be handed out.
    pub fn free_blocks(&self) -> usize {
        self.free.len() + (self.max_blocks - self.pool.len())
    }

    /// Number of blocks needed to hold `len` bytes.
    fn blocks_for(&self, len: u64) -> Result<usize, ContentError> {
        let bs: u64 = self.block_size as u64;
        usize::try_from(len.div_ceil(bs)).map_err(|_| ContentError::TooLarge)
    }

    fn file(&self, content: ContentRef) -> Result<&BlockFile, ContentError> {
        self.files
            .get(&content)
            .ok_or(ContentError::UnknownRef(content))
    }

    /// Take `count` zeroed blocks from the pool, all or nothing.
    fn allocate(&mut self, count: usize) -> Result<Vec<usize>, ContentError> {
        if count > self.free_blocks() {
            return Err(ContentError::NoSpace);
        }
        let mut taken: Vec<usize> = Vec::with_capacity(count);
        for _ in 0..count {
            let index: usize = match self.free.pop() {
                Some(index) => {
                    self.pool[index].fill(0);
                    index
                }
                None => {
                    self.pool.push(vec![0u8; self.block_size].into_boxed_slice());
                    self.pool.len() - 1
                }
            };
            taken.push(index);
        }
        Ok(taken)
    }

    /// Grow a file's block list so it can hold `len` bytes.
    fn reserve(&mut self, content: ContentRef, len: u64) -> Result<(), ContentError> {
        let have: usize = self.file(content)?.blocks.len();
        let need: usize = self.blocks_for(len)?;
        if need > have {
            let fresh: Vec<usize> = self.allocate(need - have)?;
            if let Some(file) = self.files.get_mut(&content) {
                file.blocks.extend(fresh);
            }
        }
        Ok(())
    }
}

impl Default for BlockContentStore {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE, DEFAULT_MAX_BLOCKS)
    }
}

impl ContentStore for BlockContentStore {
    fn create(&mut self) -> Result<ContentRef, ContentError> {
        let content: ContentRef = ContentRef::new(self.next_ref);
        self.next_ref += 1;
        self.files.insert(content, BlockFile::default());
        Ok(content)
    }

    fn len(&self, content: ContentRef) -> Result<u64, ContentError> {
        Ok(self.file(content)?.len)
    }

    fn read(
        &self,
        content: ContentRef,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, ContentError> {
        let file: &BlockFile = self.file(content)?;
        if offset >= file.len {
            return Ok(Vec::new());
        }
        let end: u64 = offset.saturating_add(length).min(file.len);
        let bs: u64 = self.block_size as u64;

        let mut out: Vec<u8> = Vec::with_capacity((end - offset) as usize);
        let mut pos: u64 = offset;
        while pos < end {
            let block: &[u8] = &self.pool[file.blocks[(pos / bs) as usize]];
            let start: usize = (pos % bs) as usize;
            let take: usize = ((bs - start as u64).min(end - pos)) as usize;
            out.extend_from_slice(&block[start..start + take]);
            pos += take as u64;
        }
        Ok(out)
    }

    fn write(
        &mut self,
        content: ContentRef,
        offset: u64,
        data: &[u8],
    ) -> Result<u64, ContentError> {
        if data.is_empty() {
            return self.len(content);
        }
        let end: u64 = offset
            .checked_add(data.len() as u64)
            .ok_or(ContentError::TooLarge)?;
        self.reserve(content, end)?;

        let bs: u64 = self.block_size as u64;
        let file: &mut BlockFile = self
            .files
            .get_mut(&content)
            .ok_or(ContentError::UnknownRef(content))?;

        let mut pos: u64 = offset;
        let mut src: &[u8] = data;
        while !src.is_empty() {
            let block: &mut [u8] = &mut self.pool[file.blocks[(pos / bs) as usize]];
            let start: usize = (pos % bs) as usize;
            let take: usize = (block.len() - start).min(src.len());
            block[start..start + take].copy_from_slice(&src[..take]);
            src = &src[take..];
            pos += take as u64;
        }

        file.len = file.len.max(end);
        Ok(file.len)
    }

    fn truncate(&mut self, content: ContentRef, new_size: u64) -> Result<(), ContentError> {
        let old_len: u64 = self.file(content)?.len;
        if new_size > old_len {
            self.reserve(content, new_size)?;
        }

        let keep: usize = self.blocks_for(new_size)?;
        let bs: u64 = self.block_size as u64;
        let file: &mut BlockFile = self
            .files
            .get_mut(&content)
            .ok_or(ContentError::UnknownRef(content))?;

        if new_size < old_len {
            self.free.extend(file.blocks.drain(keep..));
            let tail: usize = (new_size % bs) as usize;
            if tail != 0 {
                if let Some(&last) = file.blocks.last() {
                    self.pool[last][tail..].fill(0);
                }
            }
        }
        file.len = new_size;
        Ok(())
    }

    fn release(&mut self, content: ContentRef) -> Result<(), ContentError> {
        let file: BlockFile = self
            .files
            .remove(&content)
            .ok_or(ContentError::UnknownRef(content))?;
        self.free.extend(file.blocks);
        Ok(())
    }

    fn bytes_stored(&self) -> u64 {
        self.files.values().map(|f| f.len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_spanning_blocks() {
        let mut store: BlockContentStore = BlockContentStore::new(4, 16);
        let content: ContentRef = store.create().unwrap();

        let data: Vec<u8> = (0u8..10).collect();
        assert_eq!(store.write(content, 0, &data).unwrap(), 10);
        assert_eq!(store.free_blocks(), 13);
        assert_eq!(store.read(content, 0, 100).unwrap(), data);
        assert_eq!(store.read(content, 3, 4).unwrap(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_large_payload() {
        let mut store: BlockContentStore = BlockContentStore::default();
        let content: ContentRef = store.create().unwrap();
        let payload: Vec<u8> = vec![b'A'; 5000];

        store.write(content, 0, &payload).unwrap();
        assert_eq!(store.len(content).unwrap(), 5000);
        assert_eq!(store.read(content, 0, 8192).unwrap(), payload);
    }

    #[test]
    fn test_sparse_write_reads_zeros() {
        let mut store: BlockContentStore = BlockContentStore::new(4, 16);
        let content: ContentRef = store.create().unwrap();
        store.write(content, 0, b"ab").unwrap();
        store.write(content, 9, b"z").unwrap();
        assert_eq!(
            store.read(content, 0, 100).unwrap(),
            b"ab\0\0\0\0\0\0\0z".to_vec()
        );
    }

    #[test]
    fn test_truncate_shrink_then_extend_reads_zeros() {
        let mut store: BlockContentStore = BlockContentStore::new(4, 16);
        let content: ContentRef = store.create().unwrap();
        store.write(content, 0, b"abcdefghij").unwrap();

        store.truncate(content, 5).unwrap();
        assert_eq!(store.free_blocks(), 14);
        assert_eq!(store.read(content, 0, 100).unwrap(), b"abcde");

        store.truncate(content, 10).unwrap();
        assert_eq!(store.read(content, 0, 100).unwrap(), b"abcde\0\0\0\0\0");
    }

    #[test]
    fn test_no_space_leaves_file_untouched() {
        let mut store: BlockContentStore = BlockContentStore::new(4, 2);
        let content: ContentRef = store.create().unwrap();
        store.write(content, 0, b"abc").unwrap();

        let result = store.write(content, 3, b"0123456789");
        assert_eq!(result, Err(ContentError::NoSpace));
        assert_eq!(store.read(content, 0, 100).unwrap(), b"abc");
        assert_eq!(store.free_blocks(), 1);
    }

    #[test]
    fn test_write_past_u64_range_rejected() {
        let mut store: BlockContentStore = BlockContentStore::new(4, 2);
        let content: ContentRef = store.create().unwrap();
        store.write(content, 0, b"abc").unwrap();

        let result = store.write(content, u64::MAX - 1, b"xyz");
        assert_eq!(result, Err(ContentError::TooLarge));
        assert_eq!(store.truncate(content, u64::MAX), Err(ContentError::NoSpace));
        assert_eq!(store.read(content, 0, 100).unwrap(), b"abc");
        assert_eq!(store.free_blocks(), 1);
    }

    #[test]
    fn test_release_recycles_blocks() {
        let mut store: BlockContentStore = BlockContentStore::new(4, 2);
        let first: ContentRef = store.create().unwrap();
        store.write(first, 0, b"12345678").unwrap();
        assert_eq!(store.free_blocks(), 0);

        store.release(first).unwrap();
        assert_eq!(store.free_blocks(), 2);

        let second: ContentRef = store.create().unwrap();
        store.truncate(second, 6).unwrap();
        assert_eq!(store.read(second, 0, 100).unwrap(), vec![0u8; 6]);
    }
}
