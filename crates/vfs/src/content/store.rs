//! ContentStore trait and the in-memory backend.

use std::collections::HashMap;
use std::fmt;

use crate::error::ContentError;

/// Opaque handle to one file's byte sequence inside a content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentRef(u64);

impl ContentRef {
    /// Wrap a raw backend id.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw backend id.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "content#{}", self.0)
    }
}

/// Trait for types that hold regular-file bytes.
///
/// Implement this trait to back the engine with a different storage medium.
/// The engine serializes all mutating calls, so implementations never see
/// two writers on the same store at once.
pub trait ContentStore: Send + Sync {
    /// Create an empty byte sequence.
    ///
    /// # Returns
    /// Reference owning the new sequence.
    fn create(&mut self) -> Result<ContentRef, ContentError>;

    /// Current length of a sequence in bytes.
    fn len(&self, content: ContentRef) -> Result<u64, ContentError>;

    /// Read up to `length` bytes starting at `offset`.
    ///
    /// # Arguments
    /// * `content` - Sequence to read
    /// * `offset` - Start offset in bytes
    /// * `length` - Maximum number of bytes
    ///
    /// # Returns
    /// Fewer than `length` bytes only at end of content; empty when `offset`
    /// is at or past the end.
    fn read(&self, content: ContentRef, offset: u64, length: u64)
        -> Result<Vec<u8>, ContentError>;

    /// Write `data` at `offset`, overwriting in place and extending as
    /// needed. A gap between the old end and `offset` reads back as zeros.
    ///
    /// # Returns
    /// The sequence length after the write.
    fn write(&mut self, content: ContentRef, offset: u64, data: &[u8])
        -> Result<u64, ContentError>;

    /// Write `data` at the current end of the sequence.
    ///
    /// # Returns
    /// The sequence length after the write.
    fn append(&mut self, content: ContentRef, data: &[u8]) -> Result<u64, ContentError> {
        let end: u64 = self.len(content)?;
        self.write(content, end, data)
    }

    /// Shrink or zero-extend the sequence to `new_size` bytes.
    fn truncate(&mut self, content: ContentRef, new_size: u64) -> Result<(), ContentError>;

    /// Drop the sequence. The reference is invalid afterwards.
    fn release(&mut self, content: ContentRef) -> Result<(), ContentError>;

    /// Total bytes currently held across all sequences.
    fn bytes_stored(&self) -> u64;
}

/// In-memory content store: one growable buffer per file.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    /// Buffers by reference.
    buffers: HashMap<ContentRef, Vec<u8>>,
    /// Next reference to hand out.
    next_ref: u64,
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self, content: ContentRef) -> Result<&Vec<u8>, ContentError> {
        self.buffers
            .get(&content)
            .ok_or(ContentError::UnknownRef(content))
    }

    fn buffer_mut(&mut self, content: ContentRef) -> Result<&mut Vec<u8>, ContentError> {
        self.buffers
            .get_mut(&content)
            .ok_or(ContentError::UnknownRef(content))
    }
}

impl ContentStore for MemoryContentStore {
    fn create(&mut self) -> Result<ContentRef, ContentError> {
        let content: ContentRef = ContentRef::new(self.next_ref);
        self.next_ref += 1;
        self.buffers.insert(content, Vec::new());
        Ok(content)
    }

    fn len(&self, content: ContentRef) -> Result<u64, ContentError> {
        Ok(self.buffer(content)?.len() as u64)
    }

    fn read(
        &self,
        content: ContentRef,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, ContentError> {
        let data: &Vec<u8> = self.buffer(content)?;
        let len: u64 = data.len() as u64;
        if offset >= len {
            return Ok(Vec::new());
        }
        let end: u64 = offset.saturating_add(length).min(len);
        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn write(
        &mut self,
        content: ContentRef,
        offset: u64,
        data: &[u8],
    ) -> Result<u64, ContentError> {
        let buffer: &mut Vec<u8> = self.buffer_mut(content)?;
        if data.is_empty() {
            return Ok(buffer.len() as u64);
        }
        let end: usize = offset
            .checked_add(data.len() as u64)
            .map_or(Err(ContentError::TooLarge), buffer_len)?;
        let start: usize = end - data.len();
        if buffer.len() < end {
            // Zero-fills any gap between the old end and `offset`.
            buffer.resize(end, 0);
        }
        buffer[start..end].copy_from_slice(data);
        Ok(buffer.len() as u64)
    }

    fn truncate(&mut self, content: ContentRef, new_size: u64) -> Result<(), ContentError> {
        let new_size: usize = buffer_len(new_size)?;
        self.buffer_mut(content)?.resize(new_size, 0);
        Ok(())
    }

    fn release(&mut self, content: ContentRef) -> Result<(), ContentError> {
        self.buffers
            .remove(&content)
            .map(|_| ())
            .ok_or(ContentError::UnknownRef(content))
    }

    fn bytes_stored(&self) -> u64 {
        self.buffers.values().map(|b| b.len() as u64).sum()
    }
}

/// Convert a byte length to a `Vec` length, rejecting anything a `Vec`
/// cannot hold.
fn buffer_len(len: u64) -> Result<usize, ContentError> {
    match usize::try_from(len) {
        Ok(len) if len <= isize::MAX as usize => Ok(len),
        _ => Err(ContentError::TooLarge),
    }
}
