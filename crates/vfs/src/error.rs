//! Error types for the filesystem engine.

use thiserror::Error;

use crate::content::ContentRef;
use crate::handle::HandleId;

/// Result alias used by every namespace and handle operation.
pub type Result<T> = std::result::Result<T, FsError>;

/// Errors reported to callers of the engine.
///
/// Every precondition violation surfaces as one of these values. Internal
/// corruption (a directory entry naming a missing inode, an unknown content
/// reference) is not represented here: the engine panics instead.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path or inode does not exist.
    #[error("No such file or directory: {0}")]
    NotFound(String),

    /// Name is already taken in the parent directory.
    #[error("File exists: {0}")]
    AlreadyExists(String),

    /// A directory was required.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// A regular file was required.
    #[error("Is a directory: {0}")]
    IsADirectory(String),

    /// Directory still has entries.
    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    /// Handle is closed, unknown, or its inode is gone.
    #[error("Bad file handle: {0}")]
    BadHandle(HandleId),

    /// Operation is not allowed on this target.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A path component exceeds the configured name limit.
    #[error("File name too long: {0}")]
    NameTooLong(String),

    /// Inode or block capacity is exhausted.
    #[error("No space left on filesystem")]
    NoSpace,

    /// A write or truncate would grow a file past the size limit.
    #[error("File too large: {0} bytes")]
    FileTooLarge(u64),

    /// Snapshot could not be written or restored.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl FsError {
    /// POSIX errno for this error, for adapters that speak the kernel's
    /// error domain.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::AlreadyExists(_) => libc::EEXIST,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::IsADirectory(_) => libc::EISDIR,
            FsError::NotEmpty(_) => libc::ENOTEMPTY,
            FsError::BadHandle(_) => libc::EBADF,
            FsError::InvalidOperation(_) => libc::EINVAL,
            FsError::NameTooLong(_) => libc::ENAMETOOLONG,
            FsError::NoSpace => libc::ENOSPC,
            FsError::FileTooLarge(_) => libc::EFBIG,
            FsError::Snapshot(_) => libc::EIO,
        }
    }
}

/// Errors from content store backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// Reference was never created or was already released.
    #[error("Unknown content reference: {0}")]
    UnknownRef(ContentRef),

    /// Backend has no room for the requested bytes.
    #[error("Content store full")]
    NoSpace,

    /// Requested length cannot be represented by the backend.
    #[error("Content length out of range")]
    TooLarge,
}

/// Errors from snapshot export and import.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot violates a namespace invariant.
    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
}
