use std::io;

use libc::{c_int, EEXIST, EFBIG, EINVAL, EIO, EISDIR, ENAMETOOLONG, ENOENT, ENOSPC, ENOTDIR};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

/// Every failure is terminal for the call that produced it; nothing in the
/// core retries.
#[derive(Debug, Error)]
pub enum FsError {
    /// A path component, directory entry, or inode was absent.
    #[error("not found")]
    NotFound,

    /// The inode table, a directory's entry array, or the block store is
    /// exhausted.
    #[error("no space left")]
    NoSpace,

    /// An inode number outside the inode table was used.
    #[error("inode number out of range: {0}")]
    OutOfRange(u16),

    /// A read or write range extends past the single data block.
    #[error("offset and length exceed one block")]
    Overflow,

    /// A directory already holds an entry with the requested name.
    #[error("entry already exists")]
    AlreadyExists,

    /// A file inode was used where a directory was required.
    #[error("not a directory")]
    NotDirectory,

    /// A directory inode was used where a file was required.
    #[error("is a directory")]
    IsDirectory,

    /// An entry name longer than the fixed name field.
    #[error("name too long")]
    NameTooLong,

    /// An operation named the permanent `"."` self-reference.
    #[error("name is reserved")]
    ReservedName,

    /// The on-disk state contradicts itself.
    #[error("corrupt filesystem: {0}")]
    Corrupt(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl FsError {
    /// The errno surfaced to the filesystem-call dispatcher.
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound => ENOENT,
            FsError::NoSpace => ENOSPC,
            FsError::OutOfRange(_) => EINVAL,
            FsError::Overflow => EFBIG,
            FsError::AlreadyExists => EEXIST,
            FsError::NotDirectory => ENOTDIR,
            FsError::IsDirectory => EISDIR,
            FsError::NameTooLong => ENAMETOOLONG,
            FsError::ReservedName => EINVAL,
            FsError::Corrupt(_) | FsError::Io(_) | FsError::Codec(_) => EIO,
        }
    }
}
