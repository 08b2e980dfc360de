use std::mem::size_of;

use serde::{Deserialize, Serialize};

/// The number of bytes occupied by an inode record.
pub const INODE_SIZE: usize = 16;
const_assert!(size_of::<Inode>() == INODE_SIZE);

/// Mask selecting the file-type bits of a mode.
pub const MODE_TYPE_MASK: i32 = 0o170000;
/// Type bits marking a directory.
pub const MODE_DIRECTORY: i32 = 0o040000;
/// Type bits marking a regular file.
pub const MODE_REGULAR: i32 = 0o100000;

/// The mode the root directory is created with.
pub const ROOT_MODE: i32 = MODE_DIRECTORY | 0o755;

/// A free inode record.
pub const FREE_INODE: Inode = Inode {
    refs: 0,
    mode: 0,
    size: 0,
    block: 0,
};

/// An inode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct Inode {
    /// reference count
    pub refs: i32,
    /// permission and type bits
    pub mode: i32,
    /// file size in bytes
    pub size: i32,
    /// single data block number (0 = unbound)
    pub block: i32,
}

impl Inode {
    /// Constructs a freshly allocated inode bound to `block`.
    pub fn new(mode: i32, size: i32, block: i32) -> Inode {
        Inode {
            refs: 1,
            mode,
            size,
            block,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.mode & MODE_TYPE_MASK == MODE_DIRECTORY
    }

    pub fn is_regular(&self) -> bool {
        self.mode & MODE_TYPE_MASK == MODE_REGULAR
    }
}
