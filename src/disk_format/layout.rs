//! Byte layout of the metadata block (block 0).
//!
//! Block 0 holds, in order: the block-allocation bitmap, the
//! inode-allocation bitmap, and the packed inode table. Every other block
//! is either a directory's entry array or a file's raw payload.

use crate::fs::InodeNumber;

use super::{
    block::{BLOCK_SIZE, NUM_BLOCKS},
    inode::INODE_SIZE,
};

/// The number of inode slots in the inode table.
pub const NUM_INODES: usize = 64;

/// The inode number of the root directory.
pub const ROOT_INODE: InodeNumber = 0;

/// Byte offset of the block-allocation bitmap inside block 0.
pub const BLOCK_BITMAP_OFFSET: usize = 0;

const_assert!(NUM_BLOCKS % 8 == 0);
/// The number of bytes occupied by the block-allocation bitmap.
pub const BLOCK_BITMAP_SIZE: usize = NUM_BLOCKS / 8;

/// Byte offset of the inode-allocation bitmap inside block 0.
pub const INODE_BITMAP_OFFSET: usize = BLOCK_BITMAP_OFFSET + BLOCK_BITMAP_SIZE;

const_assert!(NUM_INODES % 8 == 0);
/// The number of bytes occupied by the inode-allocation bitmap.
pub const INODE_BITMAP_SIZE: usize = NUM_INODES / 8;

/// Byte offset of the inode table inside block 0. The gap after the inode
/// bitmap is reserved.
pub const INODE_TABLE_OFFSET: usize = 64;

const_assert!(INODE_BITMAP_OFFSET + INODE_BITMAP_SIZE <= INODE_TABLE_OFFSET);
const_assert!(INODE_TABLE_OFFSET + NUM_INODES * INODE_SIZE <= BLOCK_SIZE);
