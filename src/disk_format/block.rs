use std::mem::size_of;

/// size of a block in bytes
pub const BLOCK_SIZE: usize = 4096;

/// number of blocks on the disk
pub const NUM_BLOCKS: usize = 256;

/// size of the disk image in bytes
pub const DISK_SIZE: usize = NUM_BLOCKS * BLOCK_SIZE;

pub type Block = [u8; BLOCK_SIZE];
const_assert!(size_of::<Block>() == BLOCK_SIZE);
