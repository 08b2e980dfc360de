use crate::disk_format::block::{Block, BLOCK_SIZE, NUM_BLOCKS};
use crate::error::{FsError, Result};
use crate::fs::BlockNumber;

use super::Storage;

/// An all-zero disk image held in memory. Used by tests and for formatting
/// fresh images.
pub struct MemoryStorage(Vec<Block>);

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage(vec![[0; BLOCK_SIZE]; NUM_BLOCKS])
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn read_block(&self, block_number: BlockNumber) -> Result<Block> {
        self.0
            .get(block_number)
            .copied()
            .ok_or_else(|| FsError::Corrupt(format!("block number out of bounds: {block_number}")))
    }

    fn write_block(&mut self, block_number: BlockNumber, block: &Block) -> Result<()> {
        let slot = self.0.get_mut(block_number).ok_or_else(|| {
            FsError::Corrupt(format!("block number out of bounds: {block_number}"))
        })?;

        slot.copy_from_slice(block);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_zeroed() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.read_block(0).unwrap(), [0; BLOCK_SIZE]);
        assert_eq!(storage.read_block(NUM_BLOCKS - 1).unwrap(), [0; BLOCK_SIZE]);
    }

    #[test]
    fn test_block_number_out_of_bounds() {
        let storage = MemoryStorage::new();

        assert!(storage.read_block(NUM_BLOCKS).is_err());
    }
}
