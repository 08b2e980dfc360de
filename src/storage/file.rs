use std::fs::File;
use std::os::unix::prelude::FileExt;

use crate::disk_format::block::{Block, BLOCK_SIZE, NUM_BLOCKS};
use crate::error::{FsError, Result};
use crate::fs::BlockNumber;

use super::Storage;

/// A disk image held in an ordinary file.
pub struct FileBackedStorage(File);

impl FileBackedStorage {
    pub fn new(file: File) -> Self {
        FileBackedStorage(file)
    }
}

impl Storage for FileBackedStorage {
    fn read_block(&self, block_number: BlockNumber) -> Result<Block> {
        if block_number >= NUM_BLOCKS {
            return Err(FsError::Corrupt(format!(
                "block number out of bounds: {block_number}"
            )));
        }

        let mut buf = [0; BLOCK_SIZE];
        let position = block_number * BLOCK_SIZE;

        self.0.read_exact_at(&mut buf, position as u64)?;

        Ok(buf)
    }

    fn write_block(&mut self, block_number: BlockNumber, block: &Block) -> Result<()> {
        if block_number >= NUM_BLOCKS {
            return Err(FsError::Corrupt(format!(
                "block number out of bounds: {block_number}"
            )));
        }

        let position = block_number * BLOCK_SIZE;

        self.0.write_all_at(block, position as u64)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::disk_format::block::DISK_SIZE;

    use super::*;

    fn empty_image() -> FileBackedStorage {
        let file = tempfile::tempfile().unwrap();
        file.set_len(DISK_SIZE as u64).unwrap();

        FileBackedStorage::new(file)
    }

    #[test]
    fn test_write_then_read_block() {
        let mut storage = empty_image();

        let mut block = [0; BLOCK_SIZE];
        block[0] = 0xab;
        block[BLOCK_SIZE - 1] = 0xcd;

        storage.write_block(7, &block).unwrap();

        assert_eq!(storage.read_block(7).unwrap(), block);
        assert_eq!(storage.read_block(6).unwrap(), [0; BLOCK_SIZE]);
    }

    #[test]
    fn test_block_number_out_of_bounds() {
        let storage = empty_image();

        assert!(storage.read_block(NUM_BLOCKS).is_err());
    }
}
