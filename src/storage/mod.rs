/// File-backed storage.
mod file;
/// Memory-backed storage.
mod memory;

pub use file::*;
pub use memory::*;

use crate::disk_format::block::Block;
use crate::error::Result;
use crate::fs::BlockNumber;

/// Raw block access by index. Allocation policy lives above this trait; a
/// storage only moves whole blocks.
pub trait Storage {
    fn read_block(&self, block_number: BlockNumber) -> Result<Block>;

    fn write_block(&mut self, block_number: BlockNumber, block: &Block) -> Result<()>;
}
