//! The filesystem core: inode table, directory entry store, path
//! resolution, and the path-based operations facade.
//!
//! All metadata lives in block 0 (see [`crate::disk_format::layout`]). Every
//! file and directory occupies exactly one data block.

use std::collections::HashSet;

use log::{info, warn};

use crate::bitmap;
use crate::disk_format::{
    block::{Block, BLOCK_SIZE, NUM_BLOCKS},
    directory_entry::{
        DirectoryEntry, EntryName, DIRECTORY_ENTRIES_PER_BLOCK, DIRECTORY_ENTRY_SIZE, DOT,
        FREE_DIRECTORY_ENTRY,
    },
    inode::{Inode, FREE_INODE, INODE_SIZE, MODE_DIRECTORY, MODE_TYPE_MASK, ROOT_MODE},
    layout::{
        BLOCK_BITMAP_OFFSET, BLOCK_BITMAP_SIZE, INODE_BITMAP_OFFSET, INODE_BITMAP_SIZE,
        INODE_TABLE_OFFSET, NUM_INODES, ROOT_INODE,
    },
};
use crate::error::{FsError, Result};
use crate::path;
use crate::storage::Storage;

/// Inode numbers are represented as `i32`s on disk, but we use `u16`s for
/// logical accuracy.
pub type InodeNumber = u16;

/// Block numbers are represented as `i32`s on disk, but we use `usize`s to
/// avoid littering the code with casts.
pub type BlockNumber = usize;

/// The number of the metadata block.
const META_BLOCK: BlockNumber = 0;

pub struct Fs<S: Storage> {
    pub storage: S,
}

impl<S: Storage> Fs<S> {
    pub fn new(storage: S) -> Result<Self> {
        let fs = Fs { storage };

        // check that the first and last blocks are accessible
        let _ = fs.storage.read_block(META_BLOCK)?;
        let _ = fs.storage.read_block(NUM_BLOCKS - 1)?;

        Ok(fs)
    }

    // == the operations facade ==

    /// Creates the root directory with its `"."` entry if the inode bitmap
    /// shows inode 0 unallocated. Idempotent.
    pub fn init(&mut self) -> Result<()> {
        let mut meta = self.storage.read_block(META_BLOCK)?;

        if bitmap::get(inode_bitmap(&meta), ROOT_INODE as usize) {
            return Ok(());
        }

        // the metadata block itself is never handed out
        bitmap::set(block_bitmap_mut(&mut meta), META_BLOCK, true);
        self.storage.write_block(META_BLOCK, &meta)?;

        let inum = self.alloc_inode(ROOT_MODE, 0)?;
        debug_assert_eq!(inum, ROOT_INODE);

        self.dir_put(inum, DOT, inum)?;

        info!("created root directory at inode {inum}");
        Ok(())
    }

    /// Resolves a path to an inode number.
    ///
    /// The root path resolves to inode 0 directly; anything else walks the
    /// directory tree from the root, one lookup per component. There is no
    /// cache and no `..`.
    pub fn lookup(&self, path: &str) -> Result<InodeNumber> {
        let Some(leaf) = path::leaf_name(path) else {
            return Ok(ROOT_INODE);
        };

        let parent_inum = self.parent_inum(path)?;
        self.dir_lookup(parent_inum, leaf)
    }

    /// Resolves the directory that holds a path's leaf. Short-circuits with
    /// the first failed intermediate lookup.
    pub fn parent_inum(&self, path: &str) -> Result<InodeNumber> {
        let components = path::split(path);

        let mut inum = ROOT_INODE;
        for component in components.iter().take(components.len().saturating_sub(1)) {
            inum = self.dir_lookup(inum, component)?;
        }

        Ok(inum)
    }

    /// Creates a file or directory. New directories get their own `"."`
    /// entry.
    pub fn create(&mut self, path: &str, mode: i32) -> Result<InodeNumber> {
        let leaf = path::leaf_name(path).ok_or(FsError::AlreadyExists)?;
        let parent_inum = self.parent_inum(path)?;

        let inum = self.alloc_inode(mode, 0)?;

        if let Err(err) = self.dir_put(parent_inum, leaf, inum) {
            // don't leak the inode when the parent has no room or already
            // holds the name
            self.free_inode(inum)?;
            return Err(err);
        }

        if mode & MODE_TYPE_MASK == MODE_DIRECTORY {
            self.dir_put(inum, DOT, inum)?;
        }

        info!("created {path} as inode {inum} (mode {mode:o})");
        Ok(inum)
    }

    /// Reads up to `buf.len()` bytes at `offset`, clamped to the file's size.
    /// Returns the number of bytes read.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: usize) -> Result<usize> {
        let inum = self.lookup(path)?;
        let inode = self.read_inode(inum)?;

        let end = (inode.size as usize).min(BLOCK_SIZE);
        if offset >= end || buf.is_empty() {
            return Ok(0);
        }
        let end = end.min(offset + buf.len());

        let block = self.storage.read_block(data_block(&inode)?)?;
        let len = end - offset;
        buf[..len].copy_from_slice(&block[offset..end]);

        info!("[inode #{inum}] read {len} bytes at offset {offset}");
        Ok(len)
    }

    /// Writes `data` at `offset`. The range must fit in the single data
    /// block. Returns the number of bytes written.
    pub fn write(&mut self, path: &str, data: &[u8], offset: usize) -> Result<usize> {
        let end = offset + data.len();
        if end > BLOCK_SIZE {
            return Err(FsError::Overflow);
        }

        let inum = self.lookup(path)?;
        let inode = self.read_inode(inum)?;
        if inode.is_directory() {
            return Err(FsError::IsDirectory);
        }

        let block_number = data_block(&inode)?;
        let mut block = self.storage.read_block(block_number)?;
        block[offset..end].copy_from_slice(data);
        self.storage.write_block(block_number, &block)?;

        self.update_inode(inum, |inode| inode.size = inode.size.max(end as i32))?;

        info!("[inode #{inum}] wrote {} bytes at offset {offset}", data.len());
        Ok(data.len())
    }

    /// Sets a file's size. Zeroes any abandoned tail so stale bytes can't
    /// resurface if the file grows again.
    pub fn truncate(&mut self, path: &str, new_size: usize) -> Result<()> {
        if new_size > BLOCK_SIZE {
            return Err(FsError::Overflow);
        }

        let inum = self.lookup(path)?;
        let inode = self.read_inode(inum)?;
        if inode.is_directory() {
            return Err(FsError::IsDirectory);
        }

        let old_size = (inode.size as usize).min(BLOCK_SIZE);
        if new_size < old_size {
            let block_number = data_block(&inode)?;
            let mut block = self.storage.read_block(block_number)?;
            block[new_size..old_size].fill(0);
            self.storage.write_block(block_number, &block)?;
        }

        self.update_inode(inum, |inode| inode.size = new_size as i32)
    }

    /// Removes a path: deletes the parent's entry, then frees the inode and
    /// its data block.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let leaf = path::leaf_name(path).ok_or(FsError::NotFound)?;
        if leaf == DOT {
            return Err(FsError::ReservedName);
        }

        let inum = self.lookup(path)?;
        let parent_inum = self.parent_inum(path)?;

        self.dir_delete(parent_inum, leaf)?;
        self.free_inode(inum)?;

        info!("unlinked {path} (inode {inum})");
        Ok(())
    }

    /// Binds the source inode under the destination leaf name, then removes
    /// the source entry. Fails if the destination name already exists.
    /// Renaming a name onto itself is a no-op.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let from_leaf = path::leaf_name(from).ok_or(FsError::NotFound)?;
        let to_leaf = path::leaf_name(to).ok_or(FsError::AlreadyExists)?;

        // a "." leaf would alias a directory under a second name or tear
        // out its self-reference; refuse before touching anything
        if from_leaf == DOT || to_leaf == DOT {
            return Err(FsError::ReservedName);
        }

        let inum = self.lookup(from)?;
        let from_parent = self.parent_inum(from)?;
        let to_parent = self.parent_inum(to)?;

        if from_parent == to_parent && from_leaf == to_leaf {
            return Ok(());
        }

        self.dir_put(to_parent, to_leaf, inum)?;

        if let Err(err) = self.dir_delete(from_parent, from_leaf) {
            // never leave the inode reachable under both names
            self.dir_delete(to_parent, to_leaf)?;
            return Err(err);
        }

        info!("renamed {from} to {to} (inode {inum})");
        Ok(())
    }

    /// The names in a directory, in storage order. Insertion order is not
    /// preserved across deletes because of compaction.
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        let inum = self.lookup(path)?;
        self.dir_list(inum)
    }

    pub fn num_free_inodes(&self) -> Result<usize> {
        let meta = self.storage.read_block(META_BLOCK)?;
        Ok(bitmap::count_zeros(inode_bitmap(&meta), NUM_INODES))
    }

    pub fn num_free_blocks(&self) -> Result<usize> {
        let meta = self.storage.read_block(META_BLOCK)?;
        Ok(bitmap::count_zeros(block_bitmap(&meta), NUM_BLOCKS))
    }

    // == the inode table ==

    pub fn read_inode(&self, inum: InodeNumber) -> Result<Inode> {
        check_inum(inum)?;

        let meta = self.storage.read_block(META_BLOCK)?;
        let offset = INODE_TABLE_OFFSET + inum as usize * INODE_SIZE;

        Ok(bincode::deserialize(&meta[offset..offset + INODE_SIZE])?)
    }

    pub fn write_inode(&mut self, inum: InodeNumber, inode: Inode) -> Result<()> {
        check_inum(inum)?;

        let encoded = bincode::serialize(&inode)?;

        let mut meta = self.storage.read_block(META_BLOCK)?;
        let offset = INODE_TABLE_OFFSET + inum as usize * INODE_SIZE;
        meta[offset..offset + INODE_SIZE].copy_from_slice(&encoded);

        self.storage.write_block(META_BLOCK, &meta)
    }

    fn update_inode<F>(&mut self, inum: InodeNumber, mut update: F) -> Result<()>
    where
        F: FnMut(&mut Inode),
    {
        let mut inode = self.read_inode(inum)?;
        update(&mut inode);
        self.write_inode(inum, inode)
    }

    pub fn inode_allocated(&self, inum: InodeNumber) -> Result<bool> {
        check_inum(inum)?;

        let meta = self.storage.read_block(META_BLOCK)?;
        Ok(bitmap::get(inode_bitmap(&meta), inum as usize))
    }

    /// Allocates the first free inode slot, binds it to a fresh zero-filled
    /// data block, and initializes the record.
    pub fn alloc_inode(&mut self, mode: i32, size: i32) -> Result<InodeNumber> {
        let meta = self.storage.read_block(META_BLOCK)?;
        let inum =
            bitmap::first_zero(inode_bitmap(&meta), NUM_INODES).ok_or(FsError::NoSpace)?;

        // allocating the block rewrites the metadata block, so re-read it
        // before flipping the inode bit
        let block_number = self.alloc_block()?;

        let mut meta = self.storage.read_block(META_BLOCK)?;
        bitmap::set(inode_bitmap_mut(&mut meta), inum, true);

        let inode = Inode::new(mode, size, block_number as i32);
        let encoded = bincode::serialize(&inode)?;
        let offset = INODE_TABLE_OFFSET + inum * INODE_SIZE;
        meta[offset..offset + INODE_SIZE].copy_from_slice(&encoded);

        self.storage.write_block(META_BLOCK, &meta)?;

        info!("allocated inode {inum} bound to block {block_number}");
        Ok(inum as InodeNumber)
    }

    /// Frees an inode: releases its data block, clears its bitmap bit, and
    /// zeroes the record. There is no caller-side bitmap bookkeeping.
    pub fn free_inode(&mut self, inum: InodeNumber) -> Result<()> {
        let inode = self.read_inode(inum)?;

        if inode.block != 0 {
            self.free_block(inode.block as BlockNumber)?;
        }

        let mut meta = self.storage.read_block(META_BLOCK)?;
        bitmap::set(inode_bitmap_mut(&mut meta), inum as usize, false);

        let encoded = bincode::serialize(&FREE_INODE)?;
        let offset = INODE_TABLE_OFFSET + inum as usize * INODE_SIZE;
        meta[offset..offset + INODE_SIZE].copy_from_slice(&encoded);

        self.storage.write_block(META_BLOCK, &meta)?;

        info!("freed inode {inum}");
        Ok(())
    }

    // == the block store ==

    /// Allocates the first free block and zero-fills it.
    fn alloc_block(&mut self) -> Result<BlockNumber> {
        let mut meta = self.storage.read_block(META_BLOCK)?;
        let block_number =
            bitmap::first_zero(block_bitmap(&meta), NUM_BLOCKS).ok_or(FsError::NoSpace)?;

        bitmap::set(block_bitmap_mut(&mut meta), block_number, true);
        self.storage.write_block(META_BLOCK, &meta)?;

        self.storage.write_block(block_number, &[0; BLOCK_SIZE])?;

        Ok(block_number)
    }

    fn free_block(&mut self, block_number: BlockNumber) -> Result<()> {
        let mut meta = self.storage.read_block(META_BLOCK)?;
        bitmap::set(block_bitmap_mut(&mut meta), block_number, false);

        self.storage.write_block(META_BLOCK, &meta)
    }

    // == the directory entry store ==

    /// Finds `name` in a directory. Scans the full physical entry array;
    /// that's safe because data blocks are zero-filled at allocation.
    pub fn dir_lookup(&self, dir_inum: InodeNumber, name: &str) -> Result<InodeNumber> {
        let entries = self.read_directory_entries(dir_inum)?;

        entries
            .iter()
            .find(|entry| entry.is_in_use() && entry.name.matches(name))
            .map(|entry| entry.inum as InodeNumber)
            .ok_or(FsError::NotFound)
    }

    /// Inserts a name→inode binding into the first free slot. Duplicate
    /// names are rejected; the `"."` slot is never overwritten.
    pub fn dir_put(&mut self, dir_inum: InodeNumber, name: &str, inum: InodeNumber) -> Result<()> {
        let entry_name = EntryName::try_from(name)?;

        let mut entries = self.read_directory_entries(dir_inum)?;

        if entries
            .iter()
            .any(|entry| entry.is_in_use() && entry.name.matches(name))
        {
            return Err(FsError::AlreadyExists);
        }

        let slot = entries
            .iter()
            .position(|entry| !entry.is_in_use())
            .ok_or(FsError::NoSpace)?;

        entries[slot] = DirectoryEntry {
            inum: inum as i32,
            name: entry_name,
        };

        self.write_directory_entries(dir_inum, &entries)?;
        self.update_inode(dir_inum, |dir| dir.size += DIRECTORY_ENTRY_SIZE as i32)
    }

    /// Removes a name→inode binding and compacts the array by shifting all
    /// subsequent entries one slot earlier.
    pub fn dir_delete(&mut self, dir_inum: InodeNumber, name: &str) -> Result<()> {
        if name == DOT {
            return Err(FsError::ReservedName);
        }

        let mut entries = self.read_directory_entries(dir_inum)?;

        let index = entries
            .iter()
            .position(|entry| entry.is_in_use() && entry.name.matches(name))
            .ok_or(FsError::NotFound)?;

        entries.remove(index);
        entries.push(FREE_DIRECTORY_ENTRY);

        self.write_directory_entries(dir_inum, &entries)?;
        self.update_inode(dir_inum, |dir| dir.size -= DIRECTORY_ENTRY_SIZE as i32)
    }

    /// The names of the entries within the directory's logical size, in
    /// storage order.
    pub fn dir_list(&self, dir_inum: InodeNumber) -> Result<Vec<String>> {
        let inode = self.read_inode(dir_inum)?;
        let entries = self.read_directory_entries(dir_inum)?;

        let in_use = (inode.size as usize / DIRECTORY_ENTRY_SIZE).min(entries.len());

        Ok(entries[..in_use]
            .iter()
            .map(|entry| entry.name.to_string())
            .collect())
    }

    fn read_directory_entries(&self, dir_inum: InodeNumber) -> Result<Vec<DirectoryEntry>> {
        let inode = self.read_inode(dir_inum)?;
        if !inode.is_directory() {
            return Err(FsError::NotDirectory);
        }

        let block = self.storage.read_block(data_block(&inode)?)?;

        block
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .map(|chunk| bincode::deserialize::<DirectoryEntry>(chunk).map_err(Into::into))
            .collect()
    }

    fn write_directory_entries(
        &mut self,
        dir_inum: InodeNumber,
        entries: &[DirectoryEntry],
    ) -> Result<()> {
        debug_assert_eq!(entries.len(), DIRECTORY_ENTRIES_PER_BLOCK);

        let inode = self.read_inode(dir_inum)?;

        let mut block: Block = [0; BLOCK_SIZE];
        for (chunk, entry) in block.chunks_exact_mut(DIRECTORY_ENTRY_SIZE).zip(entries) {
            chunk.copy_from_slice(&bincode::serialize(entry)?);
        }

        self.storage.write_block(data_block(&inode)?, &block)
    }

    // == consistency checking ==

    /// Checks the on-disk state for consistency: bitmap/table agreement,
    /// block ownership, directory shape, and `"."` self-references.
    pub fn check(&self) -> Result<()> {
        let meta = self.storage.read_block(META_BLOCK)?;

        if !bitmap::get(block_bitmap(&meta), META_BLOCK) {
            return Err(FsError::Corrupt(
                "metadata block is not marked allocated".into(),
            ));
        }

        if !bitmap::get(inode_bitmap(&meta), ROOT_INODE as usize) {
            return Err(FsError::Corrupt("root inode is not allocated".into()));
        }

        let root = self.read_inode(ROOT_INODE)?;
        if !root.is_directory() {
            return Err(FsError::Corrupt("root inode is not a directory".into()));
        }

        let mut owned_blocks = HashSet::new();

        for inum in 0..NUM_INODES as InodeNumber {
            if !bitmap::get(inode_bitmap(&meta), inum as usize) {
                continue;
            }

            let inode = self.read_inode(inum)?;

            let block_number = data_block(&inode)
                .map_err(|_| FsError::Corrupt(format!("inode {inum} has no data block")))?;

            if block_number >= NUM_BLOCKS {
                return Err(FsError::Corrupt(format!(
                    "inode {inum} is bound to out-of-range block {block_number}"
                )));
            }

            if !bitmap::get(block_bitmap(&meta), block_number) {
                return Err(FsError::Corrupt(format!(
                    "inode {inum}'s block {block_number} is not marked allocated"
                )));
            }

            if !owned_blocks.insert(block_number) {
                return Err(FsError::Corrupt(format!(
                    "block {block_number} is bound to more than one inode"
                )));
            }

            if inode.size < 0 || inode.size as usize > BLOCK_SIZE {
                return Err(FsError::Corrupt(format!(
                    "inode {inum} has invalid size {}",
                    inode.size
                )));
            }

            if inode.is_directory() {
                self.check_directory(inum, &meta)?;
            }
        }

        Ok(())
    }

    fn check_directory(&self, inum: InodeNumber, meta: &Block) -> Result<()> {
        let inode = self.read_inode(inum)?;

        if inode.size as usize % DIRECTORY_ENTRY_SIZE != 0 {
            return Err(FsError::Corrupt(format!(
                "directory {inum} has size {} not a multiple of the entry size",
                inode.size
            )));
        }

        let mut found_dot = false;

        for entry in self.read_directory_entries(inum)? {
            if !entry.is_in_use() {
                continue;
            }

            if entry.name.matches(DOT) {
                if entry.inum as InodeNumber != inum {
                    return Err(FsError::Corrupt(format!(
                        "directory {inum}'s '.' entry points to {}",
                        entry.inum
                    )));
                }

                found_dot = true;
                continue;
            }

            if entry.inum < 0 || entry.inum as usize >= NUM_INODES {
                return Err(FsError::Corrupt(format!(
                    "directory {inum} holds entry with out-of-range inode {}",
                    entry.inum
                )));
            }

            if !bitmap::get(inode_bitmap(meta), entry.inum as usize) {
                warn!(
                    "directory {inum} holds entry {} bound to free inode {}",
                    entry.name, entry.inum
                );
            }
        }

        if !found_dot {
            return Err(FsError::Corrupt(format!(
                "directory {inum} has no '.' entry"
            )));
        }

        Ok(())
    }
}

fn check_inum(inum: InodeNumber) -> Result<()> {
    if (inum as usize) < NUM_INODES {
        Ok(())
    } else {
        Err(FsError::OutOfRange(inum))
    }
}

fn data_block(inode: &Inode) -> Result<BlockNumber> {
    if inode.block <= 0 {
        return Err(FsError::Corrupt("inode has no bound data block".into()));
    }

    Ok(inode.block as BlockNumber)
}

fn block_bitmap(meta: &Block) -> &[u8] {
    &meta[BLOCK_BITMAP_OFFSET..BLOCK_BITMAP_OFFSET + BLOCK_BITMAP_SIZE]
}

fn block_bitmap_mut(meta: &mut Block) -> &mut [u8] {
    &mut meta[BLOCK_BITMAP_OFFSET..BLOCK_BITMAP_OFFSET + BLOCK_BITMAP_SIZE]
}

fn inode_bitmap(meta: &Block) -> &[u8] {
    &meta[INODE_BITMAP_OFFSET..INODE_BITMAP_OFFSET + INODE_BITMAP_SIZE]
}

fn inode_bitmap_mut(meta: &mut Block) -> &mut [u8] {
    &mut meta[INODE_BITMAP_OFFSET..INODE_BITMAP_OFFSET + INODE_BITMAP_SIZE]
}
