//! FUSE dispatch into the path-based operations facade.
//!
//! `fuser` addresses everything by inode number, while the facade is
//! path-addressed. The adapter keeps an ino → path table: the root is seeded
//! at mount and every `lookup`/`create`/`mkdir` records the path it resolved,
//! so later reads and writes can be dispatched by path.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, FUSE_ROOT_ID,
};
use libc::{EINVAL, ENOENT};
use log::warn;

use crate::disk_format::{
    block::{BLOCK_SIZE, NUM_BLOCKS},
    directory_entry::{DOT, MAX_NAME_LEN},
    inode::{MODE_DIRECTORY, MODE_REGULAR},
    layout::NUM_INODES,
};
use crate::error::{FsError, Result};
use crate::fs::{Fs, InodeNumber};
use crate::storage::Storage;

pub struct MonoFuse<S: Storage> {
    fs: Fs<S>,
    /// Maps FUSE inos to the path they were resolved through.
    paths: HashMap<u64, String>,
    first_free_handle: u64,
}

impl<S: Storage> MonoFuse<S> {
    const TTL: Duration = Duration::new(1, 0);
    const GENERATION: u64 = 1;

    pub fn new(mut fs: Fs<S>) -> Result<MonoFuse<S>> {
        fs.init()?;

        Ok(MonoFuse {
            fs,
            paths: HashMap::from([(FUSE_ROOT_ID, "/".to_string())]),
            first_free_handle: 0,
        })
    }

    // FUSE reserves ino 0 and roots the tree at ino 1; our root inode is 0
    fn ino(inum: InodeNumber) -> u64 {
        inum as u64 + 1
    }

    /// The inode number behind a kernel ino. `None` for inos that can't
    /// name an inode, such as stale ones beyond the table's range.
    fn inum_of(ino: u64) -> Option<InodeNumber> {
        ino.checked_sub(1)?.try_into().ok()
    }

    fn path_of(&self, ino: u64) -> Option<&String> {
        self.paths.get(&ino)
    }

    fn child_path(&self, parent_ino: u64, name: &OsStr) -> Option<String> {
        let parent = self.path_of(parent_ino)?;
        let name = name.to_str()?;

        Some(if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        })
    }

    /// Builds attributes for an allocated inode. `None` for a free one.
    fn attributes(&self, inum: InodeNumber) -> Result<Option<FileAttr>> {
        if !self.fs.inode_allocated(inum)? {
            return Ok(None);
        }

        let inode = self.fs.read_inode(inum)?;

        Ok(Some(FileAttr {
            ino: Self::ino(inum),
            size: inode.size as u64,
            blocks: 1,
            atime: SystemTime::UNIX_EPOCH,
            mtime: SystemTime::UNIX_EPOCH,
            ctime: SystemTime::UNIX_EPOCH,
            crtime: SystemTime::UNIX_EPOCH,
            kind: if inode.is_directory() {
                FileType::Directory
            } else {
                FileType::RegularFile
            },
            perm: (inode.mode & 0o7777) as u16,
            nlink: inode.refs as u32,
            uid: 0,
            gid: 0,
            rdev: 0,
            flags: 0,
            blksize: BLOCK_SIZE as u32,
        }))
    }

    fn assign_file_handle(&mut self) -> u64 {
        let assigned = self.first_free_handle;
        self.first_free_handle += 1;

        assigned
    }

    /// Records the path a fresh leaf resolved through and returns its attrs.
    fn register(&mut self, path: String) -> Result<Option<FileAttr>> {
        let inum = self.fs.lookup(&path)?;
        let attr = self.attributes(inum)?;

        self.paths.insert(Self::ino(inum), path);

        Ok(attr)
    }

    /// Rewrites table entries under a renamed path.
    fn move_paths(&mut self, from: &str, to: &str) {
        let from_prefix = format!("{from}/");

        for path in self.paths.values_mut() {
            if path == from {
                *path = to.to_string();
            } else if let Some(rest) = path.strip_prefix(&from_prefix) {
                *path = format!("{to}/{rest}");
            }
        }
    }
}

impl<S: Storage> Filesystem for MonoFuse<S> {
    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let num_free_blocks = self.fs.num_free_blocks().unwrap_or(0);
        let num_free_inodes = self.fs.num_free_inodes().unwrap_or(0);

        reply.statfs(
            NUM_BLOCKS as u64,
            num_free_blocks as u64,
            num_free_blocks as u64,
            NUM_INODES as u64,
            num_free_inodes as u64,
            BLOCK_SIZE as u32,
            MAX_NAME_LEN as u32,
            BLOCK_SIZE as u32,
        );
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(EINVAL);
            return;
        };

        match self.register(path) {
            Ok(Some(attr)) => reply.entry(&Self::TTL, &attr, Self::GENERATION),
            Ok(None) => reply.error(ENOENT),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        let Some(inum) = Self::inum_of(ino) else {
            reply.error(ENOENT);
            return;
        };

        match self.attributes(inum) {
            Ok(Some(attr)) => reply.attr(&Self::TTL, &attr),
            Ok(None) => reply.error(ENOENT),
            Err(err) => reply.error(err.errno()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.path_of(ino).cloned() else {
            reply.error(ENOENT);
            return;
        };

        if let Some(new_size) = size {
            if let Err(err) = self.fs.truncate(&path, new_size as usize) {
                reply.error(err.errno());
                return;
            }
        }

        match Self::inum_of(ino).and_then(|inum| self.attributes(inum).ok().flatten()) {
            Some(attr) => reply.attr(&Self::TTL, &attr),
            None => reply.error(ENOENT),
        }
    }

    fn open(&mut self, _req: &Request<'_>, _ino: u64, flags: i32, reply: ReplyOpen) {
        let handle = self.assign_file_handle();
        reply.opened(handle, flags as u32);
    }

    fn opendir(&mut self, _req: &Request<'_>, _ino: u64, flags: i32, reply: ReplyOpen) {
        let handle = self.assign_file_handle();
        reply.opened(handle, flags as u32);
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(ENOENT);
            return;
        };

        let mut buf = vec![0; size as usize];
        match self.fs.read(path, &mut buf, offset as usize) {
            Ok(len) => reply.data(&buf[..len]),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino).cloned() else {
            reply.error(ENOENT);
            return;
        };

        match self.fs.write(&path, data, offset as usize) {
            Ok(len) => reply.written(len as u32),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino).cloned() else {
            reply.error(ENOENT);
            return;
        };

        let names = match self.fs.list(&path) {
            Ok(names) => names,
            Err(err) => {
                reply.error(err.errno());
                return;
            }
        };

        let parent_ino = if ino == FUSE_ROOT_ID {
            FUSE_ROOT_ID
        } else {
            self.fs
                .parent_inum(&path)
                .map(Self::ino)
                .unwrap_or(FUSE_ROOT_ID)
        };

        let mut contents: Vec<(u64, FileType, String)> = vec![];
        for name in names {
            if name == DOT {
                contents.push((ino, FileType::Directory, name));
                continue;
            }

            let Ok(Some((entry_ino, kind))) = self.entry_kind(&path, &name) else {
                warn!("skipping unresolvable entry {name} in {path}");
                continue;
            };

            contents.push((entry_ino, kind, name));
        }

        // there is no ".." on disk; synthesize one for the kernel
        contents.insert(
            1.min(contents.len()),
            (parent_ino, FileType::Directory, "..".to_string()),
        );

        for (i, (entry_ino, kind, name)) in contents.into_iter().enumerate().skip(offset as usize)
        {
            let is_buffer_full = reply.add(entry_ino, (i + 1) as i64, kind, name);

            if is_buffer_full {
                break;
            }
        }

        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(EINVAL);
            return;
        };

        let mode = MODE_REGULAR | (mode & 0o7777) as i32;
        if let Err(err) = self.fs.create(&path, mode) {
            reply.error(err.errno());
            return;
        }

        match self.register(path) {
            Ok(Some(attr)) => {
                let handle = self.assign_file_handle();
                reply.created(&Self::TTL, &attr, Self::GENERATION, handle, flags as u32);
            }
            _ => reply.error(ENOENT),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(EINVAL);
            return;
        };

        let mode = MODE_DIRECTORY | (mode & 0o7777) as i32;
        if let Err(err) = self.fs.create(&path, mode) {
            reply.error(err.errno());
            return;
        }

        match self.register(path) {
            Ok(Some(attr)) => reply.entry(&Self::TTL, &attr, Self::GENERATION),
            _ => reply.error(ENOENT),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(EINVAL);
            return;
        };

        // resolve before unlinking; afterwards the entry is gone
        let unlinked_ino = self.fs.lookup(&path).ok().map(Self::ino);

        match self.fs.unlink(&path) {
            Ok(()) => {
                if let Some(ino) = unlinked_ino {
                    self.paths.remove(&ino);
                }
                reply.ok();
            }
            Err(err) => reply.error(err.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.unlink(_req, parent, name, reply);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(from), Some(to)) = (
            self.child_path(parent, name),
            self.child_path(newparent, newname),
        ) else {
            reply.error(EINVAL);
            return;
        };

        match self.fs.rename(&from, &to) {
            Ok(()) => {
                self.move_paths(&from, &to);
                reply.ok();
            }
            Err(err) => reply.error(err.errno()),
        }
    }
}

impl<S: Storage> MonoFuse<S> {
    fn entry_kind(&self, dir_path: &str, name: &str) -> Result<Option<(u64, FileType)>> {
        let path = if dir_path == "/" {
            format!("/{name}")
        } else {
            format!("{dir_path}/{name}")
        };

        let inum = match self.fs.lookup(&path) {
            Ok(inum) => inum,
            Err(FsError::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };

        let inode = self.fs.read_inode(inum)?;
        let kind = if inode.is_directory() {
            FileType::Directory
        } else {
            FileType::RegularFile
        };

        Ok(Some((Self::ino(inum), kind)))
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::MemoryStorage;

    use super::*;

    #[test]
    fn test_ino_round_trip() {
        assert_eq!(MonoFuse::<MemoryStorage>::inum_of(FUSE_ROOT_ID), Some(0));
        assert_eq!(
            MonoFuse::<MemoryStorage>::ino(0),
            FUSE_ROOT_ID
        );
        assert_eq!(MonoFuse::<MemoryStorage>::inum_of(5), Some(4));
    }

    #[test]
    fn test_stale_ino_does_not_alias() {
        // inos past the table's range must not wrap onto live inodes
        assert_eq!(MonoFuse::<MemoryStorage>::inum_of(0), None);
        assert_eq!(
            MonoFuse::<MemoryStorage>::inum_of(u16::MAX as u64 + 2),
            None
        );
        assert_eq!(MonoFuse::<MemoryStorage>::inum_of(u64::MAX), None);
    }
}
