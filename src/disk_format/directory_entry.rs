use std::{
    fmt::{self, Debug},
    mem::size_of,
};

use serde::{Deserialize, Serialize};

use crate::error::FsError;

use super::block::BLOCK_SIZE;

/// The number of bytes occupied by a directory entry.
pub const DIRECTORY_ENTRY_SIZE: usize = 32;
const_assert!(size_of::<DirectoryEntry>() == DIRECTORY_ENTRY_SIZE);

const_assert!(BLOCK_SIZE % DIRECTORY_ENTRY_SIZE == 0);
/// The number of directory entries that fit in a block.
pub const DIRECTORY_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIRECTORY_ENTRY_SIZE;

/// The maximum supported length of an entry name in bytes.
pub const MAX_NAME_LEN: usize = 28;
const_assert!(size_of::<EntryName>() == MAX_NAME_LEN);

/// The name of a directory's self-reference entry.
pub const DOT: &str = ".";

/// A free directory entry.
pub const FREE_DIRECTORY_ENTRY: DirectoryEntry = DirectoryEntry {
    inum: 0,
    name: EntryName([0; MAX_NAME_LEN]),
};

/// A directory entry: a name bound to an inode number.
///
/// An entry with `inum == 0` is free, except the `"."` entry, which is
/// permanently bound to its own directory's inode number. The root
/// directory's `"."` entry legitimately carries `inum == 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct DirectoryEntry {
    /// The inode number.
    pub inum: i32,
    /// The name of the entry.
    pub name: EntryName,
}

impl DirectoryEntry {
    pub fn new(inum: i32, name: &str) -> Result<DirectoryEntry, FsError> {
        Ok(DirectoryEntry {
            inum,
            name: name.try_into()?,
        })
    }

    /// Whether this slot holds a live binding.
    pub fn is_in_use(&self) -> bool {
        self.inum != 0 || self.name.matches(DOT)
    }
}

/// A NUL-padded name, as stored in a [`DirectoryEntry`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct EntryName([u8; MAX_NAME_LEN]);

impl EntryName {
    /// The stored bytes up to the first NUL.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LEN);
        &self.0[..len]
    }

    pub fn matches(&self, name: &str) -> bool {
        self.as_bytes() == name.as_bytes()
    }
}

impl TryFrom<&str> for EntryName {
    type Error = FsError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.len() > MAX_NAME_LEN || value.as_bytes().contains(&0) {
            return Err(FsError::NameTooLong);
        }

        let mut converted = [0; MAX_NAME_LEN];
        converted[..value.len()].copy_from_slice(value.as_bytes());

        Ok(EntryName(converted))
    }
}

impl Debug for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntryName")
            .field(&String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        let name = EntryName::try_from("b.txt").unwrap();

        assert_eq!(name.to_string(), "b.txt");
        assert!(name.matches("b.txt"));
        assert!(!name.matches("b.tx"));
        assert!(!name.matches("b.txt2"));
    }

    #[test]
    fn test_name_at_limit() {
        let long = "a".repeat(MAX_NAME_LEN);

        assert!(EntryName::try_from(long.as_str()).is_ok());
    }

    #[test]
    fn test_name_too_long() {
        let long = "a".repeat(MAX_NAME_LEN + 1);

        assert!(matches!(
            EntryName::try_from(long.as_str()),
            Err(FsError::NameTooLong)
        ));
    }

    #[test]
    fn test_free_entry_is_not_in_use() {
        assert!(!FREE_DIRECTORY_ENTRY.is_in_use());
    }

    #[test]
    fn test_root_dot_entry_is_in_use() {
        let dot = DirectoryEntry::new(0, DOT).unwrap();

        assert!(dot.is_in_use());
    }

    #[test]
    fn test_entry_encoded_size() {
        let entry = DirectoryEntry::new(3, "file").unwrap();
        let encoded = bincode::serialize(&entry).unwrap();

        assert_eq!(encoded.len(), DIRECTORY_ENTRY_SIZE);
    }
}
