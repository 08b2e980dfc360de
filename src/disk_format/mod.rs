/// Perform a const assertion.
macro_rules! const_assert {
    ($($tt:tt)*) => {
        const _: () = assert!($($tt)*);
    }
}

/// Blocks.
pub mod block;
/// Directory entries and entry names.
pub mod directory_entry;
/// Inodes.
pub mod inode;
/// The layout of the metadata block.
pub mod layout;
