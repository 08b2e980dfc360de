pub mod bitmap;
pub mod disk_format;
pub mod error;
pub mod fs;
pub mod fuse;
pub mod path;
pub mod storage;
