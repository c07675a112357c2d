// src/lib.rs
//! A small file system living inside a single 128-block image file.
//!
//! Block 0 holds a free-space bitmap and a 126-entry inode table; files are
//! single contiguous runs of blocks and directories are inodes that other
//! inodes name as their parent. [`FlatFs`] is the entry point: mount an image,
//! then create, delete, read, write, resize and defragment through it.

pub mod bitmap;
pub mod block_device;
pub mod compaction;
pub mod directory;
pub mod error;
pub mod flat_fs;
pub mod fsck;
pub mod image_disk;
pub mod inode;
pub mod script;
pub mod superblock;

#[cfg(test)]
mod testing;

pub use block_device::{BlockDevice, BLOCK_SIZE, NUM_BLOCKS};
pub use directory::{EntryKind, ListEntry};
pub use error::{FsError, Result};
pub use flat_fs::{format_image, FlatFs};
pub use fsck::Inconsistency;
pub use image_disk::ImageDisk;
pub use inode::{DirId, Inode, InodeKind, Name};
