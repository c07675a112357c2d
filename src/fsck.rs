// src/fsck.rs
//! Structural checks run against a raw superblock before it is mounted.
//!
//! The checks run in a fixed order and the first failure wins, so a table
//! with several problems always reports the lowest code:
//!
//! 1. free records are entirely zero
//! 2. file extents lie inside blocks 1..=127
//! 3. directories own no blocks
//! 4. parents are the root sentinel or an in-use directory
//! 5. names are unique within a directory
//! 6. the bitmap is exactly block 0 plus every file's blocks, with no block
//!    claimed twice

use crate::block_device::NUM_BLOCKS;
use crate::inode::{NUM_INODES, PARENT_INVALID, PARENT_ROOT};
use crate::superblock::RawSuperblock;
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Inconsistency {
    #[error("free inode {index} has non-zero fields")]
    DirtyFreeInode { index: usize },

    #[error("file inode {index} lies outside the data blocks")]
    FileOutOfBounds { index: usize },

    #[error("directory inode {index} has a start block or size")]
    DirectoryHasBlocks { index: usize },

    #[error("inode {index} has an invalid parent")]
    BadParent { index: usize },

    #[error("inodes {index} and {other} share a name in the same directory")]
    DuplicateName { index: usize, other: usize },

    #[error("block {block} is claimed by more than one file")]
    DoubleClaimed { block: usize },

    #[error("bitmap disagrees with inode table at block {block}")]
    BitmapMismatch { block: usize },
}

impl Inconsistency {
    pub fn code(&self) -> u8 {
        match self {
            Inconsistency::DirtyFreeInode { .. } => 1,
            Inconsistency::FileOutOfBounds { .. } => 2,
            Inconsistency::DirectoryHasBlocks { .. } => 3,
            Inconsistency::BadParent { .. } => 4,
            Inconsistency::DuplicateName { .. } => 5,
            Inconsistency::DoubleClaimed { .. } | Inconsistency::BitmapMismatch { .. } => 6,
        }
    }
}

pub fn check(sb: &RawSuperblock) -> Result<(), Inconsistency> {
    let result = check_free_inodes(sb)
        .and_then(|_| check_file_extents(sb))
        .and_then(|_| check_directories(sb))
        .and_then(|_| check_parents(sb))
        .and_then(|_| check_unique_names(sb))
        .and_then(|_| check_bitmap(sb));

    match &result {
        Ok(()) => debug!("fsck: superblock is consistent"),
        Err(e) => warn!("fsck: {} (code {})", e, e.code()),
    }
    result
}

fn check_free_inodes(sb: &RawSuperblock) -> Result<(), Inconsistency> {
    for (index, inode) in sb.inodes.iter().enumerate() {
        if !inode.in_use() && !inode.is_zeroed() {
            return Err(Inconsistency::DirtyFreeInode { index });
        }
    }
    Ok(())
}

fn check_file_extents(sb: &RawSuperblock) -> Result<(), Inconsistency> {
    for (index, inode) in sb.inodes.iter().enumerate() {
        if !inode.in_use() || inode.is_directory() {
            continue;
        }
        let start = inode.start_block as usize;
        let end = start + inode.size() as usize;
        if start < 1 || end > NUM_BLOCKS {
            return Err(Inconsistency::FileOutOfBounds { index });
        }
    }
    Ok(())
}

fn check_directories(sb: &RawSuperblock) -> Result<(), Inconsistency> {
    for (index, inode) in sb.inodes.iter().enumerate() {
        if inode.in_use() && inode.is_directory() && (inode.start_block != 0 || inode.size() != 0) {
            return Err(Inconsistency::DirectoryHasBlocks { index });
        }
    }
    Ok(())
}

fn check_parents(sb: &RawSuperblock) -> Result<(), Inconsistency> {
    for (index, inode) in sb.inodes.iter().enumerate() {
        if !inode.in_use() {
            continue;
        }
        let parent = inode.parent_field();
        let valid = match parent {
            PARENT_ROOT => true,
            PARENT_INVALID => false,
            p => {
                let p = p as usize;
                p < NUM_INODES && sb.inodes[p].in_use() && sb.inodes[p].is_directory()
            }
        };
        if !valid {
            return Err(Inconsistency::BadParent { index });
        }
    }
    Ok(())
}

fn check_unique_names(sb: &RawSuperblock) -> Result<(), Inconsistency> {
    for (index, a) in sb.inodes.iter().enumerate() {
        if !a.in_use() {
            continue;
        }
        for (other, b) in sb.inodes.iter().enumerate().skip(index + 1) {
            if b.in_use() && a.parent_field() == b.parent_field() && a.name == b.name {
                return Err(Inconsistency::DuplicateName { index, other });
            }
        }
    }
    Ok(())
}

fn check_bitmap(sb: &RawSuperblock) -> Result<(), Inconsistency> {
    let mut claimed = [false; NUM_BLOCKS];
    claimed[0] = true;

    for inode in sb.inodes.iter().filter(|i| i.in_use() && !i.is_directory()) {
        let start = inode.start_block as usize;
        for block in start..start + inode.size() as usize {
            if claimed[block] {
                return Err(Inconsistency::DoubleClaimed { block });
            }
            claimed[block] = true;
        }
    }

    match (0..NUM_BLOCKS).find(|&block| sb.bitmap.is_used(block) != claimed[block]) {
        Some(block) => Err(Inconsistency::BitmapMismatch { block }),
        None => Ok(()),
    }
}
