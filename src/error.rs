// src/error.rs
use crate::fsck::Inconsistency;
use std::io;
use thiserror::Error;

/// Everything a file system operation can report back to its caller.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("No file system is mounted")]
    NoSession,

    #[error("Cannot find disk {0}")]
    DiskNotFound(String),

    #[error("File system in {disk} is inconsistent (error code: {})", .cause.code())]
    Inconsistent { disk: String, cause: Inconsistency },

    #[error("File or directory {0} already exists")]
    AlreadyExists(String),

    #[error("File or directory {0} does not exist")]
    NotFound(String),

    #[error("File {0} does not exist")]
    FileNotFound(String),

    #[error("Directory {0} does not exist")]
    DirectoryNotFound(String),

    #[error("Superblock in disk {disk} is full, cannot create {name}")]
    InodeTableFull { disk: String, name: String },

    #[error("Cannot allocate {blocks} blocks on {disk}")]
    NoSpace { disk: String, blocks: usize },

    #[error("File {name} cannot expand to size {size}")]
    CannotExpand { name: String, size: usize },

    #[error("{name} does not have block {block}")]
    NoSuchBlock { name: String, block: usize },

    #[error("Attempting to write to an unallocated block")]
    UnallocatedBlock(usize),

    #[error("Invalid name {0:?}: names are 1 to 5 bytes")]
    InvalidName(String),

    #[error("Invalid size {0}: must be between {1} and 127 blocks")]
    InvalidSize(usize, usize),

    #[error("Buffer content is {0} bytes, more than one block")]
    BufferTooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    /// Checker code carried by a failed mount, 0 for every other error.
    pub fn inconsistency_code(&self) -> u8 {
        match self {
            FsError::Inconsistent { cause, .. } => cause.code(),
            _ => 0,
        }
    }
}
