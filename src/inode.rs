// src/inode.rs
use crate::error::FsError;
use std::fmt;

pub const NUM_INODES: usize = 126;
pub const INODE_SIZE: usize = 8;
pub const NAME_LEN: usize = 5;

/// Parent value that is never valid.
pub const PARENT_INVALID: u8 = 126;
/// Parent value of every record living in the root directory.
pub const PARENT_ROOT: u8 = 127;

const FLAG_BIT: u8 = 0x80;
const LOW_BITS: u8 = 0x7F;

/// A 5-byte, zero-padded entry name. Comparison covers all five bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Name([u8; NAME_LEN]);

impl Name {
    pub fn new(name: &str) -> Result<Self, FsError> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > NAME_LEN || bytes.contains(&0) {
            return Err(FsError::InvalidName(name.to_string()));
        }
        let mut raw = [0u8; NAME_LEN];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Name(raw))
    }

    pub fn from_bytes(raw: [u8; NAME_LEN]) -> Self {
        Name(raw)
    }

    pub fn as_bytes(&self) -> &[u8; NAME_LEN] {
        &self.0
    }

    /// `.` and `..` are synthesised by listings and cannot be created.
    pub fn is_reserved(&self) -> bool {
        self.0 == *b".\0\0\0\0" || self.0 == *b"..\0\0\0"
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        f.pad(&String::from_utf8_lossy(&self.0[..end]))
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", self.to_string())
    }
}

/// A directory as seen from the inode table: the root, or an inode index.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum DirId {
    Root,
    Inode(usize),
}

impl DirId {
    /// Decodes the 7-bit parent field. `PARENT_INVALID` and anything past the
    /// table yield `None`.
    pub fn from_parent_field(value: u8) -> Option<Self> {
        match value {
            PARENT_ROOT => Some(DirId::Root),
            v if (v as usize) < NUM_INODES => Some(DirId::Inode(v as usize)),
            _ => None,
        }
    }

    pub fn parent_field(&self) -> u8 {
        match self {
            DirId::Root => PARENT_ROOT,
            DirId::Inode(index) => *index as u8,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InodeKind {
    File { start_block: u8, size: u8 },
    Directory,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Inode {
    pub name: Name,
    pub kind: InodeKind,
    pub parent: DirId,
}

impl Inode {
    pub fn file(name: Name, start_block: u8, size: u8, parent: DirId) -> Self {
        Inode { name, kind: InodeKind::File { start_block, size }, parent }
    }

    pub fn directory(name: Name, parent: DirId) -> Self {
        Inode { name, kind: InodeKind::Directory, parent }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, InodeKind::Directory)
    }

    /// `(start_block, size)` for files.
    pub fn extent(&self) -> Option<(usize, usize)> {
        match self.kind {
            InodeKind::File { start_block, size } => Some((start_block as usize, size as usize)),
            InodeKind::Directory => None,
        }
    }

    pub fn to_raw(&self) -> RawInode {
        let (start_block, size, dir_flag) = match self.kind {
            InodeKind::File { start_block, size } => (start_block, size & LOW_BITS, 0),
            InodeKind::Directory => (0, 0, FLAG_BIT),
        };
        RawInode {
            name: *self.name.as_bytes(),
            used_size: FLAG_BIT | size,
            start_block,
            dir_parent: dir_flag | (self.parent.parent_field() & LOW_BITS),
        }
    }
}

/// One 8-byte inode record exactly as stored in block 0.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct RawInode {
    pub name: [u8; NAME_LEN],
    pub used_size: u8,
    pub start_block: u8,
    pub dir_parent: u8,
}

impl RawInode {
    pub fn from_bytes(bytes: &[u8; INODE_SIZE]) -> Self {
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&bytes[..NAME_LEN]);
        RawInode {
            name,
            used_size: bytes[5],
            start_block: bytes[6],
            dir_parent: bytes[7],
        }
    }

    pub fn to_bytes(&self) -> [u8; INODE_SIZE] {
        let mut bytes = [0u8; INODE_SIZE];
        bytes[..NAME_LEN].copy_from_slice(&self.name);
        bytes[5] = self.used_size;
        bytes[6] = self.start_block;
        bytes[7] = self.dir_parent;
        bytes
    }

    pub fn in_use(&self) -> bool {
        self.used_size & FLAG_BIT != 0
    }

    pub fn size(&self) -> u8 {
        self.used_size & LOW_BITS
    }

    pub fn is_directory(&self) -> bool {
        self.dir_parent & FLAG_BIT != 0
    }

    pub fn parent_field(&self) -> u8 {
        self.dir_parent & LOW_BITS
    }

    pub fn is_zeroed(&self) -> bool {
        *self == RawInode::default()
    }

    /// Tagged form of an in-use record. Free records and records with an
    /// unusable parent field give `None`.
    pub fn decode(&self) -> Option<Inode> {
        if !self.in_use() {
            return None;
        }
        let parent = DirId::from_parent_field(self.parent_field())?;
        let name = Name::from_bytes(self.name);
        Some(if self.is_directory() {
            Inode::directory(name, parent)
        } else {
            Inode::file(name, self.start_block, self.size(), parent)
        })
    }
}
