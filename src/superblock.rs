// src/superblock.rs
use crate::bitmap::{BlockBitmap, BITMAP_BYTES};
use crate::block_device::BLOCK_SIZE;
use crate::fsck::{self, Inconsistency};
use crate::inode::{DirId, Inode, Name, RawInode, INODE_SIZE, NUM_INODES};

/// Block 0 exactly as stored: bitmap bytes followed by the packed records.
#[derive(Clone, Debug)]
pub struct RawSuperblock {
    pub bitmap: BlockBitmap,
    pub inodes: [RawInode; NUM_INODES],
}

impl RawSuperblock {
    pub fn from_block(block: &[u8; BLOCK_SIZE]) -> Self {
        let mut bits = [0u8; BITMAP_BYTES];
        bits.copy_from_slice(&block[..BITMAP_BYTES]);

        let mut inodes = [RawInode::default(); NUM_INODES];
        for (slot, chunk) in inodes
            .iter_mut()
            .zip(block[BITMAP_BYTES..].chunks_exact(INODE_SIZE))
        {
            let mut record = [0u8; INODE_SIZE];
            record.copy_from_slice(chunk);
            *slot = RawInode::from_bytes(&record);
        }

        RawSuperblock { bitmap: BlockBitmap::from_bytes(bits), inodes }
    }

    pub fn to_block(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[..BITMAP_BYTES].copy_from_slice(self.bitmap.as_bytes());
        for (i, inode) in self.inodes.iter().enumerate() {
            let offset = BITMAP_BYTES + i * INODE_SIZE;
            block[offset..offset + INODE_SIZE].copy_from_slice(&inode.to_bytes());
        }
        block
    }
}

/// The in-memory superblock of a mounted disk. Free slots are `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Superblock {
    pub bitmap: BlockBitmap,
    pub inodes: [Option<Inode>; NUM_INODES],
}

impl Superblock {
    pub fn new() -> Self {
        Superblock { bitmap: BlockBitmap::new(), inodes: [None; NUM_INODES] }
    }

    /// Validates a raw superblock and converts it to the tagged form.
    pub fn load(raw: &RawSuperblock) -> Result<Self, Inconsistency> {
        fsck::check(raw)?;

        let mut inodes = [None; NUM_INODES];
        for (index, (slot, record)) in inodes.iter_mut().zip(raw.inodes.iter()).enumerate() {
            if record.in_use() {
                *slot = Some(record.decode().ok_or(Inconsistency::BadParent { index })?);
            }
        }
        Ok(Superblock { bitmap: raw.bitmap, inodes })
    }

    pub fn to_raw(&self) -> RawSuperblock {
        let mut inodes = [RawInode::default(); NUM_INODES];
        for (slot, inode) in inodes.iter_mut().zip(self.inodes.iter()) {
            if let Some(inode) = inode {
                *slot = inode.to_raw();
            }
        }
        RawSuperblock { bitmap: self.bitmap, inodes }
    }

    pub fn to_block(&self) -> [u8; BLOCK_SIZE] {
        self.to_raw().to_block()
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.inodes.iter().position(|slot| slot.is_none())
    }

    pub fn get(&self, index: usize) -> Option<&Inode> {
        self.inodes.get(index).and_then(|slot| slot.as_ref())
    }

    /// Index of the entry called `name` directly inside `parent`.
    pub fn resolve(&self, name: &Name, parent: DirId) -> Option<usize> {
        self.inodes.iter().position(|slot| {
            matches!(slot, Some(inode) if inode.parent == parent && inode.name == *name)
        })
    }

    /// Indices of every entry whose parent is `dir`, in table order.
    pub fn children(&self, dir: DirId) -> Vec<usize> {
        self.inodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Some(inode) if inode.parent == dir))
            .map(|(index, _)| index)
            .collect()
    }

    /// Parent of a directory; the root is its own parent.
    pub fn parent_of(&self, dir: DirId) -> DirId {
        match dir {
            DirId::Root => DirId::Root,
            DirId::Inode(index) => self.get(index).map(|inode| inode.parent).unwrap_or(DirId::Root),
        }
    }

    /// `(inode index, start_block, size)` of every file.
    pub fn files(&self) -> Vec<(usize, usize, usize)> {
        self.inodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .and_then(|inode| inode.extent())
                    .map(|(start, size)| (index, start, size))
            })
            .collect()
    }
}

impl Default for Superblock {
    fn default() -> Self {
        Self::new()
    }
}
