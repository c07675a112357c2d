// src/flat_fs.rs
use crate::bitmap::BlockBitmap;
use crate::block_device::{BlockDevice, BLOCK_SIZE};
use crate::directory::ListEntry;
use crate::error::{FsError, Result};
use crate::image_disk::ImageDisk;
use crate::inode::{DirId, Inode, Name};
use crate::superblock::{RawSuperblock, Superblock};
use log::{debug, info, warn};
use std::io;
use std::path::Path;

pub const MAX_FILE_BLOCKS: usize = 127;

/// Writes a new, empty, mountable image at `path`.
pub fn format_image(path: impl AsRef<Path>) -> Result<()> {
    let mut disk = ImageDisk::create(path)?;
    disk.write_block(0, &Superblock::new().to_block())?;
    disk.sync()?;
    Ok(())
}

/// A mounted disk: the device, the in-memory superblock that owns every
/// inode, and the current directory.
pub struct Session {
    pub(crate) disk: Box<dyn BlockDevice>,
    pub(crate) disk_name: String,
    pub(crate) superblock: Superblock,
    pub(crate) cwd: DirId,
}

impl Session {
    pub fn disk_name(&self) -> &str {
        &self.disk_name
    }

    pub fn current_dir(&self) -> DirId {
        self.cwd
    }

    /// Index, start block and size of the file `name` in the current directory.
    pub(crate) fn lookup_file(&self, name: &str) -> Result<(usize, usize, usize)> {
        let not_found = || FsError::FileNotFound(name.to_string());
        let key = Name::new(name).map_err(|_| not_found())?;
        let index = self.superblock.resolve(&key, self.cwd).ok_or_else(not_found)?;
        let (start, size) = self.superblock.inodes[index]
            .and_then(|inode| inode.extent())
            .ok_or_else(not_found)?;
        Ok((index, start, size))
    }

    pub(crate) fn persist_superblock(&mut self) -> Result<()> {
        let block = self.superblock.to_block();
        self.disk.write_block(0, &block)?;
        debug!("Superblock written, bitmap {}", hex::encode(self.superblock.bitmap.as_bytes()));
        Ok(())
    }

    pub(crate) fn zero_blocks(&mut self, start: usize, count: usize) -> Result<()> {
        let zero = [0u8; BLOCK_SIZE];
        for block in start..start + count {
            self.disk.write_block(block as u32, &zero)?;
        }
        Ok(())
    }

    pub(crate) fn read_blocks(&self, start: usize, count: usize) -> Result<Vec<[u8; BLOCK_SIZE]>> {
        (start..start + count)
            .map(|block| self.disk.read_block(block as u32).map_err(FsError::from))
            .collect()
    }

    pub(crate) fn write_blocks(&mut self, start: usize, data: &[[u8; BLOCK_SIZE]]) -> Result<()> {
        for (i, block) in data.iter().enumerate() {
            self.disk.write_block((start + i) as u32, block)?;
        }
        Ok(())
    }
}

/// The file system front end: at most one mounted session plus the single
/// block-sized transfer buffer used by `read`, `write` and `set_buffer`.
pub struct FlatFs {
    session: Option<Session>,
    buffer: Box<[u8; BLOCK_SIZE]>,
}

impl FlatFs {
    pub fn new() -> Self {
        FlatFs { session: None, buffer: Box::new([0u8; BLOCK_SIZE]) }
    }

    pub fn is_mounted(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(FsError::NoSession)
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(FsError::NoSession)
    }

    pub fn disk_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.disk_name())
    }

    pub fn current_dir(&self) -> Option<DirId> {
        self.session.as_ref().map(|s| s.current_dir())
    }

    pub fn inode(&self, index: usize) -> Option<Inode> {
        self.session.as_ref().and_then(|s| s.superblock.get(index).copied())
    }

    pub fn bitmap(&self) -> Option<BlockBitmap> {
        self.session.as_ref().map(|s| s.superblock.bitmap)
    }

    /// The entry called `name` in the current directory, if any.
    pub fn find(&self, name: &str) -> Option<Inode> {
        let session = self.session.as_ref()?;
        let key = Name::new(name).ok()?;
        let index = session.superblock.resolve(&key, session.cwd)?;
        session.superblock.get(index).copied()
    }

    pub fn buffer(&self) -> &[u8; BLOCK_SIZE] {
        &self.buffer
    }

    pub fn mount(&mut self, image: impl AsRef<Path>) -> Result<()> {
        let path = image.as_ref();
        let label = path.display().to_string();
        let disk = ImageDisk::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FsError::DiskNotFound(label.clone()),
            _ => FsError::Io(e),
        })?;
        self.mount_device(label, Box::new(disk))
    }

    /// Mounts `disk` if its superblock passes the consistency checks. On any
    /// failure the current session, if there is one, stays mounted.
    pub fn mount_device(&mut self, label: String, disk: Box<dyn BlockDevice>) -> Result<()> {
        let block = disk.read_block(0)?;
        let mut raw = RawSuperblock::from_block(&block);
        raw.bitmap.mark(0, 1, true);

        let superblock = Superblock::load(&raw).map_err(|cause| {
            warn!("Refusing to mount {}: {}", label, cause);
            FsError::Inconsistent { disk: label.clone(), cause }
        })?;

        let files = superblock.files().len();
        let entries = superblock.inodes.iter().filter(|i| i.is_some()).count();
        info!(
            "Mounted {} ({} entries, {} files, {} blocks used)",
            label,
            entries,
            files,
            superblock.bitmap.used_count()
        );

        if let Some(previous) = self.session.as_mut() {
            previous.disk.sync()?;
            debug!("Released {}", previous.disk_name);
        }
        self.session = Some(Session { disk, disk_name: label, superblock, cwd: DirId::Root });
        self.buffer.fill(0);
        Ok(())
    }

    pub fn unmount(&mut self) -> Result<()> {
        let mut session = self.session.take().ok_or(FsError::NoSession)?;
        session.disk.sync()?;
        info!("Unmounted {}", session.disk_name);
        Ok(())
    }

    /// Creates a file of `size` blocks, or a directory when `size` is 0, in
    /// the current directory.
    pub fn create(&mut self, name: &str, size: usize) -> Result<()> {
        let session = self.session_mut()?;
        let key = Name::new(name)?;
        if size > MAX_FILE_BLOCKS {
            return Err(FsError::InvalidSize(size, 0));
        }

        let sb = &mut session.superblock;
        if key.is_reserved() || sb.resolve(&key, session.cwd).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }

        let index = sb.free_slot().ok_or_else(|| FsError::InodeTableFull {
            disk: session.disk_name.clone(),
            name: name.to_string(),
        })?;

        let inode = if size == 0 {
            Inode::directory(key, session.cwd)
        } else {
            let start = sb.bitmap.find_contiguous(size).ok_or_else(|| FsError::NoSpace {
                disk: session.disk_name.clone(),
                blocks: size,
            })?;
            sb.bitmap.mark(start, size, true);
            debug!("Allocated blocks {}..{} to {}", start, start + size, name);
            Inode::file(key, start as u8, size as u8, session.cwd)
        };
        sb.inodes[index] = Some(inode);

        session.persist_superblock()
    }

    /// Copies block `block` of file `name` into the transfer buffer.
    pub fn read(&mut self, name: &str, block: usize) -> Result<()> {
        let session = self.session.as_ref().ok_or(FsError::NoSession)?;
        let (_, start, size) = session.lookup_file(name)?;
        if block >= size {
            return Err(FsError::NoSuchBlock { name: name.to_string(), block });
        }
        *self.buffer = session.disk.read_block((start + block) as u32)?;
        Ok(())
    }

    /// Writes the transfer buffer to block `block` of file `name`.
    pub fn write(&mut self, name: &str, block: usize) -> Result<()> {
        let session = self.session.as_mut().ok_or(FsError::NoSession)?;
        let (_, start, size) = session.lookup_file(name)?;
        if block >= size {
            return Err(FsError::NoSuchBlock { name: name.to_string(), block });
        }
        let target = start + block;
        if !session.superblock.bitmap.is_used(target) {
            return Err(FsError::UnallocatedBlock(target));
        }
        session.disk.write_block(target as u32, &self.buffer)?;
        Ok(())
    }

    /// Zeroes the transfer buffer, then copies `bytes` to its start.
    pub fn set_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > BLOCK_SIZE {
            return Err(FsError::BufferTooLarge(bytes.len()));
        }
        self.buffer.fill(0);
        self.buffer[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.session_mut()?.delete(name)
    }

    pub fn list(&self) -> Result<Vec<ListEntry>> {
        Ok(self.session()?.list())
    }

    pub fn change_directory(&mut self, token: &str) -> Result<()> {
        self.session_mut()?.change_directory(token)
    }

    pub fn resize(&mut self, name: &str, new_size: usize) -> Result<()> {
        self.session_mut()?.resize(name, new_size)
    }

    /// Compacts every file towards block 1. Returns how many files moved.
    pub fn defragment(&mut self) -> Result<usize> {
        self.session_mut()?.defragment()
    }
}

impl Default for FlatFs {
    fn default() -> Self {
        Self::new()
    }
}
