// src/image_disk.rs
use crate::block_device::{BlockDevice, BLOCK_SIZE, DISK_SIZE, NUM_BLOCKS};
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Result, Seek, SeekFrom, Write};
use std::path::Path;

/// A disk image stored as a plain file of `NUM_BLOCKS * BLOCK_SIZE` bytes.
/// Block `i` lives at byte offset `i * BLOCK_SIZE`.
pub struct ImageDisk {
    file: File,
}

impl ImageDisk {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let len = file.metadata()?.len();
        if len != DISK_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{:?} is {} bytes, expected a {} byte image", path, len, DISK_SIZE),
            ));
        }

        debug!("Opened image {:?}", path);
        Ok(ImageDisk { file })
    }

    /// Creates a zero-filled image. Fails if `path` already exists.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(DISK_SIZE)?;

        info!("Created blank image {:?} ({} blocks of {} bytes)", path, NUM_BLOCKS, BLOCK_SIZE);
        Ok(ImageDisk { file })
    }

    fn seek_to(&self, index: u32) -> io::Result<&File> {
        if index as usize >= NUM_BLOCKS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block {} is outside the {} block image", index, NUM_BLOCKS),
            ));
        }
        let mut file = &self.file;
        file.seek(SeekFrom::Start(index as u64 * BLOCK_SIZE as u64))?;
        Ok(file)
    }
}

impl BlockDevice for ImageDisk {
    fn block_count(&self) -> u32 {
        NUM_BLOCKS as u32
    }

    fn read_block(&self, index: u32) -> Result<[u8; BLOCK_SIZE]> {
        let mut file = self.seek_to(index)?;
        let mut buffer = [0u8; BLOCK_SIZE];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn write_block(&mut self, index: u32, data: &[u8; BLOCK_SIZE]) -> Result<()> {
        let mut file = self.seek_to(index)?;
        file.write_all(data)
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()
    }
}
