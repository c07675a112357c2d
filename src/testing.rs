// src/testing.rs
use crate::block_device::{BlockDevice, BLOCK_SIZE};
use crate::flat_fs::format_image;
use crate::image_disk::ImageDisk;
use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// Scratch directory that lives as long as the test holds it.
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        Scratch { dir: TempDir::new().expect("scratch dir") }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// A freshly formatted image inside `scratch`.
pub fn scratch_image(scratch: &Scratch, name: &str) -> PathBuf {
    let path = scratch.path(name);
    format_image(&path).expect("format scratch image");
    path
}

/// Reads one block straight from the image file, bypassing any session.
pub fn block_of(image: &Path, block: u32) -> [u8; BLOCK_SIZE] {
    ImageDisk::open(image)
        .and_then(|disk| disk.read_block(block))
        .expect("read image block")
}

/// Image-backed device that keeps a copy of every superblock written.
pub struct RecordingDisk {
    inner: ImageDisk,
    superblocks: Rc<RefCell<Vec<[u8; BLOCK_SIZE]>>>,
}

impl RecordingDisk {
    pub fn open(image: &Path) -> (Self, Rc<RefCell<Vec<[u8; BLOCK_SIZE]>>>) {
        let superblocks = Rc::new(RefCell::new(Vec::new()));
        let disk = RecordingDisk {
            inner: ImageDisk::open(image).expect("open image"),
            superblocks: Rc::clone(&superblocks),
        };
        (disk, superblocks)
    }
}

impl BlockDevice for RecordingDisk {
    fn block_count(&self) -> u32 {
        self.inner.block_count()
    }

    fn read_block(&self, index: u32) -> io::Result<[u8; BLOCK_SIZE]> {
        self.inner.read_block(index)
    }

    fn write_block(&mut self, index: u32, data: &[u8; BLOCK_SIZE]) -> io::Result<()> {
        if index == 0 {
            self.superblocks.borrow_mut().push(*data);
        }
        self.inner.write_block(index, data)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.inner.sync()
    }
}
