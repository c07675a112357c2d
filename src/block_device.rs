// src/block_device.rs
use std::io::Result;

pub const BLOCK_SIZE: usize = 1024;
pub const NUM_BLOCKS: usize = 128;
pub const DISK_SIZE: u64 = (BLOCK_SIZE * NUM_BLOCKS) as u64;

pub trait BlockDevice {
    fn block_count(&self) -> u32;
    fn read_block(&self, index: u32) -> Result<[u8; BLOCK_SIZE]>;
    fn write_block(&mut self, index: u32, data: &[u8; BLOCK_SIZE]) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
}
