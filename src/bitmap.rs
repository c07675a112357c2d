// src/bitmap.rs
use crate::block_device::NUM_BLOCKS;

pub const BITMAP_BYTES: usize = NUM_BLOCKS / 8;

/// Free-space bitmap, one bit per block (1 = used). Block `i` is bit `i % 8`
/// of byte `i / 8`. Block 0 holds the superblock and is never free.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockBitmap {
    bits: [u8; BITMAP_BYTES],
}

fn decompose(block: usize) -> (usize, u8) {
    (block / 8, 1u8 << (block % 8))
}

impl BlockBitmap {
    /// An empty disk: only block 0 in use.
    pub fn new() -> Self {
        let mut bitmap = BlockBitmap { bits: [0; BITMAP_BYTES] };
        bitmap.bits[0] = 1;
        bitmap
    }

    /// Takes the bytes as stored on disk, without forcing block 0.
    pub fn from_bytes(bits: [u8; BITMAP_BYTES]) -> Self {
        BlockBitmap { bits }
    }

    pub fn as_bytes(&self) -> &[u8; BITMAP_BYTES] {
        &self.bits
    }

    pub fn is_used(&self, block: usize) -> bool {
        if block >= NUM_BLOCKS {
            return false;
        }
        let (byte, mask) = decompose(block);
        self.bits[byte] & mask != 0
    }

    /// Sets or clears `count` bits starting at `start`. Out-of-range blocks
    /// are skipped and block 0 stays used whatever `used` says.
    pub fn mark(&mut self, start: usize, count: usize, used: bool) {
        for block in start..start.saturating_add(count) {
            if block >= NUM_BLOCKS {
                break;
            }
            let (byte, mask) = decompose(block);
            if block == 0 || used {
                self.bits[byte] |= mask;
            } else {
                self.bits[byte] &= !mask;
            }
        }
    }

    /// First-fit search for `size` free blocks in a row, never considering
    /// block 0. A zero-sized request succeeds at block 0 without claiming it.
    pub fn find_contiguous(&self, size: usize) -> Option<usize> {
        if size == 0 {
            return Some(0);
        }

        let mut run_start = 1;
        let mut run_len = 0;
        for block in 1..NUM_BLOCKS {
            if self.is_used(block) {
                run_len = 0;
                continue;
            }
            if run_len == 0 {
                run_start = block;
            }
            run_len += 1;
            if run_len == size {
                return Some(run_start);
            }
        }
        None
    }

    /// True when every block of `start..start + count` is inside the data
    /// area and free.
    pub fn range_free(&self, start: usize, count: usize) -> bool {
        if start == 0 || start + count > NUM_BLOCKS {
            return false;
        }
        (start..start + count).all(|block| !self.is_used(block))
    }

    /// Frees everything except the superblock.
    pub fn clear(&mut self) {
        self.bits = [0; BITMAP_BYTES];
        self.bits[0] = 1;
    }

    pub fn used_count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }
}

impl Default for BlockBitmap {
    fn default() -> Self {
        Self::new()
    }
}
