// src/compaction.rs
use crate::error::{FsError, Result};
use crate::flat_fs::{Session, MAX_FILE_BLOCKS};
use crate::inode::InodeKind;
use log::{debug, info};

impl Session {
    /// Grows or shrinks the file `name` to `new_size` blocks.
    ///
    /// Growth happens in place when the blocks after the file are free,
    /// otherwise the file is copied to the first free run that fits. If no
    /// run fits nothing changes. Shrinking zeroes and frees the tail.
    pub fn resize(&mut self, name: &str, new_size: usize) -> Result<()> {
        if new_size == 0 || new_size > MAX_FILE_BLOCKS {
            return Err(FsError::InvalidSize(new_size, 1));
        }
        let (index, start, size) = self.lookup_file(name)?;
        let mut new_start = start;

        if new_size > size {
            if self.superblock.bitmap.range_free(start + size, new_size - size) {
                self.superblock.bitmap.mark(start + size, new_size - size, true);
                debug!("Grew {} in place to blocks {}..{}", name, start, start + new_size);
            } else {
                new_start = self
                    .superblock
                    .bitmap
                    .find_contiguous(new_size)
                    .ok_or_else(|| FsError::CannotExpand { name: name.to_string(), size: new_size })?;

                let data = self.read_blocks(start, size)?;
                self.write_blocks(new_start, &data)?;
                self.zero_blocks(start, size)?;

                self.superblock.bitmap.mark(start, size, false);
                self.superblock.bitmap.mark(new_start, new_size, true);
                debug!(
                    "Moved {} from blocks {}..{} to {}..{}",
                    name,
                    start,
                    start + size,
                    new_start,
                    new_start + new_size
                );
            }
        } else if new_size < size {
            self.zero_blocks(start + new_size, size - new_size)?;
            self.superblock.bitmap.mark(start + new_size, size - new_size, false);
            debug!("Shrank {} to {} blocks", name, new_size);
        }

        if let Some(inode) = self.superblock.inodes[index].as_mut() {
            inode.kind = InodeKind::File { start_block: new_start as u8, size: new_size as u8 };
        }
        self.persist_superblock()
    }

    /// Slides every file down towards block 1, keeping their order by start
    /// block, then rebuilds the bitmap from the table. Returns the number of
    /// files that moved.
    pub fn defragment(&mut self) -> Result<usize> {
        let mut files = self.superblock.files();
        files.sort_by_key(|&(_, start, _)| start);

        let mut next_free = 1;
        let mut moved = 0;
        for &(index, start, size) in &files {
            if start != next_free {
                let data = self.read_blocks(start, size)?;
                self.zero_blocks(start, size)?;
                self.write_blocks(next_free, &data)?;

                if let Some(inode) = self.superblock.inodes[index].as_mut() {
                    inode.kind = InodeKind::File { start_block: next_free as u8, size: size as u8 };
                }
                debug!("Relocated {} from block {} to {}", index, start, next_free);
                moved += 1;
            }
            next_free += size;
        }

        self.superblock.bitmap.clear();
        for (_, start, size) in self.superblock.files() {
            self.superblock.bitmap.mark(start, size, true);
        }

        info!(
            "Defragmented {}: {} of {} files moved, data ends at block {}",
            self.disk_name,
            moved,
            files.len(),
            next_free
        );
        self.persist_superblock()?;
        Ok(moved)
    }
}
