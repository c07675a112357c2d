// src/directory.rs
use crate::error::{FsError, Result};
use crate::flat_fs::Session;
use crate::inode::{DirId, InodeKind, Name};
use log::debug;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File { blocks: usize },
    /// `entries` counts the directory's own `.` and `..`.
    Directory { entries: usize },
}

/// One line of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl fmt::Display for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntryKind::File { blocks } => write!(f, "{:<5} {:>3} KB", self.name, blocks),
            EntryKind::Directory { entries } => write!(f, "{:<5} {:>3}", self.name, entries),
        }
    }
}

impl Session {
    fn entry_count(&self, dir: DirId) -> usize {
        2 + self.superblock.children(dir).len()
    }

    pub fn change_directory(&mut self, token: &str) -> Result<()> {
        match token {
            "." => {}
            ".." => self.cwd = self.superblock.parent_of(self.cwd),
            _ => {
                let not_found = || FsError::DirectoryNotFound(token.to_string());
                let key = Name::new(token).map_err(|_| not_found())?;
                let index = self.superblock.resolve(&key, self.cwd).ok_or_else(not_found)?;
                match self.superblock.get(index) {
                    Some(inode) if inode.is_directory() => self.cwd = DirId::Inode(index),
                    _ => return Err(not_found()),
                }
            }
        }
        debug!("cwd is now {:?}", self.cwd);
        Ok(())
    }

    /// Deletes `name` from the current directory; directories take their
    /// whole subtree with them. The superblock is written after every freed
    /// file and once more at the end.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let not_found = || FsError::NotFound(name.to_string());
        let key = Name::new(name).map_err(|_| not_found())?;
        let index = self.superblock.resolve(&key, self.cwd).ok_or_else(not_found)?;

        self.delete_inode(index)?;
        self.persist_superblock()
    }

    fn delete_inode(&mut self, index: usize) -> Result<()> {
        let inode = match self.superblock.inodes[index] {
            Some(inode) => inode,
            None => return Ok(()),
        };

        match inode.kind {
            InodeKind::Directory => {
                for child in self.superblock.children(DirId::Inode(index)) {
                    if child != index {
                        self.delete_inode(child)?;
                    }
                }
                self.superblock.inodes[index] = None;
            }
            InodeKind::File { start_block, size } => {
                let (start, size) = (start_block as usize, size as usize);
                self.superblock.bitmap.mark(start, size, false);
                self.zero_blocks(start, size)?;
                self.superblock.inodes[index] = None;
                // the image stays mountable between freed files
                self.persist_superblock()?;
                debug!("Freed blocks {}..{} of {}", start, start + size, inode.name);
            }
        }
        Ok(())
    }

    /// `.` and `..` followed by the current directory's entries in table order.
    pub fn list(&self) -> Vec<ListEntry> {
        let parent = self.superblock.parent_of(self.cwd);
        let mut entries = vec![
            ListEntry {
                name: ".".to_string(),
                kind: EntryKind::Directory { entries: self.entry_count(self.cwd) },
            },
            ListEntry {
                name: "..".to_string(),
                kind: EntryKind::Directory { entries: self.entry_count(parent) },
            },
        ];

        for index in self.superblock.children(self.cwd) {
            if let Some(inode) = self.superblock.get(index) {
                let kind = match inode.kind {
                    InodeKind::File { size, .. } => EntryKind::File { blocks: size as usize },
                    InodeKind::Directory => EntryKind::Directory {
                        entries: self.entry_count(DirId::Inode(index)),
                    },
                };
                entries.push(ListEntry { name: inode.name.to_string(), kind });
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_device::BLOCK_SIZE;
    use crate::flat_fs::FlatFs;
    use crate::fsck;
    use crate::superblock::RawSuperblock;
    use crate::testing::{block_of, scratch_image, RecordingDisk, Scratch};

    fn mounted(scratch: &Scratch) -> (std::path::PathBuf, FlatFs) {
        let image = scratch_image(scratch, "disk");
        let mut fs = FlatFs::new();
        fs.mount(&image).unwrap();
        (image, fs)
    }

    fn render(fs: &FlatFs) -> Vec<String> {
        fs.list().unwrap().iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn listing_format() {
        let scratch = Scratch::new();
        let (_image, mut fs) = mounted(&scratch);
        fs.create("a", 3).unwrap();
        fs.create("dir", 0).unwrap();
        fs.create("bb", 12).unwrap();

        assert_eq!(
            render(&fs),
            vec![".       5", "..      5", "a       3 KB", "dir     2", "bb     12 KB"]
        );
    }

    #[test]
    fn listing_inside_subdirectory() {
        let scratch = Scratch::new();
        let (_image, mut fs) = mounted(&scratch);
        fs.create("top", 0).unwrap();
        fs.create("x", 1).unwrap();
        fs.change_directory("top").unwrap();
        fs.create("inner", 0).unwrap();

        let list = fs.list().unwrap();
        assert_eq!(list[0].kind, EntryKind::Directory { entries: 3 });
        assert_eq!(list[1].kind, EntryKind::Directory { entries: 4 });
        assert_eq!(list[2], ListEntry {
            name: "inner".to_string(),
            kind: EntryKind::Directory { entries: 2 },
        });
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn change_directory_walks_the_tree() {
        let scratch = Scratch::new();
        let (_image, mut fs) = mounted(&scratch);
        fs.create("a", 0).unwrap();
        fs.change_directory("a").unwrap();
        fs.create("b", 0).unwrap();
        fs.change_directory("b").unwrap();
        assert_eq!(fs.current_dir(), Some(DirId::Inode(1)));

        fs.change_directory(".").unwrap();
        assert_eq!(fs.current_dir(), Some(DirId::Inode(1)));
        fs.change_directory("..").unwrap();
        assert_eq!(fs.current_dir(), Some(DirId::Inode(0)));
        fs.change_directory("..").unwrap();
        assert_eq!(fs.current_dir(), Some(DirId::Root));
        fs.change_directory("..").unwrap();
        assert_eq!(fs.current_dir(), Some(DirId::Root));
    }

    #[test]
    fn change_directory_rejects_files_and_unknown_names() {
        let scratch = Scratch::new();
        let (_image, mut fs) = mounted(&scratch);
        fs.create("f", 1).unwrap();
        let err = fs.change_directory("f").unwrap_err();
        assert_eq!(err.to_string(), "Directory f does not exist");
        assert!(matches!(fs.change_directory("nope"), Err(FsError::DirectoryNotFound(_))));
        assert_eq!(fs.current_dir(), Some(DirId::Root));
    }

    #[test]
    fn same_name_in_different_directories() {
        let scratch = Scratch::new();
        let (_image, mut fs) = mounted(&scratch);
        fs.create("f", 1).unwrap();
        fs.create("d", 0).unwrap();
        fs.change_directory("d").unwrap();
        fs.create("f", 2).unwrap();
        assert_eq!(fs.find("f").unwrap().extent(), Some((2, 2)));
        fs.change_directory("..").unwrap();
        assert_eq!(fs.find("f").unwrap().extent(), Some((1, 1)));
    }

    #[test]
    fn delete_file_frees_and_zeroes_its_blocks() {
        let scratch = Scratch::new();
        let (image, mut fs) = mounted(&scratch);
        fs.create("a", 2).unwrap();
        fs.create("b", 3).unwrap();
        fs.create("c", 1).unwrap();
        fs.set_buffer(b"bbbb").unwrap();
        for block in 0..3 {
            fs.write("b", block).unwrap();
        }
        fs.set_buffer(b"cccc").unwrap();
        fs.write("c", 0).unwrap();

        fs.delete("b").unwrap();
        assert!(fs.find("b").is_none());
        let bitmap = fs.bitmap().unwrap();
        assert!((3..6).all(|b| !bitmap.is_used(b)));
        assert!(bitmap.is_used(2) && bitmap.is_used(6));
        for block in 3..6 {
            assert_eq!(block_of(&image, block), [0u8; BLOCK_SIZE]);
        }
        assert_eq!(&block_of(&image, 6)[..4], b"cccc");

        // the slot is reused and the record was fully zeroed
        assert_eq!(fs.inode(1), None);
        let raw = &std::fs::read(&image).unwrap()[16 + 8..16 + 16];
        assert_eq!(raw, &[0u8; 8]);
    }

    #[test]
    fn delete_directory_removes_whole_subtree() {
        let scratch = Scratch::new();
        let (image, mut fs) = mounted(&scratch);
        fs.create("keep", 1).unwrap();
        fs.create("d", 0).unwrap();
        fs.change_directory("d").unwrap();
        fs.create("f1", 2).unwrap();
        fs.create("e", 0).unwrap();
        fs.change_directory("e").unwrap();
        fs.create("f2", 3).unwrap();
        fs.change_directory("..").unwrap();
        fs.change_directory("..").unwrap();

        fs.delete("d").unwrap();

        let list = render(&fs);
        assert_eq!(list, vec![".       3", "..      3", "keep    1 KB"]);
        let live: Vec<_> = (0..126).filter_map(|i| fs.inode(i)).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(fs.bitmap().unwrap().used_count(), 2);

        // remount to check what reached the disk
        let mut other = FlatFs::new();
        other.mount(&image).unwrap();
        assert_eq!(render(&other), list);
        for block in 2..7 {
            assert_eq!(block_of(&image, block), [0u8; BLOCK_SIZE]);
        }
    }

    #[test]
    fn delete_unknown_name_fails() {
        let scratch = Scratch::new();
        let (_image, mut fs) = mounted(&scratch);
        let err = fs.delete("ghost").unwrap_err();
        assert_eq!(err.to_string(), "File or directory ghost does not exist");
    }

    #[test]
    fn delete_writes_superblock_per_freed_file() {
        let scratch = Scratch::new();
        let image = scratch_image(&scratch, "disk");
        let (disk, writes) = RecordingDisk::open(&image);
        let mut fs = FlatFs::new();
        fs.mount_device("disk".to_string(), Box::new(disk)).unwrap();

        fs.create("d", 0).unwrap();
        fs.change_directory("d").unwrap();
        fs.create("f1", 2).unwrap();
        fs.create("e", 0).unwrap();
        fs.change_directory("e").unwrap();
        fs.create("f2", 3).unwrap();
        fs.change_directory("..").unwrap();
        fs.change_directory("..").unwrap();
        fs.create("one", 1).unwrap();

        writes.borrow_mut().clear();
        fs.delete("d").unwrap();
        assert_eq!(writes.borrow().len(), 3);

        writes.borrow_mut().clear();
        fs.delete("one").unwrap();
        assert_eq!(writes.borrow().len(), 2);

        fs.create("g", 0).unwrap();
        writes.borrow_mut().clear();
        fs.delete("g").unwrap();
        assert_eq!(writes.borrow().len(), 1);
    }

    #[test]
    fn intermediate_superblocks_stay_consistent() {
        let scratch = Scratch::new();
        let image = scratch_image(&scratch, "disk");
        let (disk, writes) = RecordingDisk::open(&image);
        let mut fs = FlatFs::new();
        fs.mount_device("disk".to_string(), Box::new(disk)).unwrap();

        fs.create("d", 0).unwrap();
        fs.change_directory("d").unwrap();
        for (name, size) in [("a", 1), ("b", 4), ("c", 2)] {
            fs.create(name, size).unwrap();
        }
        fs.change_directory("..").unwrap();

        writes.borrow_mut().clear();
        fs.delete("d").unwrap();
        let snapshots = writes.borrow();
        assert_eq!(snapshots.len(), 4);
        for block in snapshots.iter() {
            assert_eq!(fsck::check(&RawSuperblock::from_block(block)), Ok(()));
        }
    }
}
