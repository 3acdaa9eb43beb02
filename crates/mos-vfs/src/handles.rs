//! The MOS open-file table.
//!
//! Loaded programs refer to open files by small 1-based numbers. The table
//! maps those numbers onto driver handles and bounds how many can be open at
//! once. Handle `0` is never issued; closing `0` closes everything.

use mos_types::error::{MosError, Result};

use crate::{FileHandle, OpenMode, Vfs};

#[derive(Debug)]
pub struct FileTable {
    slots: Vec<Option<FileHandle>>,
}

impl FileTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Open `path` into the first free slot and return its number.
    pub fn open<V: Vfs + ?Sized>(&mut self, vfs: &mut V, path: &str, mode: OpenMode) -> Result<u8> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(MosError::TooManyOpenFiles)?;
        let fh = vfs.open(path, mode)?;
        self.slots[index] = Some(fh);
        log::debug!("fopen {path} -> #{}", index + 1);
        Ok((index + 1) as u8)
    }

    /// Close one handle, or every open handle when `handle` is `0` (or out of
    /// range). Closing a free slot is a no-op.
    pub fn close<V: Vfs + ?Sized>(&mut self, vfs: &mut V, handle: u8) -> Result<()> {
        let n = handle as usize;
        if (1..=self.slots.len()).contains(&n) {
            if let Some(fh) = self.slots[n - 1].take() {
                vfs.close(fh)?;
            }
            return Ok(());
        }
        let mut first_err = None;
        for slot in &mut self.slots {
            if let Some(fh) = slot.take()
                && let Err(e) = vfs.close(fh)
            {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Driver handle behind an open slot.
    pub fn get(&self, handle: u8) -> Result<FileHandle> {
        (handle as usize)
            .checked_sub(1)
            .and_then(|i| self.slots.get(i).copied().flatten())
            .ok_or(MosError::InvalidObject)
    }
}
