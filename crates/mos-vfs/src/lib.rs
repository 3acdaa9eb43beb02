//! Storage-driver abstraction for the MOS shell.
//!
//! [`Vfs`] mirrors the primitives the firmware gets from its FAT driver:
//! handle-based file I/O, directory enumeration with optional pattern
//! filtering, and path-level operations. Paths may be absolute or relative
//! to the volume's current directory.

pub mod glob;
pub mod handles;
pub mod memory;

use std::fmt;
use std::ops::BitOr;

use mos_types::error::{MosError, Result};
use mos_types::time::FatTimestamp;

pub use handles::FileTable;
pub use memory::MemoryVfs;

/// Opaque handle to an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u32);

/// Opaque handle to an open directory enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirHandle(pub u32);

/// Open flags, using the driver's bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenMode(u8);

impl OpenMode {
    pub const READ: Self = Self(0x01);
    pub const WRITE: Self = Self(0x02);
    /// Create; fail with `Exists` if the file is already there.
    pub const CREATE_NEW: Self = Self(0x04);
    /// Create or truncate.
    pub const CREATE_ALWAYS: Self = Self(0x08);
    /// Open, creating when missing.
    pub const OPEN_ALWAYS: Self = Self(0x10);
    /// Open-always with the position at end of file.
    pub const APPEND: Self = Self(0x30);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OpenMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// FAT attribute byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes(pub u8);

impl Attributes {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;

    pub fn is_dir(self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }

    pub fn is_hidden(self) -> bool {
        self.0 & Self::HIDDEN != 0
    }
}

/// One directory entry as returned by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    /// Packed FAT date.
    pub date: u16,
    /// Packed FAT time.
    pub time: u16,
    pub attributes: Attributes,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.attributes.is_dir()
    }

    pub fn timestamp(&self) -> FatTimestamp {
        FatTimestamp {
            date: self.date,
            time: self.time,
        }
    }
}

impl fmt::Display for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dir() {
            write!(f, "{}/", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// The storage driver consumed by the shell.
pub trait Vfs {
    /// (Re)mount the volume. Resets the current directory to the root.
    fn mount(&mut self) -> Result<()>;

    fn volume_label(&self) -> Result<String>;

    /// Absolute path of the current directory.
    fn current_dir(&self) -> Result<String>;

    fn change_dir(&mut self, path: &str) -> Result<()>;

    /// Entry information for a path.
    fn stat(&self, path: &str) -> Result<DirEntry>;

    fn mkdir(&mut self, path: &str) -> Result<()>;

    /// Delete a file or an empty directory.
    fn unlink(&mut self, path: &str) -> Result<()>;

    /// Rename or move. Never overwrites an existing target.
    fn rename(&mut self, from: &str, to: &str) -> Result<()>;

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle>;

    fn close(&mut self, fh: FileHandle) -> Result<()>;

    /// Read up to `buf.len()` bytes; returns the count (0 at end of file).
    fn read(&mut self, fh: FileHandle, buf: &mut [u8]) -> Result<usize>;

    /// Write bytes at the current position; returns the count written.
    fn write(&mut self, fh: FileHandle, data: &[u8]) -> Result<usize>;

    /// Move to an absolute offset. Seeking past the end of a writable file
    /// extends it.
    fn seek(&mut self, fh: FileHandle, offset: u64) -> Result<()>;

    fn tell(&self, fh: FileHandle) -> Result<u64>;

    fn eof(&self, fh: FileHandle) -> Result<bool>;

    fn file_size(&self, fh: FileHandle) -> Result<u64>;

    fn open_dir(&mut self, path: &str) -> Result<DirHandle>;

    /// Next entry, or `None` once the directory is exhausted.
    fn read_dir(&mut self, dh: DirHandle) -> Result<Option<DirEntry>>;

    fn close_dir(&mut self, dh: DirHandle) -> Result<()>;

    /// Next entry whose name matches `pattern`.
    fn find_next(&mut self, dh: DirHandle, pattern: &str) -> Result<Option<DirEntry>> {
        while let Some(entry) = self.read_dir(dh)? {
            if glob::matches(pattern, &entry.name) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Open `path` and return its first entry matching `pattern`. The handle
    /// is returned even when nothing matched and must be closed by the caller.
    fn find_first(&mut self, path: &str, pattern: &str) -> Result<(DirHandle, Option<DirEntry>)> {
        let dh = self.open_dir(path)?;
        match self.find_next(dh, pattern) {
            Ok(entry) => Ok((dh, entry)),
            Err(e) => {
                let _ = self.close_dir(dh);
                Err(e)
            },
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.stat(path).is_ok_and(|e| e.is_dir())
    }
}

/// Run `f` with a file opened in `mode`, closing it on every exit path.
pub fn with_file<V, T>(
    vfs: &mut V,
    path: &str,
    mode: OpenMode,
    f: impl FnOnce(&mut V, FileHandle) -> Result<T>,
) -> Result<T>
where
    V: Vfs + ?Sized,
{
    let fh = vfs.open(path, mode)?;
    let result = f(vfs, fh);
    let closed = vfs.close(fh);
    let value = result?;
    closed?;
    Ok(value)
}

/// Run `f` with an open directory enumeration, closing it on every exit path.
pub fn with_dir<V, T>(
    vfs: &mut V,
    path: &str,
    f: impl FnOnce(&mut V, DirHandle) -> Result<T>,
) -> Result<T>
where
    V: Vfs + ?Sized,
{
    let dh = vfs.open_dir(path)?;
    let result = f(vfs, dh);
    let closed = vfs.close_dir(dh);
    let value = result?;
    closed?;
    Ok(value)
}

/// Read a whole file into memory.
pub fn read_to_end<V: Vfs + ?Sized>(vfs: &mut V, path: &str) -> Result<Vec<u8>> {
    with_file(vfs, path, OpenMode::READ, |vfs, fh| {
        let mut data = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            let n = vfs.read(fh, &mut chunk)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
        }
        Ok(data)
    })
}

/// Create (or truncate) a file holding `data`.
pub fn write_all<V: Vfs + ?Sized>(vfs: &mut V, path: &str, data: &[u8]) -> Result<()> {
    with_file(
        vfs,
        path,
        OpenMode::WRITE | OpenMode::CREATE_ALWAYS,
        |vfs, fh| {
            if vfs.write(fh, data)? < data.len() {
                return Err(MosError::Denied);
            }
            Ok(())
        },
    )
}
