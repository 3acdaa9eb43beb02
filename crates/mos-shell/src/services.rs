//! Collaborators the shell drives: the console, the real-time clock, the
//! program executor, and the machine's RAM.
//!
//! Each is a trait so the shell can run against real hardware, a desktop
//! host, or the recording doubles used in tests.

use std::ops::Range;

use mos_types::config::MemoryMap;
use mos_types::error::{MosError, Result};
use mos_types::time::RtcTime;

/// How a line-editor session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineInput {
    /// Return was pressed; carries the edited text.
    Confirmed(String),
    /// Escape was pressed.
    Cancelled,
}

/// Character output, the line editor, and the display's palette queries.
pub trait Console {
    /// Send raw bytes (text or VDU sequences) to the display.
    fn write_bytes(&mut self, bytes: &[u8]);

    fn write_str(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    /// Read one line of at most `max_len` characters.
    fn edit_line(&mut self, max_len: usize) -> LineInput;

    /// Text columns of the current screen mode.
    fn columns(&self) -> usize;

    /// Colours available in the current screen mode.
    fn colours(&self) -> u8;

    /// Whether the display can report palette entries.
    fn supports_text_palette(&self) -> bool;

    /// Effective colour index behind palette `entry`. Entries 128 and 129
    /// are the current text foreground and background.
    fn read_palette(&mut self, entry: u8) -> u8;
}

/// Real-time clock.
pub trait Clock {
    fn now(&self) -> RtcTime;
    fn set(&mut self, time: RtcTime) -> Result<()>;
}

/// Runs loaded code. Implementations return the program's exit status.
pub trait Executor {
    /// Call a program built for 16-bit (segmented) addressing.
    fn exec16(&mut self, memory: &mut Memory, address: u32, params: &str) -> Result<u8>;

    /// Call a program built for 24-bit (flat) addressing.
    fn exec24(&mut self, memory: &mut Memory, address: u32, params: &str) -> Result<u8>;

    /// Transfer control to `address` with no parameters.
    fn jump(&mut self, memory: &mut Memory, address: u32) -> Result<()>;
}

/// The machine's external RAM, addressed with absolute 24-bit addresses.
#[derive(Debug, Clone)]
pub struct Memory {
    base: u32,
    bytes: Vec<u8>,
}

impl Memory {
    /// Zeroed RAM covering `ram_start..=last_ram`.
    pub fn new(map: &MemoryMap) -> Self {
        let len = (map.last_ram - map.ram_start) as usize + 1;
        Self {
            base: map.ram_start,
            bytes: vec![0; len],
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// One past the last valid address.
    pub fn end(&self) -> u32 {
        self.base + self.bytes.len() as u32
    }

    pub fn slice(&self, address: u32, len: usize) -> Result<&[u8]> {
        let range = self.range(address, len)?;
        Ok(&self.bytes[range])
    }

    pub fn slice_mut(&mut self, address: u32, len: usize) -> Result<&mut [u8]> {
        let range = self.range(address, len)?;
        Ok(&mut self.bytes[range])
    }

    /// Bytes from `address` to the end of RAM.
    pub fn tail(&self, address: u32) -> Result<&[u8]> {
        let len = self.end().saturating_sub(address) as usize;
        self.slice(address, len)
    }

    fn range(&self, address: u32, len: usize) -> Result<Range<usize>> {
        let start = address
            .checked_sub(self.base)
            .ok_or(MosError::InvalidParameter)? as usize;
        let end = start.checked_add(len).ok_or(MosError::InvalidParameter)?;
        if end > self.bytes.len() {
            return Err(MosError::InvalidParameter);
        }
        Ok(start..end)
    }
}
