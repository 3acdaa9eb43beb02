//! Loading files into RAM and running program images.
//!
//! A loadable image carries the tag `MOS` at offset `0x40` and an execution
//! mode byte at `0x44`. Loads are refused before any byte is written when
//! the target range would reach into the firmware's reserved area.

use mos_types::config::MemoryMap;
use mos_types::error::{MosError, Result};
use mos_vfs::{OpenMode, with_file};

use crate::interpreter::Environment;

const HEADER_TAG_OFFSET: usize = 0x40;
const HEADER_TAG: &[u8; 3] = b"MOS";
const HEADER_MODE_OFFSET: usize = 0x44;

/// Addressing mode a program was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// 16-bit segmented addressing.
    Legacy,
    /// 24-bit flat addressing.
    Extended,
}

/// Read the execution mode from an image header. `None` when the tag is
/// missing, the mode byte is unknown, or the buffer is too short.
pub fn detect_mode(image: &[u8]) -> Option<ExecMode> {
    let tag = image.get(HEADER_TAG_OFFSET..HEADER_TAG_OFFSET + HEADER_TAG.len())?;
    if tag != HEADER_TAG {
        return None;
    }
    match image.get(HEADER_MODE_OFFSET)? {
        0 => Some(ExecMode::Legacy),
        1 => Some(ExecMode::Extended),
        _ => None,
    }
}

/// Whether `[address, address + size)` reaches into the reserved area.
pub fn overlaps_system(map: &MemoryMap, address: u32, size: u64) -> bool {
    address <= map.last_ram && u64::from(address) + size > u64::from(map.system_address)
}

/// Load a file at `address`. A `size` of 0 loads the whole file; otherwise
/// at most `size` bytes. Returns the number of bytes loaded.
pub fn load(env: &mut Environment<'_>, path: &str, address: u32, size: u32) -> Result<usize> {
    let map = env.config.memory;
    let memory = &mut *env.memory;
    with_file(&mut *env.vfs, path, OpenMode::READ, |vfs, fh| {
        let file_size = vfs.file_size(fh)?;
        let len = if size == 0 {
            file_size
        } else {
            file_size.min(u64::from(size))
        };
        if overlaps_system(&map, address, len) {
            log::warn!("refusing to load {path} at &{address:06X}: overlaps system area");
            return Err(MosError::OverlappingSystem);
        }
        let len = usize::try_from(len).map_err(|_| MosError::InvalidParameter)?;
        let target = memory.slice_mut(address, len)?;
        let mut filled = 0;
        while filled < len {
            let n = vfs.read(fh, &mut target[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        log::debug!("loaded {path}: {filled} bytes at &{address:06X}");
        Ok(filled)
    })
}

/// Write `size` bytes of RAM from `address` into a new file.
pub fn save(env: &mut Environment<'_>, path: &str, address: u32, size: u32) -> Result<()> {
    let data = env.memory.slice(address, size as usize)?;
    with_file(
        &mut *env.vfs,
        path,
        OpenMode::WRITE | OpenMode::CREATE_NEW,
        |vfs, fh| {
            if vfs.write(fh, data)? < data.len() {
                return Err(MosError::Denied);
            }
            Ok(())
        },
    )
}

/// Run the image at `address` with `params` as its argument string.
pub fn run_bin(env: &mut Environment<'_>, address: u32, params: &str) -> Result<()> {
    let mode = detect_mode(env.memory.tail(address)?).ok_or(MosError::InvalidExecutable)?;
    log::info!("running &{address:06X} ({mode:?})");
    let status = match mode {
        ExecMode::Legacy => env.executor.exec16(env.memory, address, params)?,
        ExecMode::Extended => env.executor.exec24(env.memory, address, params)?,
    };
    MosError::from_code(status).map_or(Ok(()), Err)
}

/// Candidate paths tried for an unknown command word, with the address
/// each is loaded at.
pub fn search_path(env: &Environment<'_>, word: &str, in_mos: bool) -> Vec<(String, u32)> {
    let search = &env.config.search;
    let memory = &env.config.memory;
    let mut stages = vec![(
        format!("{}{word}{}", search.command_dir, search.extension),
        memory.star_load_address,
    )];
    if in_mos {
        stages.push((
            format!("{word}{}", search.extension),
            memory.default_load_address,
        ));
        stages.push((
            format!("{}{word}{}", search.binary_dir, search.extension),
            memory.default_load_address,
        ));
    }
    stages
}

/// Find, load and run an external command. A system-area overlap stops the
/// search at once; running out of candidates is `InvalidCommand`.
pub fn run_external(env: &mut Environment<'_>, word: &str, params: &str, in_mos: bool) -> Result<()> {
    if word.len() > env.config.search.max_command_len {
        return Err(MosError::InvalidCommand);
    }
    let mut last = MosError::NoFile;
    for (path, address) in search_path(env, word, in_mos) {
        log::debug!("searching {path}");
        match load(env, &path, address, 0) {
            Ok(_) => return run_bin(env, address, params),
            Err(MosError::OverlappingSystem) => return Err(MosError::OverlappingSystem),
            Err(e) => last = e,
        }
    }
    if last.is_not_found() {
        Err(MosError::InvalidCommand)
    } else {
        Err(last)
    }
}
