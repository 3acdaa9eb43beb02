//! Directory listings for `DIR`/`CAT`/`LS`.
//!
//! The normal path counts the matching entries, reserves one table for
//! them on the firmware heap, copies every name onto the heap, then sorts
//! (directories first, then names without regard to case) and renders
//! either brief columns or long lines. If any of those allocations fails
//! the listing is streamed straight from the driver instead, unsorted and
//! without colour.

use mos_types::error::{MosError, Result};
use mos_types::heap::{HeapString, Reservation};
use mos_types::time::FatTimestamp;
use mos_vfs::{Attributes, DirEntry, DirHandle, Vfs, with_dir};

use crate::interpreter::Environment;
use crate::pattern::{PathSplit, compare_names, dir_to_open, split};
use crate::services::Console;

/// Heap charge per listed entry (size, date, time, attributes, name pointer).
const ENTRY_RECORD_SIZE: usize = 12;

/// VDU code selecting the text foreground colour.
const VDU_COLOUR: u8 = 17;

/// Palette entries that report the current text colours.
const PALETTE_TEXT_FG: u8 = 128;
const PALETTE_TEXT_BG: u8 = 129;

struct Listed {
    size: u64,
    stamp: FatTimestamp,
    attributes: Attributes,
    name: HeapString,
}

impl Listed {
    fn is_dir(&self) -> bool {
        self.attributes.is_dir()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Colours {
    fg: u8,
    file: u8,
    dir: u8,
}

/// List `input` (a directory, or a directory plus wildcard pattern).
pub fn list(env: &mut Environment<'_>, input: &str, long: bool) -> Result<()> {
    let label = env.vfs.volume_label()?;
    let parts = split(input);
    let (dir, pattern) = match parts {
        PathSplit::Single(path) => (path, None),
        PathSplit::Pattern { dir, pattern } => (dir, Some(pattern)),
    };
    let owned = match parts.to_heap(env.heap) {
        Ok(owned) => owned,
        Err(_) => {
            log::warn!("DIR {input}: out of memory, streaming unsorted");
            return fallback(env, &label, dir, pattern, long, false);
        },
    };
    let dir = owned.dir.as_str();
    let pattern = owned.pattern.as_deref();

    let count = with_dir(&mut *env.vfs, dir_to_open(dir), |vfs, dh| {
        let mut n = 0;
        while next_entry(vfs, dh, pattern)?.is_some() {
            n += 1;
        }
        Ok(n)
    })?;

    // A pattern's directory keeps the separator the user typed.
    let shown = if dir.is_empty() || dir == "." {
        env.cwd.clone()
    } else if pattern.is_some() && !dir.ends_with('/') {
        format!("{dir}/")
    } else {
        dir.to_string()
    };
    env.print(&format!("Volume: {}\r\n", volume_name(&label)));
    env.print(&format!("Directory: {shown}\r\n\r\n"));
    if count == 0 {
        env.print("No files found\r\n");
        return Ok(());
    }

    let (_table, mut entries) = match collect(env, dir, pattern, count) {
        Ok(collected) => collected,
        Err(MosError::OutOfMemory) => {
            log::warn!("DIR {input}: out of memory, streaming unsorted");
            return fallback(env, &label, dir, pattern, long, true);
        },
        Err(e) => return Err(e),
    };
    entries.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| compare_names(&a.name, &b.name))
    });

    let colours = pick_colours(env.console);
    if long {
        for e in &entries {
            if let Some(c) = colours {
                env.console.write_bytes(&[VDU_COLOUR, c.fg]);
            }
            env.print(&long_prefix(e.stamp, e.is_dir(), e.size));
            if let Some(c) = colours {
                let tint = if e.is_dir() { c.dir } else { c.file };
                env.console.write_bytes(&[VDU_COLOUR, tint]);
            }
            env.print(&format!("{}\r\n", e.name));
        }
    } else {
        render_brief(env.console, &entries, colours);
    }
    if let Some(c) = colours {
        env.console.write_bytes(&[VDU_COLOUR, c.fg]);
    }
    Ok(())
}

fn volume_name(label: &str) -> &str {
    if label.is_empty() { "<No Volume Label>" } else { label }
}

fn next_entry<V: Vfs + ?Sized>(vfs: &mut V, dh: DirHandle, pattern: Option<&str>) -> Result<Option<DirEntry>> {
    match pattern {
        Some(p) => vfs.find_next(dh, p),
        None => vfs.read_dir(dh),
    }
}

/// Read up to `count` entries onto the heap.
fn collect(
    env: &mut Environment<'_>,
    dir: &str,
    pattern: Option<&str>,
    count: usize,
) -> Result<(Reservation, Vec<Listed>)> {
    let heap = env.heap;
    let table = heap.reserve(count * ENTRY_RECORD_SIZE)?;
    let entries = with_dir(&mut *env.vfs, dir_to_open(dir), |vfs, dh| {
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let Some(e) = next_entry(vfs, dh, pattern)? else {
                break;
            };
            out.push(Listed {
                size: e.size,
                stamp: e.timestamp(),
                attributes: e.attributes,
                name: heap.alloc_str(&e.name)?,
            });
        }
        Ok(out)
    })?;
    Ok((table, entries))
}

/// Colours for files and directories, chosen so directories stand out from
/// both the text colour and the background.
fn pick_colours(console: &mut dyn Console) -> Option<Colours> {
    let available = console.colours();
    if available <= 2 || !console.supports_text_palette() {
        return None;
    }
    let fg = console.read_palette(PALETTE_TEXT_FG);
    let bg = console.read_palette(PALETTE_TEXT_BG);
    let file = fg;
    let mut dir = 2;
    while dir == bg || dir == file {
        dir = (dir + 1) % available;
    }
    Some(Colours { fg, file, dir })
}

/// `YYYY/MM/DD<tab>HH:MM D     size `
fn long_prefix(stamp: FatTimestamp, is_dir: bool, size: u64) -> String {
    format!(
        "{:04}/{:02}/{:02}\t{:02}:{:02} {} {:>8} ",
        stamp.year(),
        stamp.month(),
        stamp.day(),
        stamp.hour(),
        stamp.minute(),
        if is_dir { 'D' } else { ' ' },
        size
    )
}

fn render_brief(console: &mut dyn Console, entries: &[Listed], colours: Option<Colours>) {
    let longest = entries
        .iter()
        .map(|e| e.name.chars().count() + 1)
        .max()
        .unwrap_or(1);
    let max_cols = (console.columns() / longest).max(1);
    let mut col = 0;
    for e in entries {
        if col == max_cols {
            col = 0;
            console.write_str("\r\n");
        }
        let width = if col == max_cols - 1 { longest - 1 } else { longest };
        if let Some(c) = colours {
            let tint = if e.is_dir() { c.dir } else { c.file };
            console.write_bytes(&[VDU_COLOUR, tint]);
        }
        console.write_str(&format!("{:<width$}", e.name.as_str()));
        col += 1;
    }
    console.write_str("\r\n");
}

/// Unsorted listing read one entry at a time, used when the heap is short.
fn fallback(
    env: &mut Environment<'_>,
    label: &str,
    dir: &str,
    pattern: Option<&str>,
    long: bool,
    hide_volume: bool,
) -> Result<()> {
    if !hide_volume {
        env.print(&format!("Volume: {}\r\n\r\n", volume_name(label)));
    }
    let columns = env.console.columns();
    let console = &mut *env.console;
    with_dir(&mut *env.vfs, dir_to_open(dir), |vfs, dh| {
        let mut col = 0;
        while let Some(e) = next_entry(vfs, dh, pattern)? {
            if long {
                let line = long_prefix(e.timestamp(), e.is_dir(), e.size);
                console.write_str(&format!("{line}{}\r\n", e.name));
            } else {
                let len = e.name.chars().count();
                if col + len + 2 >= columns {
                    console.write_str("\r\n");
                    col = 0;
                }
                console.write_str(&format!("{}  ", e.name));
                col += len + 2;
            }
        }
        Ok(())
    })?;
    if !long {
        env.print("\r\n");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Rig;
    use mos_types::time::RtcTime;

    fn rig_with(files: &[&str], dirs: &[&str]) -> Rig {
        let mut rig = Rig::new();
        for d in dirs {
            rig.vfs.mkdir_all(d).unwrap();
        }
        for f in files {
            rig.vfs.write_file(f, b"12345").unwrap();
        }
        rig
    }

    fn position(haystack: &str, needle: &str) -> usize {
        haystack
            .find(needle)
            .unwrap_or_else(|| panic!("{needle:?} missing from {haystack:?}"))
    }

    #[test]
    fn brief_sorts_dirs_first_then_name() {
        let mut rig = rig_with(&["/Zeta", "/Beta"], &["/alpha"]);
        list(&mut rig.env(), ".", false).unwrap();
        let out = rig.output();
        let (a, b, z) = (position(&out, "alpha"), position(&out, "Beta"), position(&out, "Zeta"));
        assert!(a < b && b < z, "{out}");
        assert!(out.starts_with("Volume: <No Volume Label>\r\nDirectory: /\r\n\r\n"));
        assert!(out.ends_with("\r\n"));
    }

    #[test]
    fn brief_columns_wrap() {
        let mut rig = rig_with(&["/aaaa", "/bbbb", "/cccc"], &[]);
        rig.console.columns = 10;
        list(&mut rig.env(), ".", false).unwrap();
        let out = rig.output();
        let body = &out[position(&out, "aaaa")..];
        assert_eq!(body, "aaaa bbbb\r\ncccc \r\n");
    }

    #[test]
    fn long_format() {
        let mut rig = Rig::new();
        rig.vfs.set_timestamp(FatTimestamp::from_rtc(&RtcTime {
            year: 2023,
            month: 10,
            day: 24,
            hour: 14,
            minute: 5,
            second: 0,
        }));
        rig.vfs.mkdir_all("/games/maps").unwrap();
        rig.vfs.write_file("/games/doom.bin", b"12345").unwrap();
        list(&mut rig.env(), "/games", true).unwrap();
        let out = rig.output();
        assert!(out.contains("Directory: /games\r\n"));
        assert!(out.contains("2023/10/24\t14:05 D        0 maps\r\n"), "{out}");
        assert!(out.contains("2023/10/24\t14:05          5 doom.bin\r\n"), "{out}");
        assert!(position(&out, "maps") < position(&out, "doom.bin"));
    }

    #[test]
    fn pattern_filters() {
        let mut rig = rig_with(&["/a.bin", "/b.txt", "/c.BIN"], &[]);
        list(&mut rig.env(), "*.bin", false).unwrap();
        let out = rig.output();
        assert!(out.contains("a.bin") && out.contains("c.BIN"));
        assert!(!out.contains("b.txt"));
    }

    #[test]
    fn pattern_header_keeps_separator() {
        let mut rig = rig_with(&["/games/a.bin", "/b.bin"], &["/games"]);
        list(&mut rig.env(), "games/*.bin", false).unwrap();
        assert!(rig.output().contains("Directory: games/\r\n\r\n"));
        rig.console.clear();
        list(&mut rig.env(), "/*.bin", false).unwrap();
        assert!(rig.output().contains("Directory: /\r\n\r\n"));
    }

    #[test]
    fn empty_match_reports_no_files() {
        let mut rig = rig_with(&["/a.txt"], &[]);
        list(&mut rig.env(), "*.bin", false).unwrap();
        assert!(rig.output().ends_with("No files found\r\n"));
    }

    #[test]
    fn missing_directory_is_error() {
        let mut rig = Rig::new();
        assert!(list(&mut rig.env(), "/nowhere", false).is_err());
        assert!(rig.output().is_empty());
    }

    #[test]
    fn colours_avoid_text_colours() {
        let mut rig = rig_with(&["/file"], &["/dir"]);
        rig.console.palette = true;
        rig.console.fg = 2;
        rig.console.bg = 3;
        list(&mut rig.env(), ".", false).unwrap();
        let out = &rig.console.output;
        // Directory tinted 4 (2 and 3 are taken), files in the text colour.
        let dir_at = out.windows(2).position(|w| w == [VDU_COLOUR, 4]).unwrap();
        let file_at = out.windows(2).position(|w| w == [VDU_COLOUR, 2]).unwrap();
        assert!(dir_at < file_at);
        assert_eq!(&out[out.len() - 2..], &[VDU_COLOUR, 2]);
    }

    #[test]
    fn two_colour_mode_is_plain() {
        let mut rig = rig_with(&["/file"], &[]);
        rig.console.palette = true;
        rig.console.colours = 2;
        list(&mut rig.env(), ".", false).unwrap();
        assert!(!rig.console.output.contains(&VDU_COLOUR));
    }

    #[test]
    fn fallback_lists_same_entries() {
        for fail_at in 0..5 {
            let mut rig = rig_with(&["/Zeta", "/Beta"], &["/alpha"]);
            rig.heap.fail_after(fail_at);
            list(&mut rig.env(), ".", false).unwrap();
            let out = rig.output();
            for name in ["alpha", "Beta", "Zeta"] {
                assert!(out.contains(name), "fail_at {fail_at}: {out}");
            }
            assert_eq!(out.matches("Volume:").count(), 1, "{out}");
            assert_eq!(rig.heap.live(), 0);
        }
    }

    #[test]
    fn fallback_respects_pattern() {
        let mut rig = rig_with(&["/a.bin", "/b.txt"], &[]);
        rig.heap.fail_after(0);
        list(&mut rig.env(), "*.bin", true).unwrap();
        let out = rig.output();
        assert!(out.contains("a.bin") && !out.contains("b.txt"), "{out}");
    }

    #[test]
    fn heap_is_balanced_after_listing() {
        let mut rig = rig_with(&["/a", "/b"], &["/c"]);
        list(&mut rig.env(), ".", true).unwrap();
        assert_eq!(rig.heap.live(), 0);
        assert!(rig.heap.total() >= 5);
        assert_eq!(rig.vfs.open_dirs(), 0);
    }
}
