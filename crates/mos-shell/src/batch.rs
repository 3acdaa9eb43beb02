//! Delete, rename and copy over single paths or wildcard matches.
//!
//! Each operation stops at the first failing item and returns that error.
//! Paths built per item live on the firmware heap; running out of heap
//! aborts the batch with `Internal`.

use mos_types::error::{MosError, Result};
use mos_types::heap::{Heap, HeapString};
use mos_vfs::glob::has_wildcard;
use mos_vfs::{OpenMode, Vfs, with_file};

use crate::interpreter::Environment;
use crate::pattern::{Flow, PathSplit, base_name, for_each_match, is_directory, join_on, split};
use crate::services::{Console, LineInput};

/// Longest answer accepted at a delete prompt.
const ANSWER_LEN: usize = 6;

fn heap_str(heap: &Heap, text: &str) -> Result<HeapString> {
    heap.alloc_str(text).map_err(|_| MosError::Internal)
}

fn heap_join(heap: &Heap, dir: &str, name: &str) -> Result<HeapString> {
    join_on(heap, dir, name).map_err(|_| MosError::Internal)
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Yes,
    Cancel,
    /// Anything else, `No` included, ends the batch without a message.
    Other,
}

fn ask(console: &mut dyn Console, path: &str) -> Answer {
    console.write_str(&format!("Delete {path}? (Yes/No/Cancel) "));
    let input = console.edit_line(ANSWER_LEN);
    console.write_str("\r\n");
    let text = match input {
        LineInput::Confirmed(text) => text,
        LineInput::Cancelled => return Answer::Cancel,
    };
    let text = text.trim();
    if text.eq_ignore_ascii_case("yes") || text.eq_ignore_ascii_case("y") {
        Answer::Yes
    } else if text.eq_ignore_ascii_case("cancel") || text.eq_ignore_ascii_case("c") {
        Answer::Cancel
    } else {
        Answer::Other
    }
}

/// Delete one path, confirming first unless `force`.
fn delete_one(env: &mut Environment<'_>, path: &str, force: bool, verbose: bool) -> Result<Flow> {
    if force {
        if verbose {
            env.print(&format!("Deleting {path}\r\n"));
        }
        env.vfs.unlink(path)?;
        return Ok(Flow::Continue);
    }
    match ask(env.console, path) {
        Answer::Yes => {
            env.print(&format!("Deleting {path}.\r\n"));
            env.vfs.unlink(path)?;
            Ok(Flow::Continue)
        },
        Answer::Cancel => {
            env.print("Cancelled.\r\n");
            Ok(Flow::Stop)
        },
        Answer::Other => Ok(Flow::Stop),
    }
}

/// `DEL [-f] <path>`. Without `force` every target is confirmed first.
pub fn delete(env: &mut Environment<'_>, input: &str, force: bool, verbose: bool) -> Result<()> {
    let parts = split(input);
    let owned = parts.to_heap(env.heap).map_err(|_| MosError::Internal)?;
    match parts {
        PathSplit::Single(path) => delete_one(env, path, force, verbose).map(|_| ()),
        PathSplit::Pattern { .. } => {
            let dir = owned.dir.as_str();
            let pattern = owned.pattern.as_deref().unwrap_or("*");
            // Collect first: prompting needs the console while the walk
            // holds the driver.
            let names = matching_names(env, dir, pattern)?;
            let mut result = Ok(());
            for name in &names {
                let path = heap_join(env.heap, dir, name)?;
                match delete_one(env, &path, force, verbose) {
                    Ok(Flow::Continue) => {},
                    Ok(Flow::Stop) => break,
                    Err(e) => {
                        result = Err(e);
                        break;
                    },
                }
            }
            if verbose {
                env.print("\r\n");
            }
            result
        },
    }
}

/// Names in `dir` matching `pattern`, each held on the heap.
fn matching_names(env: &mut Environment<'_>, dir: &str, pattern: &str) -> Result<Vec<HeapString>> {
    let heap = env.heap;
    let mut names = Vec::new();
    for_each_match(&mut *env.vfs, dir, pattern, |_, entry| {
        names.push(heap_str(heap, &entry.name)?);
        Ok(Flow::Continue)
    })?;
    Ok(names)
}

// ---------------------------------------------------------------------------
// Rename and copy
// ---------------------------------------------------------------------------

/// Reject wildcard destinations and, for wildcard sources, destinations
/// that are not directories.
fn check_destination<V: Vfs + ?Sized>(vfs: &V, parts: &PathSplit<'_>, dst: &str) -> Result<()> {
    if has_wildcard(dst) {
        return Err(MosError::InvalidParameter);
    }
    if matches!(parts, PathSplit::Pattern { .. }) && !is_directory(vfs, dst) {
        return Err(MosError::InvalidParameter);
    }
    Ok(())
}

/// Apply `op(env, src, dst)` to every match of a wildcard source.
fn for_each_pair<F>(env: &mut Environment<'_>, dir: &str, pattern: &str, dst: &str, mut op: F) -> Result<()>
where
    F: FnMut(&mut Environment<'_>, &str, &str) -> Result<()>,
{
    let names = matching_names(env, dir, pattern)?;
    for name in &names {
        let src = heap_join(env.heap, dir, name)?;
        let target = heap_join(env.heap, dst, name)?;
        op(env, &src, &target)?;
    }
    Ok(())
}

/// `REN <src> <dst>`
pub fn rename(env: &mut Environment<'_>, src: &str, dst: &str, verbose: bool) -> Result<()> {
    let parts = split(src);
    check_destination(&*env.vfs, &parts, dst)?;
    let owned = parts.to_heap(env.heap).map_err(|_| MosError::Internal)?;
    match owned.pattern.as_deref() {
        None if is_directory(&*env.vfs, dst) => {
            let target = heap_join(env.heap, dst, base_name(src))?;
            env.vfs.rename(src, &target)
        },
        None => env.vfs.rename(src, dst),
        Some(pattern) => for_each_pair(env, &owned.dir, pattern, dst, |env, from, to| {
            if verbose {
                env.print(&format!("Moving {from} to {to}\r\n"));
            }
            env.vfs.rename(from, to)
        }),
    }
}

/// `COPY <src> <dst>`
pub fn copy(env: &mut Environment<'_>, src: &str, dst: &str, verbose: bool) -> Result<()> {
    let parts = split(src);
    check_destination(&*env.vfs, &parts, dst)?;
    let owned = parts.to_heap(env.heap).map_err(|_| MosError::Internal)?;
    match owned.pattern.as_deref() {
        None if is_directory(&*env.vfs, dst) => {
            let target = heap_join(env.heap, dst, base_name(src))?;
            copy_file(env, src, &target, verbose)
        },
        None => copy_file(env, src, dst, verbose),
        Some(pattern) => for_each_pair(env, &owned.dir, pattern, dst, |env, from, to| {
            copy_file(env, from, to, verbose)
        }),
    }
}

/// Stream `src` into a newly created `dst`. Both files are closed however
/// the copy ends; nothing is created when `src` cannot be opened.
fn copy_file(env: &mut Environment<'_>, src: &str, dst: &str, verbose: bool) -> Result<()> {
    let chunk = env.config.storage.copy_chunk;
    let console = &mut *env.console;
    with_file(&mut *env.vfs, src, OpenMode::READ, |vfs, input| {
        with_file(vfs, dst, OpenMode::WRITE | OpenMode::CREATE_NEW, |vfs, output| {
            if verbose {
                console.write_str(&format!("Copying {src} to {dst}\r\n"));
            }
            let mut buf = vec![0u8; chunk];
            loop {
                let n = vfs.read(input, &mut buf)?;
                if n == 0 {
                    return Ok(());
                }
                if vfs.write(output, &buf[..n])? < n {
                    return Err(MosError::Denied);
                }
            }
        })
    })
}
