//! Splitting wildcard paths and walking their matches.
//!
//! `DIR`, `DEL`, `REN` and `COPY` all take a path whose last component may
//! carry `*` or `?`. [`split`] decides whether the input names one path or
//! a directory plus a pattern, and [`for_each_match`] enumerates the
//! pattern through the driver's find primitives, closing the directory on
//! every exit.

use std::cmp::Ordering;

use mos_types::error::Result;
use mos_types::heap::{Heap, HeapString};
use mos_vfs::glob::has_wildcard;
use mos_vfs::{DirEntry, Vfs, with_dir};

/// A command path argument after splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSplit<'a> {
    /// No wildcard in the last component: the input is the target.
    Single(&'a str),
    /// Enumerate `dir` (`""` is the current directory) for `pattern`.
    Pattern { dir: &'a str, pattern: &'a str },
}

/// Decompose a path argument.
pub fn split(input: &str) -> PathSplit<'_> {
    let (dir, last) = match input.rfind('/') {
        None => ("", input),
        Some(0) => ("/", &input[1..]),
        Some(i) => (&input[..i], &input[i + 1..]),
    };
    if has_wildcard(last) {
        PathSplit::Pattern { dir, pattern: last }
    } else {
        PathSplit::Single(input)
    }
}

/// A split copied onto the firmware heap.
#[derive(Debug)]
pub struct OwnedSplit {
    pub dir: HeapString,
    pub pattern: Option<HeapString>,
}

impl PathSplit<'_> {
    /// Heap copies of the directory and pattern. A single path is stored
    /// as its own directory with no pattern.
    pub fn to_heap(&self, heap: &Heap) -> Result<OwnedSplit> {
        Ok(match *self {
            PathSplit::Single(path) => OwnedSplit {
                dir: heap.alloc_str(path)?,
                pattern: None,
            },
            PathSplit::Pattern { dir, pattern } => {
                let dir = heap.alloc_str(dir)?;
                let pattern = heap.alloc_str(pattern)?;
                OwnedSplit {
                    dir,
                    pattern: Some(pattern),
                }
            },
        })
    }
}

/// The path to hand the driver when opening `dir`.
pub fn dir_to_open(dir: &str) -> &str {
    if dir.is_empty() { "." } else { dir }
}

/// `dir/name`, without doubling a trailing separator. An empty `dir`
/// leaves `name` relative to the current directory.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// [`join`] onto the heap.
pub fn join_on(heap: &Heap, dir: &str, name: &str) -> Result<HeapString> {
    heap.alloc_str(&join(dir, name))
}

/// Last component of a path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Whether `path` names a directory. The `.`, `..` and `/` tokens always do.
pub fn is_directory<V: Vfs + ?Sized>(vfs: &V, path: &str) -> bool {
    matches!(path, "." | ".." | "/") || vfs.is_dir(path)
}

/// Continue or stop a match walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Call `f` with each entry of `dir` matching `pattern`. The directory is
/// closed however the walk ends.
pub fn for_each_match<V, F>(vfs: &mut V, dir: &str, pattern: &str, mut f: F) -> Result<()>
where
    V: Vfs + ?Sized,
    F: FnMut(&mut V, &DirEntry) -> Result<Flow>,
{
    with_dir(vfs, dir_to_open(dir), |vfs, dh| {
        while let Some(entry) = vfs.find_next(dh, pattern)? {
            if f(vfs, &entry)? == Flow::Stop {
                break;
            }
        }
        Ok(())
    })
}

/// Case-insensitive name order (ASCII folding, as FAT does).
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mos_vfs::MemoryVfs;

    #[test]
    fn split_rules() {
        assert_eq!(split("*.tmp"), PathSplit::Pattern {
            dir: "",
            pattern: "*.tmp"
        });
        assert_eq!(split("."), PathSplit::Single("."));
        assert_eq!(split("/*.bin"), PathSplit::Pattern {
            dir: "/",
            pattern: "*.bin"
        });
        assert_eq!(split("/games"), PathSplit::Single("/games"));
        assert_eq!(split("games/a?.txt"), PathSplit::Pattern {
            dir: "games",
            pattern: "a?.txt"
        });
        assert_eq!(split("games/sub"), PathSplit::Single("games/sub"));
        assert_eq!(split("games/"), PathSplit::Single("games/"));
    }

    #[test]
    fn wildcard_in_directory_part_is_single() {
        assert_eq!(split("g*/x.txt"), PathSplit::Single("g*/x.txt"));
    }

    #[test]
    fn joins() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("games", "a"), "games/a");
        assert_eq!(join("games/", "a"), "games/a");
        assert_eq!(base_name("/x/y.bin"), "y.bin");
        assert_eq!(base_name("y.bin"), "y.bin");
    }

    #[test]
    fn directory_tokens() {
        let mut vfs = MemoryVfs::new();
        vfs.mkdir_all("/games").unwrap();
        vfs.write_file("/a.txt", b"").unwrap();
        assert!(is_directory(&vfs, "."));
        assert!(is_directory(&vfs, ".."));
        assert!(is_directory(&vfs, "/"));
        assert!(is_directory(&vfs, "games"));
        assert!(!is_directory(&vfs, "a.txt"));
        assert!(!is_directory(&vfs, "missing"));
    }

    #[test]
    fn heap_copies_are_released() {
        let heap = Heap::new(1024);
        let owned = split("games/*.bin").to_heap(&heap).unwrap();
        assert_eq!(&*owned.dir, "games");
        assert_eq!(owned.pattern.as_deref(), Some("*.bin"));
        assert_eq!(heap.live(), 2);
        drop(owned);
        assert_eq!(heap.live(), 0);

        heap.fail_after(1);
        assert!(split("games/*.bin").to_heap(&heap).is_err());
        assert_eq!(heap.live(), 0);
    }

    #[test]
    fn walk_stops_and_closes() {
        let mut vfs = MemoryVfs::new();
        for name in ["a.tmp", "b.tmp", "c.txt"] {
            vfs.write_file(&format!("/{name}"), b"").unwrap();
        }
        let mut seen = Vec::new();
        for_each_match(&mut vfs, "", "*.tmp", |_, e| {
            seen.push(e.name.clone());
            Ok(Flow::Continue)
        })
        .unwrap();
        assert_eq!(seen, ["a.tmp", "b.tmp"]);

        let mut count = 0;
        for_each_match(&mut vfs, "/", "*", |_, _| {
            count += 1;
            Ok(Flow::Stop)
        })
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(vfs.open_dirs(), 0);
    }

    #[test]
    fn name_order_ignores_case() {
        assert_eq!(compare_names("alpha", "Beta"), Ordering::Less);
        assert_eq!(compare_names("ZETA", "zeta"), Ordering::Equal);
        assert_eq!(compare_names("b", "A"), Ordering::Greater);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn plain_paths_stay_single(path in "/?([a-z0-9]{1,8}/){0,3}[a-z0-9.]{1,12}") {
                prop_assert_eq!(split(&path), PathSplit::Single(&path));
            }

            #[test]
            fn pattern_rejoins_to_input(
                dir in "(/?[a-z]{1,6}(/[a-z]{1,6}){0,2})?",
                stem in "[a-z]{0,4}",
            ) {
                let input = if dir.is_empty() {
                    format!("{stem}*")
                } else {
                    format!("{dir}/{stem}*")
                };
                match split(&input) {
                    PathSplit::Pattern { dir: d, pattern } => {
                        prop_assert_eq!(join(d, pattern), input.clone());
                        prop_assert!(!pattern.contains('/'));
                    },
                    other => prop_assert!(false, "{other:?}"),
                }
            }
        }
    }
}
