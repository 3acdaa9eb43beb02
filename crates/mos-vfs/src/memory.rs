//! In-memory volume.
//!
//! Behaves like a mounted FAT volume: names are case-insensitive but keep
//! the case they were created with, there is a current directory, and
//! directory enumeration returns entries in creation order. The whole tree
//! lives in a `BTreeMap` keyed by the lowercased absolute path.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, VecDeque};

use mos_types::error::{MosError, Result};
use mos_types::time::FatTimestamp;

use crate::{Attributes, DirEntry, DirHandle, FileHandle, OpenMode, Vfs};

#[derive(Debug, Clone)]
enum Content {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug, Clone)]
struct Node {
    /// Absolute path with the case it was created with.
    path: String,
    content: Content,
    stamp: FatTimestamp,
    attributes: u8,
    /// Creation order, used for enumeration order.
    seq: u64,
}

impl Node {
    fn is_dir(&self) -> bool {
        matches!(self.content, Content::Dir)
    }

    fn entry(&self) -> DirEntry {
        let (size, dir_bit) = match &self.content {
            Content::File(data) => (data.len() as u64, 0),
            Content::Dir => (0, Attributes::DIRECTORY),
        };
        DirEntry {
            name: leaf(&self.path).to_string(),
            size,
            date: self.stamp.date,
            time: self.stamp.time,
            attributes: Attributes(self.attributes | dir_bit),
        }
    }
}

#[derive(Debug)]
struct OpenFile {
    key: String,
    pos: u64,
    mode: OpenMode,
}

/// A fully in-memory volume.
#[derive(Debug)]
pub struct MemoryVfs {
    nodes: BTreeMap<String, Node>,
    cwd: String,
    label: String,
    /// Timestamp applied to created and modified entries.
    stamp: FatTimestamp,
    next_seq: u64,
    files: HashMap<u32, OpenFile>,
    dirs: HashMap<u32, VecDeque<DirEntry>>,
    next_handle: u32,
}

impl MemoryVfs {
    /// An empty, unlabelled volume.
    pub fn new() -> Self {
        Self::with_label("")
    }

    pub fn with_label(label: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node {
                path: "/".to_string(),
                content: Content::Dir,
                stamp: FatTimestamp::default(),
                attributes: 0,
                seq: 0,
            },
        );
        Self {
            nodes,
            cwd: "/".to_string(),
            label: label.to_string(),
            stamp: FatTimestamp::default(),
            next_seq: 1,
            files: HashMap::new(),
            dirs: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    /// Timestamp stamped on entries created or written from now on.
    pub fn set_timestamp(&mut self, stamp: FatTimestamp) {
        self.stamp = stamp;
    }

    /// Create a directory and any missing parents.
    pub fn mkdir_all(&mut self, path: &str) -> Result<()> {
        let abs = self.resolve(path)?;
        if abs == "/" {
            return Ok(());
        }
        let mut partial = String::new();
        for component in abs.split('/').filter(|c| !c.is_empty()) {
            partial.push('/');
            partial.push_str(component);
            match self.nodes.get(&key_of(&partial)) {
                Some(node) if node.is_dir() => {},
                Some(_) => return Err(MosError::NoPath),
                None => self.mkdir(&partial)?,
            }
        }
        Ok(())
    }

    /// Create or replace a file, making parent directories as needed.
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let abs = self.resolve(path)?;
        self.mkdir_all(parent(&abs))?;
        crate::write_all(self, &abs, data)
    }

    /// Whole contents of a file.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let (_, node) = self.lookup(path)?;
        match &node.content {
            Content::File(data) => Ok(data.clone()),
            Content::Dir => Err(MosError::NoFile),
        }
    }

    /// Replace the non-directory attribute bits of an entry.
    pub fn set_attributes(&mut self, path: &str, attributes: u8) -> Result<()> {
        let (key, _) = self.lookup(path)?;
        if let Some(node) = self.nodes.get_mut(&key) {
            node.attributes = attributes & !Attributes::DIRECTORY;
        }
        Ok(())
    }

    /// Number of files currently open.
    pub fn open_files(&self) -> usize {
        self.files.len()
    }

    /// Number of directory enumerations currently open.
    pub fn open_dirs(&self) -> usize {
        self.dirs.len()
    }

    /// Names of the direct children of `path`, in enumeration order.
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        let (key, node) = self.lookup(path)?;
        if !node.is_dir() {
            return Err(MosError::NoPath);
        }
        Ok(self.children(&key).into_iter().map(|e| e.name).collect())
    }

    // -- path handling --------------------------------------------------

    /// Turn `path` into an absolute path with `.` and `..` resolved.
    fn resolve(&self, path: &str) -> Result<String> {
        let joined: Cow<'_, str> = if path.starts_with('/') {
            Cow::Borrowed(path)
        } else {
            Cow::Owned(format!("{}/{path}", self.cwd))
        };
        let mut parts: Vec<&str> = Vec::new();
        for component in joined.split('/') {
            match component {
                "" | "." => {},
                ".." => {
                    parts.pop();
                },
                name => {
                    if !valid_name(name) {
                        return Err(MosError::InvalidName);
                    }
                    parts.push(name);
                },
            }
        }
        if parts.is_empty() {
            Ok("/".to_string())
        } else {
            Ok(format!("/{}", parts.join("/")))
        }
    }

    /// Find an existing node. Distinguishes a missing leaf (`NoFile`) from a
    /// missing parent (`NoPath`).
    fn lookup(&self, path: &str) -> Result<(String, &Node)> {
        let abs = self.resolve(path)?;
        let key = key_of(&abs);
        match self.nodes.get(&key) {
            Some(node) => Ok((key, node)),
            None => Err(self.missing(&abs)),
        }
    }

    fn missing(&self, abs: &str) -> MosError {
        match self.nodes.get(&key_of(parent(abs))) {
            Some(node) if node.is_dir() => MosError::NoFile,
            _ => MosError::NoPath,
        }
    }

    /// Case-preserving path for a new entry: the parent's stored path plus
    /// the leaf as typed. Fails when the parent is missing.
    fn new_path(&self, abs: &str) -> Result<String> {
        match self.nodes.get(&key_of(parent(abs))) {
            Some(p) if p.is_dir() => Ok(join(&p.path, leaf(abs))),
            _ => Err(MosError::NoPath),
        }
    }

    fn insert(&mut self, path: String, content: Content) {
        let attributes = match content {
            Content::File(_) => Attributes::ARCHIVE,
            Content::Dir => 0,
        };
        let node = Node {
            path,
            content,
            stamp: self.stamp,
            attributes,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.nodes.insert(key_of(&node.path), node);
    }

    fn children(&self, key: &str) -> Vec<DirEntry> {
        let prefix = child_prefix(key);
        let mut nodes: Vec<&Node> = self
            .nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| {
                let rest = &k[prefix.len()..];
                !rest.is_empty() && !rest.contains('/')
            })
            .map(|(_, n)| n)
            .collect();
        nodes.sort_by_key(|n| n.seq);
        nodes.into_iter().map(Node::entry).collect()
    }

    fn has_children(&self, key: &str) -> bool {
        let prefix = child_prefix(key);
        self.nodes
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    /// Whether `key` or anything under it is held open.
    fn is_open(&self, key: &str) -> bool {
        let prefix = child_prefix(key);
        self.files
            .values()
            .any(|f| f.key == key || f.key.starts_with(&prefix))
    }

    fn alloc_handle(&mut self) -> u32 {
        let h = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        h
    }

    fn open_file(&self, fh: FileHandle) -> Result<&OpenFile> {
        self.files.get(&fh.0).ok_or(MosError::InvalidObject)
    }

    fn file_data(&self, key: &str) -> Result<&Vec<u8>> {
        match self.nodes.get(key).map(|n| &n.content) {
            Some(Content::File(data)) => Ok(data),
            _ => Err(MosError::InvalidObject),
        }
    }
}

impl Default for MemoryVfs {
    fn default() -> Self {
        Self::new()
    }
}

fn key_of(path: &str) -> String {
    path.to_lowercase()
}

fn child_prefix(key: &str) -> String {
    if key == "/" {
        "/".to_string()
    } else {
        format!("{key}/")
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Parent of an absolute, normalized path.
fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn leaf(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) if path.len() > 1 => &path[i + 1..],
        _ => path,
    }
}

/// FAT long-name rules: no wildcards, no reserved punctuation, no controls.
fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_control() || matches!(c, '*' | '?' | '"' | ':' | '<' | '>' | '|' | '\\'))
}

impl Vfs for MemoryVfs {
    fn mount(&mut self) -> Result<()> {
        self.files.clear();
        self.dirs.clear();
        self.cwd = "/".to_string();
        log::info!("Mounted volume '{}'", self.label);
        Ok(())
    }

    fn volume_label(&self) -> Result<String> {
        Ok(self.label.clone())
    }

    fn current_dir(&self) -> Result<String> {
        Ok(self.cwd.clone())
    }

    fn change_dir(&mut self, path: &str) -> Result<()> {
        let (_, node) = self.lookup(path).map_err(|_| MosError::NoPath)?;
        if !node.is_dir() {
            return Err(MosError::NoPath);
        }
        self.cwd = node.path.clone();
        Ok(())
    }

    fn stat(&self, path: &str) -> Result<DirEntry> {
        let (_, node) = self.lookup(path)?;
        Ok(node.entry())
    }

    fn mkdir(&mut self, path: &str) -> Result<()> {
        let abs = self.resolve(path)?;
        if self.nodes.contains_key(&key_of(&abs)) {
            return Err(MosError::Exists);
        }
        let stored = self.new_path(&abs)?;
        self.insert(stored, Content::Dir);
        Ok(())
    }

    fn unlink(&mut self, path: &str) -> Result<()> {
        let (key, node) = self.lookup(path)?;
        if key == "/" || node.attributes & Attributes::READ_ONLY != 0 {
            return Err(MosError::Denied);
        }
        if node.is_dir() && (self.has_children(&key) || key == key_of(&self.cwd)) {
            return Err(MosError::Denied);
        }
        if self.is_open(&key) {
            return Err(MosError::Locked);
        }
        self.nodes.remove(&key);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let (from_key, node) = self.lookup(from)?;
        if from_key == "/" {
            return Err(MosError::Denied);
        }
        let from_path = node.path.clone();
        let to_abs = self.resolve(to)?;
        let to_key = key_of(&to_abs);
        if to_key != from_key && self.nodes.contains_key(&to_key) {
            return Err(MosError::Exists);
        }
        let from_prefix = child_prefix(&from_key);
        if to_key.starts_with(&from_prefix) {
            return Err(MosError::InvalidName);
        }
        if self.is_open(&from_key) {
            return Err(MosError::Locked);
        }
        let new_root = self.new_path(&to_abs)?;

        // Descendants' stored paths always extend the stored path of the
        // entry being moved.
        let moved: Vec<String> = self
            .nodes
            .range(from_key.clone()..)
            .take_while(|(k, _)| k.starts_with(from_key.as_str()))
            .filter(|(k, _)| **k == from_key || k.starts_with(&from_prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for old_key in moved {
            if let Some(mut node) = self.nodes.remove(&old_key) {
                node.path = format!("{new_root}{}", &node.path[from_path.len()..]);
                if old_key == from_key {
                    node.seq = self.next_seq;
                    self.next_seq += 1;
                }
                self.nodes.insert(key_of(&node.path), node);
            }
        }

        let cwd_key = key_of(&self.cwd);
        if cwd_key == from_key || cwd_key.starts_with(&from_prefix) {
            self.cwd = format!("{new_root}{}", &self.cwd[from_path.len()..]);
        }
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle> {
        let abs = self.resolve(path)?;
        let key = key_of(&abs);
        let writable = mode.contains(OpenMode::WRITE);
        match self.nodes.get(&key) {
            Some(node) if node.is_dir() => return Err(MosError::Denied),
            Some(_) if mode.contains(OpenMode::CREATE_NEW) => return Err(MosError::Exists),
            Some(node) => {
                if writable && node.attributes & Attributes::READ_ONLY != 0 {
                    return Err(MosError::Denied);
                }
                if mode.contains(OpenMode::CREATE_ALWAYS) {
                    let stamp = self.stamp;
                    if let Some(node) = self.nodes.get_mut(&key) {
                        node.content = Content::File(Vec::new());
                        node.stamp = stamp;
                    }
                }
            },
            None => {
                let creates = mode.contains(OpenMode::CREATE_NEW)
                    || mode.contains(OpenMode::CREATE_ALWAYS)
                    || mode.contains(OpenMode::OPEN_ALWAYS);
                if !creates {
                    return Err(self.missing(&abs));
                }
                let stored = self.new_path(&abs)?;
                self.insert(stored, Content::File(Vec::new()));
            },
        }
        let pos = if mode.contains(OpenMode::APPEND) {
            self.file_data(&key)?.len() as u64
        } else {
            0
        };
        let h = self.alloc_handle();
        self.files.insert(h, OpenFile { key, pos, mode });
        Ok(FileHandle(h))
    }

    fn close(&mut self, fh: FileHandle) -> Result<()> {
        self.files
            .remove(&fh.0)
            .map(|_| ())
            .ok_or(MosError::InvalidObject)
    }

    fn read(&mut self, fh: FileHandle, buf: &mut [u8]) -> Result<usize> {
        let file = self.open_file(fh)?;
        if !file.mode.contains(OpenMode::READ) {
            return Err(MosError::Denied);
        }
        let data = self.file_data(&file.key)?;
        let start = (file.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        if let Some(file) = self.files.get_mut(&fh.0) {
            file.pos += n as u64;
        }
        Ok(n)
    }

    fn write(&mut self, fh: FileHandle, data: &[u8]) -> Result<usize> {
        let file = self.open_file(fh)?;
        if !file.mode.contains(OpenMode::WRITE) {
            return Err(MosError::Denied);
        }
        let (key, pos) = (file.key.clone(), file.pos as usize);
        let stamp = self.stamp;
        match self.nodes.get_mut(&key) {
            Some(Node {
                content: Content::File(bytes),
                stamp: node_stamp,
                ..
            }) => {
                if bytes.len() < pos + data.len() {
                    bytes.resize(pos + data.len(), 0);
                }
                bytes[pos..pos + data.len()].copy_from_slice(data);
                *node_stamp = stamp;
            },
            _ => return Err(MosError::InvalidObject),
        }
        if let Some(file) = self.files.get_mut(&fh.0) {
            file.pos += data.len() as u64;
        }
        Ok(data.len())
    }

    fn seek(&mut self, fh: FileHandle, offset: u64) -> Result<()> {
        let file = self.open_file(fh)?;
        let key = file.key.clone();
        let writable = file.mode.contains(OpenMode::WRITE);
        let len = self.file_data(&key)?.len() as u64;
        let target = if offset > len && writable {
            if let Some(Node {
                content: Content::File(bytes),
                ..
            }) = self.nodes.get_mut(&key)
            {
                bytes.resize(offset as usize, 0);
            }
            offset
        } else {
            offset.min(len)
        };
        if let Some(file) = self.files.get_mut(&fh.0) {
            file.pos = target;
        }
        Ok(())
    }

    fn tell(&self, fh: FileHandle) -> Result<u64> {
        Ok(self.open_file(fh)?.pos)
    }

    fn eof(&self, fh: FileHandle) -> Result<bool> {
        let file = self.open_file(fh)?;
        Ok(file.pos >= self.file_data(&file.key)?.len() as u64)
    }

    fn file_size(&self, fh: FileHandle) -> Result<u64> {
        let file = self.open_file(fh)?;
        Ok(self.file_data(&file.key)?.len() as u64)
    }

    fn open_dir(&mut self, path: &str) -> Result<DirHandle> {
        let (key, node) = self.lookup(path).map_err(|e| match e {
            MosError::NoFile => MosError::NoPath,
            other => other,
        })?;
        if !node.is_dir() {
            return Err(MosError::NoPath);
        }
        let snapshot = self.children(&key).into();
        let h = self.alloc_handle();
        self.dirs.insert(h, snapshot);
        Ok(DirHandle(h))
    }

    fn read_dir(&mut self, dh: DirHandle) -> Result<Option<DirEntry>> {
        self.dirs
            .get_mut(&dh.0)
            .map(VecDeque::pop_front)
            .ok_or(MosError::InvalidObject)
    }

    fn close_dir(&mut self, dh: DirHandle) -> Result<()> {
        self.dirs
            .remove(&dh.0)
            .map(|_| ())
            .ok_or(MosError::InvalidObject)
    }
}
