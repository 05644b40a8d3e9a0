//! In-memory backend.
//!
//! Files live in a shared map keyed by path. Handles keep the file contents
//! alive after `remove`, matching unlinked-but-open semantics on Unix.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use super::{Metadata, Storage, StorageFile};
use crate::protocol::FileKind;

/// Largest length a single in-memory file may grow to (4 GiB).
pub const MAX_MEMORY_FILE_LEN: u64 = 4 * 1024 * 1024 * 1024;

#[derive(Debug)]
struct FileData {
    bytes: Vec<u8>,
    modified: SystemTime,
}

type SharedData = Arc<RwLock<FileData>>;

#[derive(Debug, Default)]
struct Tree {
    files: HashMap<PathBuf, SharedData>,
    dirs: HashSet<PathBuf>,
}

impl Tree {
    fn is_dir(&self, path: &Path) -> bool {
        if path.parent().is_none() || self.dirs.contains(path) {
            return true;
        }
        self.files
            .keys()
            .any(|f| f != path && f.starts_with(path))
    }

    fn parent_exists(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.is_dir(parent),
            _ => true,
        }
    }
}

/// Storage backed by a shared in-memory tree.
///
/// Directories are either created explicitly with [`create_dir_all`] or
/// implied by the ancestors of stored files. The filesystem root always
/// exists. Clones share the same tree.
///
/// [`create_dir_all`]: MemoryStorage::create_dir_all
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tree: Arc<RwLock<Tree>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` and all of its ancestors as directories.
    pub fn create_dir_all(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut tree = self.tree.write().map_err(poisoned)?;
        for dir in path.as_ref().ancestors() {
            if tree.files.contains_key(dir) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is a file", dir.display()),
                ));
            }
            tree.dirs.insert(dir.to_path_buf());
        }
        Ok(())
    }

    /// Snapshot of a file's contents.
    pub fn contents(&self, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        let tree = self.tree.read().map_err(poisoned)?;
        let data = tree.files.get(path.as_ref()).ok_or_else(|| not_found(path.as_ref()))?;
        let data = data.read().map_err(poisoned)?;
        Ok(data.bytes.clone())
    }

    /// Store a file with the given contents, replacing any previous one.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) -> io::Result<()> {
        let mut tree = self.tree.write().map_err(poisoned)?;
        tree.files.insert(
            path.into(),
            Arc::new(RwLock::new(FileData {
                bytes,
                modified: SystemTime::now(),
            })),
        );
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> io::Error {
    io::Error::other("memory storage lock poisoned")
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

fn is_a_directory(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::IsADirectory,
        format!("{}: is a directory", path.display()),
    )
}

struct MemoryFile {
    data: SharedData,
}

impl StorageFile for MemoryFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let data = self.data.read().map_err(poisoned)?;
        let len = data.bytes.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(data.bytes.len() - start);
        buf[..n].copy_from_slice(&data.bytes[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, src: &[u8], offset: u64) -> io::Result<usize> {
        let end = offset
            .checked_add(src.len() as u64)
            .filter(|&end| end <= MAX_MEMORY_FILE_LEN)
            .and_then(|end| usize::try_from(end).ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("write at offset {} exceeds in-memory file limit", offset),
                )
            })?;

        let mut data = self.data.write().map_err(poisoned)?;
        if data.bytes.len() < end {
            let additional = end - data.bytes.len();
            data.bytes
                .try_reserve(additional)
                .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
            data.bytes.resize(end, 0);
        }
        data.bytes[offset as usize..end].copy_from_slice(src);
        data.modified = SystemTime::now();
        Ok(src.len())
    }
}

impl Storage for MemoryStorage {
    fn open(&self, path: &Path) -> io::Result<Arc<dyn StorageFile>> {
        let tree = self.tree.read().map_err(poisoned)?;
        match tree.files.get(path) {
            Some(data) => Ok(Arc::new(MemoryFile { data: data.clone() })),
            None if tree.is_dir(path) => Err(is_a_directory(path)),
            None => Err(not_found(path)),
        }
    }

    fn create(&self, path: &Path) -> io::Result<Arc<dyn StorageFile>> {
        let mut tree = self.tree.write().map_err(poisoned)?;
        if tree.is_dir(path) {
            return Err(is_a_directory(path));
        }
        if !tree.parent_exists(path) {
            return Err(not_found(path));
        }

        let data = match tree.files.get(path) {
            Some(existing) => {
                let mut guard = existing.write().map_err(poisoned)?;
                guard.bytes.clear();
                guard.modified = SystemTime::now();
                existing.clone()
            }
            None => {
                let data = Arc::new(RwLock::new(FileData {
                    bytes: Vec::new(),
                    modified: SystemTime::now(),
                }));
                tree.files.insert(path.to_path_buf(), data.clone());
                data
            }
        };
        Ok(Arc::new(MemoryFile { data }))
    }

    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        let tree = self.tree.read().map_err(poisoned)?;
        if let Some(data) = tree.files.get(path) {
            let data = data.read().map_err(poisoned)?;
            return Ok(Metadata {
                kind: FileKind::File,
                len: data.bytes.len() as u64,
                modified: data.modified,
            });
        }
        if tree.is_dir(path) {
            return Ok(Metadata {
                kind: FileKind::Directory,
                len: 0,
                modified: SystemTime::UNIX_EPOCH,
            });
        }
        Err(not_found(path))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.tree.write().map_err(poisoned)?;
        if tree.files.remove(path).is_some() {
            return Ok(());
        }
        if tree.dirs.remove(path) {
            return Ok(());
        }
        Err(not_found(path))
    }
}
