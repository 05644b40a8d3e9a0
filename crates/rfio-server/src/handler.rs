//! Server-side file service.
//!
//! Implements the six session-keyed operations against a [`Storage`] backend
//! and a per-handler [`SessionTable`]. All paths are resolved lexically under
//! the handler's root; the server keeps no cursor.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use rfio_core::constants::MAX_READ_SIZE;
use rfio_core::error::{Error, Result};
use rfio_core::protocol::{ReadResponse, StatResponse};
use rfio_core::storage::{Storage, StorageFile};
use rfio_core::FileService;

use crate::session::SessionTable;

/// File service rooted at a directory of a storage backend.
pub struct FileHandler {
    root: PathBuf,
    storage: Arc<dyn Storage>,
    table: SessionTable,
}

/// A filename resolved under the root.
struct Resolved {
    /// Path handed to storage.
    full: PathBuf,
    /// Root-relative form used in error messages.
    display: String,
}

impl FileHandler {
    /// Create a handler serving `root` from `storage`.
    ///
    /// Fails if `root` does not exist or is not a directory.
    pub fn new(root: impl Into<PathBuf>, storage: Arc<dyn Storage>) -> Result<Self> {
        let mut root = Self::normalize(&root.into());
        if root.as_os_str().is_empty() {
            root = PathBuf::from(".");
        }
        let meta = storage.stat(&root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound {
                message: format!("root {}: {}", root.display(), e),
            },
            _ => Error::Internal {
                message: format!("root {}: {}", root.display(), e),
            },
        })?;
        if !meta.is_dir() {
            return Err(Error::BadRequest {
                message: format!("root {} is not a directory", root.display()),
            });
        }

        debug!(root = %root.display(), "File handler ready");
        Ok(Self {
            root,
            storage,
            table: SessionTable::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.table
    }

    /// Resolve a client filename under the root without touching storage.
    ///
    /// A leading `/` is relative to the root. `..` may not climb above it.
    fn resolve_path(&self, filename: &str) -> Result<Resolved> {
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

        for comp in Path::new(filename).components() {
            match comp {
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(Error::BadRequest {
                            message: format!("path escapes root: {}", filename),
                        });
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
                Component::Normal(part) => parts.push(part),
            }
        }

        let mut full = self.root.clone();
        let mut display = String::new();
        for part in &parts {
            full.push(part);
            display.push('/');
            display.push_str(&part.to_string_lossy());
        }
        if display.is_empty() {
            display.push('/');
        }

        Ok(Resolved { full, display })
    }

    /// Normalize a path by removing `.` and `..` components without hitting storage.
    fn normalize(path: &Path) -> PathBuf {
        let mut normalized = PathBuf::new();

        for comp in path.components() {
            match comp {
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) | Component::Normal(_) => {
                    normalized.push(comp.as_os_str());
                }
            }
        }

        normalized
    }

    fn register(&self, file: Arc<dyn StorageFile>, resolved: Resolved) -> u64 {
        let id = self.table.add(file, resolved.full);
        debug!(session_id = id, path = %resolved.display, "Session opened");
        id
    }
}

/// Run a storage call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal {
            message: format!("storage task failed: {}", e),
        })?
        .map_err(Error::Io)
}

fn not_found_or_internal(op: &str, path: &str, err: Error) -> Error {
    match err {
        Error::Io(e) if e.kind() == io::ErrorKind::NotFound => Error::NotFound {
            message: format!("{} {}: no such file or directory", op, path),
        },
        Error::Io(e) => Error::Internal {
            message: format!("{} {}: {}", op, path, e),
        },
        other => other,
    }
}

fn internal(op: &str, detail: impl std::fmt::Display, err: Error) -> Error {
    match err {
        Error::Io(e) => Error::Internal {
            message: format!("{} {}: {}", op, detail, e),
        },
        other => other,
    }
}

#[async_trait]
impl FileService for FileHandler {
    async fn open(&self, filename: &str) -> Result<u64> {
        let resolved = self.resolve_path(filename)?;
        trace!(path = %resolved.display, "Open");

        let storage = self.storage.clone();
        let full = resolved.full.clone();
        let meta = blocking(move || storage.stat(&full))
            .await
            .map_err(|e| not_found_or_internal("open", &resolved.display, e))?;
        if meta.is_dir() {
            return Err(Error::BadRequest {
                message: format!("open {}: is a directory", resolved.display),
            });
        }

        let storage = self.storage.clone();
        let full = resolved.full.clone();
        let file = blocking(move || storage.open(&full))
            .await
            .map_err(|e| not_found_or_internal("open", &resolved.display, e))?;

        Ok(self.register(file, resolved))
    }

    async fn create(&self, filename: &str) -> Result<u64> {
        let resolved = self.resolve_path(filename)?;
        trace!(path = %resolved.display, "Create");

        let storage = self.storage.clone();
        let full = resolved.full.clone();
        let file = blocking(move || storage.create(&full))
            .await
            .map_err(|e| internal("create", &resolved.display, e))?;

        Ok(self.register(file, resolved))
    }

    async fn stat(&self, filename: &str) -> Result<StatResponse> {
        let resolved = self.resolve_path(filename)?;
        trace!(path = %resolved.display, "Stat");

        let storage = self.storage.clone();
        let full = resolved.full.clone();
        let meta = blocking(move || storage.stat(&full))
            .await
            .map_err(|e| not_found_or_internal("stat", &resolved.display, e))?;

        Ok(StatResponse {
            kind: meta.kind,
            size: (!meta.is_dir()).then_some(meta.len),
            last_modified: meta.modified_unix(),
        })
    }

    async fn read(&self, id: u64, offset: u64, size: u64) -> Result<ReadResponse> {
        let session = self.table.get(id).ok_or(Error::InvalidSession(id))?;
        if size > MAX_READ_SIZE {
            return Err(Error::BadRequest {
                message: format!("read size {} exceeds maximum {}", size, MAX_READ_SIZE),
            });
        }

        let _io = session.lock_io().await;
        let file = session.file().clone();
        let (mut data, n) = blocking(move || {
            let mut buf = vec![0u8; size as usize];
            let n = file.read_at(&mut buf, offset)?;
            Ok((buf, n))
        })
        .await
        .map_err(|e| internal("read", format!("session {}", id), e))?;

        data.truncate(n);
        let eof = (n as u64) < size;
        trace!(session_id = id, offset, size, read = n, eof, "Read");
        Ok(ReadResponse::new(data, eof))
    }

    async fn write(&self, id: u64, offset: u64, data: Vec<u8>) -> Result<u64> {
        let session = self.table.get(id).ok_or(Error::InvalidSession(id))?;

        let _io = session.lock_io().await;
        let file = session.file().clone();
        let len = data.len();
        let n = blocking(move || file.write_at(&data, offset))
            .await
            .map_err(|e| internal("write", format!("session {}", id), e))?;

        trace!(session_id = id, offset, size = len, written = n, "Write");
        Ok(n as u64)
    }

    async fn close(&self, id: u64) -> Result<()> {
        trace!(session_id = id, "Close");
        self.table.delete(id);
        Ok(())
    }
}
