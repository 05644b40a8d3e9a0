//! Storage capability used by the file service.
//!
//! The service never names a concrete backend; it resolves paths and hands
//! them to a [`Storage`]. Two backends ship with rfio:
//!
//! - [`OsStorage`]: the local filesystem with positional I/O
//! - [`MemoryStorage`]: a shared in-memory tree, used for tests and `--fs memory`
//!
//! Storage calls are synchronous. Async callers run them on the blocking pool.

mod memory;
mod os;

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub use memory::{MAX_MEMORY_FILE_LEN, MemoryStorage};
pub use os::OsStorage;

use crate::protocol::FileKind;

/// Metadata for a stored path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub kind: FileKind,
    pub len: u64,
    pub modified: SystemTime,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Modification time in unix seconds. Times before the epoch are negative.
    pub fn modified_unix(&self) -> i64 {
        match self.modified.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        }
    }
}

/// An open file supporting positional reads and writes.
///
/// Implementations must be safe to share across threads; callers serialize
/// access per session when ordering matters.
pub trait StorageFile: Send + Sync {
    /// Read into `buf` starting at `offset`.
    ///
    /// Fills `buf` unless end-of-stream is reached first, so a return value
    /// smaller than `buf.len()` means end-of-stream.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Write all of `data` at `offset`, returning the number of bytes written.
    fn write_at(&self, data: &[u8], offset: u64) -> io::Result<usize>;
}

/// Backend supplying file handles and metadata.
pub trait Storage: Send + Sync {
    /// Open an existing file for reading and writing.
    ///
    /// Falls back to read-only access when the backend refuses write access.
    fn open(&self, path: &Path) -> io::Result<Arc<dyn StorageFile>>;

    /// Create a file, truncating it if it exists.
    fn create(&self, path: &Path) -> io::Result<Arc<dyn StorageFile>>;

    fn stat(&self, path: &Path) -> io::Result<Metadata>;

    fn remove(&self, path: &Path) -> io::Result<()>;
}
