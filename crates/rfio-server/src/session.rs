//! Session table: opaque numeric handles for open files.
//!
//! The table owns every open descriptor. Ids start at 1, strictly increase and
//! are never reused for the lifetime of a table. One lock covers the
//! bookkeeping; file I/O never happens under it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Mutex as AsyncMutex;
use tracing::trace;

use rfio_core::storage::StorageFile;

/// One open file registered in the table.
pub struct Session {
    id: u64,
    path: PathBuf,
    file: Arc<dyn StorageFile>,
    /// Serializes reads and writes issued against this session.
    io_lock: AsyncMutex<()>,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &Arc<dyn StorageFile> {
        &self.file
    }

    /// Acquire exclusive I/O access to this session.
    pub async fn lock_io(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.io_lock.lock().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

struct TableInner {
    next: u64,
    sessions: HashMap<u64, Arc<Session>>,
}

/// Thread-safe map from session id to open file.
pub struct SessionTable {
    inner: Mutex<TableInner>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TableInner {
                next: 1,
                sessions: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        // Bookkeeping stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an open file and return its new id.
    pub fn add(&self, file: Arc<dyn StorageFile>, path: PathBuf) -> u64 {
        let mut inner = self.lock();
        let id = inner.next;
        inner.next += 1;
        inner.sessions.insert(
            id,
            Arc::new(Session {
                id,
                path,
                file,
                io_lock: AsyncMutex::new(()),
            }),
        );
        trace!(session_id = id, "Session added");
        id
    }

    /// Look up a session.
    pub fn get(&self, id: u64) -> Option<Arc<Session>> {
        self.lock().sessions.get(&id).cloned()
    }

    /// Remove a session. Unknown ids are ignored.
    ///
    /// The descriptor is released once no in-flight call still holds the
    /// session.
    pub fn delete(&self, id: u64) {
        let removed = self.lock().sessions.remove(&id);
        if removed.is_some() {
            trace!(session_id = id, "Session deleted");
        }
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullFile;

    impl StorageFile for NullFile {
        fn read_at(&self, _buf: &mut [u8], _offset: u64) -> io::Result<usize> {
            Ok(0)
        }

        fn write_at(&self, data: &[u8], _offset: u64) -> io::Result<usize> {
            Ok(data.len())
        }
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl StorageFile for DropCounter {
        fn read_at(&self, _buf: &mut [u8], _offset: u64) -> io::Result<usize> {
            Ok(0)
        }

        fn write_at(&self, data: &[u8], _offset: u64) -> io::Result<usize> {
            Ok(data.len())
        }
    }

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn null() -> Arc<dyn StorageFile> {
        Arc::new(NullFile)
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let table = SessionTable::new();
        assert_eq!(table.add(null(), "a".into()), 1);
        assert_eq!(table.add(null(), "b".into()), 2);
        assert_eq!(table.add(null(), "c".into()), 3);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn ids_never_reused_after_delete() {
        let table = SessionTable::new();
        let mut seen = Vec::new();
        for i in 0..20 {
            let id = table.add(null(), format!("f{i}").into());
            seen.push(id);
            if i % 3 == 0 {
                table.delete(id);
            }
        }
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(table.len(), 13);
    }

    #[test]
    fn get_returns_registered_path() {
        let table = SessionTable::new();
        let id = table.add(null(), "/srv/data.bin".into());
        let session = table.get(id).unwrap();
        assert_eq!(session.id(), id);
        assert_eq!(session.path(), Path::new("/srv/data.bin"));
        assert!(table.get(id + 1).is_none());
    }

    #[test]
    fn delete_unknown_is_silent() {
        let table = SessionTable::new();
        table.delete(99);
        let id = table.add(null(), "x".into());
        table.delete(id);
        table.delete(id);
        assert!(table.is_empty());
    }

    #[test]
    fn descriptor_released_after_last_holder() {
        let drops = Arc::new(AtomicUsize::new(0));
        let table = SessionTable::new();
        let id = table.add(Arc::new(DropCounter(drops.clone())), "x".into());

        let in_flight = table.get(id).unwrap();
        table.delete(id);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(in_flight);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_adds_yield_unique_ids() {
        let table = Arc::new(SessionTable::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| table.add(null(), PathBuf::new()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&400));
    }

    #[tokio::test]
    async fn io_lock_is_exclusive() {
        let table = SessionTable::new();
        let id = table.add(null(), "x".into());
        let session = table.get(id).unwrap();

        let guard = session.lock_io().await;
        assert!(session.io_lock.try_lock().is_err());
        drop(guard);
        assert!(session.io_lock.try_lock().is_ok());
    }
}
