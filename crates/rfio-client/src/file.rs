//! Seekable handle over one remote session.
//!
//! [`RemoteFile`] keeps its cursor on the client; every read and write names
//! an explicit offset on the wire. The size is captured at open time and is
//! not refreshed by later writes from this or any other handle.

use std::io::SeekFrom;

use tracing::{debug, trace};

use rfio_core::constants::MAX_READ_SIZE;
use rfio_core::error::{Error, Result};
use rfio_core::protocol::StatResponse;
use rfio_core::{CallContext, FileService};

use crate::transfer::TransferClient;

/// A remote file opened for random access.
pub struct RemoteFile<S: FileService + ?Sized + 'static> {
    client: TransferClient<S>,
    name: String,
    session: u64,
    offset: u64,
    size: u64,
    last_modified: i64,
    closed: bool,
}

impl<S: FileService + ?Sized + 'static> RemoteFile<S> {
    pub(crate) fn new(
        client: TransferClient<S>,
        name: String,
        session: u64,
        stat: &StatResponse,
    ) -> Self {
        Self {
            client,
            name,
            session,
            offset: 0,
            size: stat.len(),
            last_modified: stat.last_modified,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes as of open.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Modification time (unix seconds) as of open.
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    pub fn session_id(&self) -> u64 {
        self.session
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.offset
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Use `ctx` for every later call on this handle.
    pub fn with_context(mut self, ctx: CallContext) -> Self {
        self.client = self.client.with_context(ctx);
        self
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::HandleClosed);
        }
        Ok(())
    }

    /// Read at the cursor and advance it by the bytes returned.
    ///
    /// Returns 0 at end of file. At most `MAX_READ_SIZE` bytes are read per
    /// call.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.read_at(buf, self.offset).await?;
        self.offset += n as u64;
        Ok(n)
    }

    /// Write at the cursor and advance it by the bytes written.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.write_at(buf, self.offset).await?;
        self.offset += n as u64;
        Ok(n)
    }

    /// Move the cursor. `SeekFrom::End` is relative to the size at open.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_open()?;

        let (base, delta) = match pos {
            SeekFrom::Start(n) => {
                self.offset = n;
                return Ok(n);
            }
            SeekFrom::Current(d) => (self.offset, d),
            SeekFrom::End(d) => (self.size, d),
        };

        let target = base.checked_add_signed(delta).ok_or_else(|| Error::BadRequest {
            message: format!("invalid seek to {} from {}", delta, base),
        })?;
        self.offset = target;
        Ok(target)
    }

    /// Read at `offset` without moving the cursor.
    pub async fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(0);
        }

        let size = (buf.len() as u64).min(MAX_READ_SIZE);
        let chunk = self.client.read_at(self.session, offset, size).await?;
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk.data[..n]);
        trace!(session_id = self.session, offset, size = n, "Remote read");
        Ok(n)
    }

    /// Write at `offset` without moving the cursor.
    pub async fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        self.ensure_open()?;
        let n = self
            .client
            .write_at(self.session, offset, buf.to_vec())
            .await?;
        trace!(session_id = self.session, offset, size = n, "Remote write");
        Ok(n as usize)
    }

    /// Release the remote session.
    ///
    /// The handle is closed even if the server call fails. Closing twice
    /// returns [`Error::HandleClosed`].
    pub async fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;
        debug!(session_id = self.session, name = %self.name, "Closing remote file");
        self.client.close(self.session).await
    }
}

impl<S: FileService + ?Sized + 'static> Drop for RemoteFile<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Best effort: only possible from inside a runtime.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let client = self.client.with_context(CallContext::background());
            let session = self.session;
            debug!(session_id = session, "Closing dropped remote file");
            handle.spawn(async move {
                let _ = client.close(session).await;
            });
        }
    }
}

impl<S: FileService + ?Sized + 'static> std::fmt::Debug for RemoteFile<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFile")
            .field("name", &self.name)
            .field("session", &self.session)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("closed", &self.closed)
            .finish()
    }
}
