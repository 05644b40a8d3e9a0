//! Block transfer engine.
//!
//! [`TransferClient`] wraps any [`FileService`] with block arithmetic and the
//! sequential download/upload loops. Every call runs under the client's
//! [`CallContext`].

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use rfio_core::constants::{BLOCK_SIZE, CLEANUP_TIMEOUT, block_count, block_offset};
use rfio_core::error::{Error, Result};
use rfio_core::protocol::StatResponse;
use rfio_core::{CallContext, FileService};

use super::progress::{Direction, NoOpCallback, ProgressCallback, ProgressEvent};
use crate::file::RemoteFile;

/// Transfer statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferStats {
    /// Blocks moved (each one Read or Write call).
    pub blocks: u64,
    /// Payload bytes moved.
    pub bytes: u64,
    /// Wall-clock time of the transfer.
    pub duration_secs: f64,
}

/// Bytes returned by a positional read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadChunk {
    pub data: Vec<u8>,
    /// The server ran out of bytes before the requested size.
    pub eof: bool,
}

impl ReadChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Client for remote file sessions and block transfers.
///
/// Cheap to clone; clones share the underlying service.
pub struct TransferClient<S: ?Sized> {
    service: Arc<S>,
    ctx: CallContext,
    progress: Arc<dyn ProgressCallback>,
}

impl<S: ?Sized> Clone for TransferClient<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            ctx: self.ctx.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<S: FileService + ?Sized + 'static> TransferClient<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            ctx: CallContext::background(),
            progress: Arc::new(NoOpCallback),
        }
    }

    /// A client sharing this one's service whose calls all use `ctx`.
    pub fn with_context(&self, ctx: CallContext) -> Self {
        Self {
            service: self.service.clone(),
            ctx,
            progress: self.progress.clone(),
        }
    }

    /// Report transfer progress to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    // =========================================================================
    // Session calls
    // =========================================================================

    pub async fn stat(&self, name: &str) -> Result<StatResponse> {
        self.ctx.run(self.service.stat(name)).await
    }

    /// Open an existing file and return the raw session id.
    pub async fn open_session(&self, name: &str) -> Result<u64> {
        self.ctx.run(self.service.open(name)).await
    }

    /// Create or truncate a file and return the raw session id.
    pub async fn create(&self, name: &str) -> Result<u64> {
        self.ctx.run(self.service.create(name)).await
    }

    pub async fn read_at(&self, id: u64, offset: u64, size: u64) -> Result<ReadChunk> {
        let rsp = self.ctx.run(self.service.read(id, offset, size)).await?;
        Ok(ReadChunk {
            data: rsp.data,
            eof: rsp.eof,
        })
    }

    /// Read block `block` of session `id`.
    pub async fn get_block(&self, id: u64, block: u64) -> Result<ReadChunk> {
        self.read_at(id, offset_of(block)?, BLOCK_SIZE).await
    }

    pub async fn write_at(&self, id: u64, offset: u64, data: Vec<u8>) -> Result<u64> {
        self.ctx.run(self.service.write(id, offset, data)).await
    }

    /// Write `data` at the start of block `block` of session `id`.
    pub async fn set_block(&self, id: u64, block: u64, data: Vec<u8>) -> Result<u64> {
        self.write_at(id, offset_of(block)?, data).await
    }

    pub async fn close(&self, id: u64) -> Result<()> {
        self.ctx.run(self.service.close(id)).await
    }

    /// Open `name` as a seekable handle with a client-side cursor.
    pub async fn open(&self, name: &str) -> Result<RemoteFile<S>> {
        let stat = self.stat(name).await?;
        let id = self.open_session(name).await?;
        debug!(session_id = id, path = %name, size = stat.len(), "Remote file opened");
        Ok(RemoteFile::new(self.clone(), name.to_string(), id, &stat))
    }

    /// Close a session at the end of a transfer.
    ///
    /// Runs outside the client's context so a cancelled transfer still
    /// releases its session. Failures are logged, never returned.
    async fn close_quietly(&self, id: u64) {
        let ctx = CallContext::background().with_timeout(CLEANUP_TIMEOUT);
        if let Err(e) = ctx.run(self.service.close(id)).await {
            warn!(session_id = id, error = %e, "Failed to close remote session");
        }
    }

    // =========================================================================
    // Download
    // =========================================================================

    /// Download `remote` into the local file `local`.
    pub async fn download(&self, remote: &str, local: &Path) -> Result<TransferStats> {
        self.download_at(remote, local, 0).await
    }

    /// Download `remote` into `local` starting at block `start_block`.
    ///
    /// The local file is truncated only when starting from block 0, so a
    /// resumed download keeps the blocks already on disk.
    pub async fn download_at(
        &self,
        remote: &str,
        local: &Path,
        start_block: u64,
    ) -> Result<TransferStats> {
        offset_of(start_block)?;
        let stat = self.remote_file_stat(remote).await?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(start_block == 0)
            .open(local)
            .await?;

        info!(
            remote = %remote,
            local = %local.display(),
            start_block,
            "Starting download"
        );
        self.download_with_stat(remote, &stat, &mut file, start_block)
            .await
    }

    /// Download `remote` into an arbitrary seekable sink.
    ///
    /// Block `b` lands at byte `b * BLOCK_SIZE` of the sink.
    pub async fn download_to<W>(
        &self,
        remote: &str,
        sink: &mut W,
        start_block: u64,
    ) -> Result<TransferStats>
    where
        W: AsyncWrite + AsyncSeek + Unpin + Send,
    {
        offset_of(start_block)?;
        let stat = self.remote_file_stat(remote).await?;
        self.download_with_stat(remote, &stat, sink, start_block)
            .await
    }

    async fn remote_file_stat(&self, remote: &str) -> Result<StatResponse> {
        let stat = self.stat(remote).await?;
        if stat.is_dir() {
            return Err(Error::BadRequest {
                message: format!("{} is a directory", remote),
            });
        }
        Ok(stat)
    }

    async fn download_with_stat<W>(
        &self,
        remote: &str,
        stat: &StatResponse,
        sink: &mut W,
        start_block: u64,
    ) -> Result<TransferStats>
    where
        W: AsyncWrite + AsyncSeek + Unpin + Send,
    {
        let started = Instant::now();
        let start_offset = offset_of(start_block)?;
        let total_blocks = block_count(stat.len());
        let id = self.open_session(remote).await?;

        self.progress.on_progress(ProgressEvent::TransferStarted {
            direction: Direction::Download,
            remote_path: remote.to_string(),
            total_bytes: stat.len().saturating_sub(start_offset),
            blocks_total: total_blocks.saturating_sub(start_block),
        });

        let result = self
            .download_blocks(id, sink, start_block, total_blocks)
            .await;
        self.close_quietly(id).await;

        self.finish(remote, started, result)
    }

    async fn download_blocks<W>(
        &self,
        id: u64,
        sink: &mut W,
        start_block: u64,
        total_blocks: u64,
    ) -> Result<TransferStats>
    where
        W: AsyncWrite + AsyncSeek + Unpin + Send,
    {
        let mut stats = TransferStats::default();
        let blocks_total = total_blocks.saturating_sub(start_block);

        for block in start_block..total_blocks {
            let chunk = self.get_block(id, block).await?;

            if !chunk.is_empty() {
                sink.seek(SeekFrom::Start(offset_of(block)?)).await?;
                sink.write_all(&chunk.data).await?;
            }

            stats.blocks += 1;
            stats.bytes += chunk.len() as u64;
            debug!(session_id = id, block, size = chunk.len(), eof = chunk.eof, "Block downloaded");
            self.progress.on_progress(ProgressEvent::BlockCompleted {
                block,
                bytes: chunk.len() as u64,
                blocks_done: stats.blocks,
                blocks_total,
            });

            if chunk.eof {
                break;
            }
        }

        sink.flush().await?;
        Ok(stats)
    }

    // =========================================================================
    // Upload
    // =========================================================================

    /// Upload the local file `local` to `remote`.
    pub async fn upload(&self, local: &Path, remote: &str) -> Result<TransferStats> {
        self.upload_at(local, remote, 0).await
    }

    /// Upload `local` to `remote` starting at block `start_block`.
    ///
    /// Fails before any remote session exists if `local` is a directory.
    pub async fn upload_at(
        &self,
        local: &Path,
        remote: &str,
        start_block: u64,
    ) -> Result<TransferStats> {
        let meta = fs::metadata(local).await?;
        if meta.is_dir() {
            return Err(Error::BadRequest {
                message: format!("{} is a directory", local.display()),
            });
        }

        let mut file = File::open(local).await?;
        info!(
            local = %local.display(),
            remote = %remote,
            start_block,
            "Starting upload"
        );
        self.upload_from(&mut file, meta.len(), remote, start_block)
            .await
    }

    /// Upload `len` bytes from a seekable source to `remote`.
    ///
    /// Block `b` is read from byte `b * BLOCK_SIZE` of the source.
    pub async fn upload_from<R>(
        &self,
        source: &mut R,
        len: u64,
        remote: &str,
        start_block: u64,
    ) -> Result<TransferStats>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let started = Instant::now();
        let start_offset = offset_of(start_block)?;
        let total_blocks = block_count(len);
        let id = self.create(remote).await?;

        self.progress.on_progress(ProgressEvent::TransferStarted {
            direction: Direction::Upload,
            remote_path: remote.to_string(),
            total_bytes: len.saturating_sub(start_offset),
            blocks_total: total_blocks.saturating_sub(start_block),
        });

        let result = self
            .upload_blocks(id, source, start_block, total_blocks)
            .await;
        self.close_quietly(id).await;

        self.finish(remote, started, result)
    }

    async fn upload_blocks<R>(
        &self,
        id: u64,
        source: &mut R,
        start_block: u64,
        total_blocks: u64,
    ) -> Result<TransferStats>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let mut stats = TransferStats::default();
        let blocks_total = total_blocks.saturating_sub(start_block);
        let mut buf = vec![0u8; BLOCK_SIZE as usize];

        for block in start_block..total_blocks {
            source.seek(SeekFrom::Start(offset_of(block)?)).await?;
            let n = read_full(source, &mut buf).await?;
            if n == 0 {
                debug!(session_id = id, block, "Local source ended early");
                break;
            }

            let written = self.set_block(id, block, buf[..n].to_vec()).await?;
            stats.blocks += 1;
            stats.bytes += written;
            debug!(session_id = id, block, size = n, "Block uploaded");
            self.progress.on_progress(ProgressEvent::BlockCompleted {
                block,
                bytes: written,
                blocks_done: stats.blocks,
                blocks_total,
            });

            if n < buf.len() {
                break;
            }
        }

        Ok(stats)
    }

    fn finish(
        &self,
        remote: &str,
        started: Instant,
        result: Result<TransferStats>,
    ) -> Result<TransferStats> {
        match result {
            Ok(mut stats) => {
                stats.duration_secs = started.elapsed().as_secs_f64();
                info!(
                    remote = %remote,
                    blocks = stats.blocks,
                    bytes = stats.bytes,
                    "Transfer complete"
                );
                self.progress.on_progress(ProgressEvent::TransferCompleted {
                    remote_path: remote.to_string(),
                    bytes: stats.bytes,
                    elapsed_secs: stats.duration_secs,
                });
                Ok(stats)
            }
            Err(e) => {
                warn!(remote = %remote, error = %e, "Transfer failed");
                self.progress.on_progress(ProgressEvent::TransferFailed {
                    remote_path: remote.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

/// Byte offset of `block`; block indices past the addressable range are rejected.
fn offset_of(block: u64) -> Result<u64> {
    block_offset(block).ok_or_else(|| Error::BadRequest {
        message: format!("block {} is out of range", block),
    })
}

/// Fill `buf` from `source`, stopping early only at end-of-stream.
async fn read_full<R: AsyncRead + Unpin>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
