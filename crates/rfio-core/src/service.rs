//! The remote file service contract.
//!
//! [`FileService`] is implemented by the server-side handler (backed by
//! storage) and by the client-side RPC connection (backed by the wire), so
//! the transfer client runs unchanged against either.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{
    CreateResponse, OpenResponse, ReadResponse, Request, Response, StatResponse, WriteResponse,
};

/// The six session-keyed file operations.
#[async_trait]
pub trait FileService: Send + Sync {
    /// Open an existing file and return its session id.
    async fn open(&self, filename: &str) -> Result<u64>;

    /// Create or truncate a file and return its session id.
    async fn create(&self, filename: &str) -> Result<u64>;

    /// Describe a path without opening a session.
    async fn stat(&self, filename: &str) -> Result<StatResponse>;

    /// Read up to `size` bytes at `offset`.
    async fn read(&self, id: u64, offset: u64, size: u64) -> Result<ReadResponse>;

    /// Write `data` at `offset`, returning the number of bytes written.
    async fn write(&self, id: u64, offset: u64, data: Vec<u8>) -> Result<u64>;

    /// Release a session. Unknown ids are not an error.
    async fn close(&self, id: u64) -> Result<()>;
}

#[async_trait]
impl<S: FileService + ?Sized> FileService for Arc<S> {
    async fn open(&self, filename: &str) -> Result<u64> {
        (**self).open(filename).await
    }

    async fn create(&self, filename: &str) -> Result<u64> {
        (**self).create(filename).await
    }

    async fn stat(&self, filename: &str) -> Result<StatResponse> {
        (**self).stat(filename).await
    }

    async fn read(&self, id: u64, offset: u64, size: u64) -> Result<ReadResponse> {
        (**self).read(id, offset, size).await
    }

    async fn write(&self, id: u64, offset: u64, data: Vec<u8>) -> Result<u64> {
        (**self).write(id, offset, data).await
    }

    async fn close(&self, id: u64) -> Result<()> {
        (**self).close(id).await
    }
}

/// Execute a wire request against a service and build the wire response.
///
/// Failures are folded into [`Response::Error`].
pub async fn dispatch<S: FileService + ?Sized>(service: &S, request: Request) -> Response {
    let result = match request {
        Request::Open(req) => service
            .open(&req.filename)
            .await
            .map(|id| Response::Open(OpenResponse { id, result: true })),
        Request::Create(req) => service
            .create(&req.filename)
            .await
            .map(|id| Response::Create(CreateResponse { id, result: true })),
        Request::Stat(req) => service.stat(&req.filename).await.map(Response::Stat),
        Request::Read(req) => service
            .read(req.id, req.offset, req.size)
            .await
            .map(Response::Read),
        Request::Write(req) => service
            .write(req.id, req.offset, req.data)
            .await
            .map(|size| Response::Write(WriteResponse { size })),
        Request::Close(req) => service.close(req.id).await.map(|()| Response::Close),
    };

    result.unwrap_or_else(|e| Response::Error(e.to_remote()))
}
