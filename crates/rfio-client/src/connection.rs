//! Client connection management.
//!
//! [`RpcConnection`] carries many concurrent calls over one byte stream:
//! 1. Each call gets a fresh `call_id` and a pending slot
//! 2. A writer task serializes request frames onto the stream
//! 3. A reader task routes response frames back to their pending slot
//! 4. When the stream ends every pending call fails with `ConnectionClosed`

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use rfio_core::constants::{CONNECT_TIMEOUT, RESPONSE_QUEUE_DEPTH};
use rfio_core::error::{Error, Result};
use rfio_core::protocol::{
    CloseRequest, CreateRequest, FrameReader, Message, OpenRequest, ReadRequest, ReadResponse,
    Request, Response, StatRequest, StatResponse, WriteRequest, write_message,
};
use rfio_core::FileService;

type PendingMap = HashMap<u64, oneshot::Sender<Response>>;

/// State shared between callers and the reader/writer tasks.
struct Shared {
    pending: Mutex<PendingMap>,
    closed: AtomicBool,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark the connection dead and fail every outstanding call.
    fn shut(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let dropped = std::mem::take(&mut *self.pending());
        if !dropped.is_empty() {
            debug!(pending = dropped.len(), "Failing outstanding calls");
        }
    }
}

/// Removes a pending slot when its call finishes or is abandoned.
struct PendingGuard<'a> {
    shared: &'a Shared,
    call_id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending().remove(&self.call_id);
    }
}

/// A multiplexed RPC connection to an rfio server.
pub struct RpcConnection {
    shared: Arc<Shared>,
    next_call: AtomicU64,
    outgoing: mpsc::Sender<Message>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl RpcConnection {
    /// Connect over TCP.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout)??;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        if let Ok(peer) = stream.peer_addr() {
            debug!(%peer, "Connected");
        }
        Ok(Self::from_stream(stream))
    }

    /// Run the protocol over an established byte stream.
    pub fn from_stream<T>(stream: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });
        let (outgoing, mut rx) = mpsc::channel::<Message>(RESPONSE_QUEUE_DEPTH);

        let writer_shared = shared.clone();
        let writer_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = write_message(&mut writer, &msg).await {
                    warn!(error = %e, "Connection write failed");
                    writer_shared.shut();
                    return;
                }
            }
            let _ = writer.shutdown().await;
        });

        let reader_shared = shared.clone();
        let reader_task = tokio::spawn(async move {
            let mut frames = FrameReader::new(reader);
            loop {
                match frames.next_message().await {
                    Ok(Some(Message::Response { call_id, body })) => {
                        let slot = reader_shared.pending().remove(&call_id);
                        match slot {
                            Some(tx) => {
                                let _ = tx.send(body);
                            }
                            None => trace!(call_id, "Response for abandoned call"),
                        }
                    }
                    Ok(Some(Message::Request { call_id, .. })) => {
                        warn!(call_id, "Unexpected request frame from server");
                        break;
                    }
                    Ok(None) => {
                        debug!("Server closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Connection read failed");
                        break;
                    }
                }
            }
            reader_shared.shut();
        });

        Self {
            shared,
            next_call: AtomicU64::new(1),
            outgoing,
            reader_task,
            writer_task,
        }
    }

    /// Whether the connection has stopped carrying calls.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Number of calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.shared.pending().len()
    }

    /// Issue one call and wait for its response.
    ///
    /// A `Response::Error` is turned into the matching [`Error`].
    pub async fn call(&self, body: Request) -> Result<Response> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        let method = body.method();
        let (tx, rx) = oneshot::channel();
        self.shared.pending().insert(call_id, tx);
        let _guard = PendingGuard {
            shared: &self.shared,
            call_id,
        };

        // The reader may have shut down between the first check and the insert.
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        trace!(call_id, method, "Sending request");
        self.outgoing
            .send(Message::Request { call_id, body })
            .await
            .map_err(|_| Error::ConnectionClosed)?;

        match rx.await {
            Ok(Response::Error(err)) => Err(err.into()),
            Ok(rsp) => Ok(rsp),
            Err(_) => Err(Error::ConnectionClosed),
        }
    }
}

impl Drop for RpcConnection {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

fn unexpected(method: &str, rsp: Response) -> Error {
    Error::Protocol {
        message: format!("unexpected response to {}: {:?}", method, rsp),
    }
}

#[async_trait]
impl FileService for RpcConnection {
    async fn open(&self, filename: &str) -> Result<u64> {
        let req = Request::Open(OpenRequest {
            filename: filename.to_string(),
        });
        match self.call(req).await? {
            Response::Open(rsp) => Ok(rsp.id),
            other => Err(unexpected("Open", other)),
        }
    }

    async fn create(&self, filename: &str) -> Result<u64> {
        let req = Request::Create(CreateRequest {
            filename: filename.to_string(),
        });
        match self.call(req).await? {
            Response::Create(rsp) => Ok(rsp.id),
            other => Err(unexpected("Create", other)),
        }
    }

    async fn stat(&self, filename: &str) -> Result<StatResponse> {
        let req = Request::Stat(StatRequest {
            filename: filename.to_string(),
        });
        match self.call(req).await? {
            Response::Stat(rsp) => Ok(rsp),
            other => Err(unexpected("Stat", other)),
        }
    }

    async fn read(&self, id: u64, offset: u64, size: u64) -> Result<ReadResponse> {
        match self.call(Request::Read(ReadRequest { id, offset, size })).await? {
            Response::Read(rsp) => Ok(rsp),
            other => Err(unexpected("Read", other)),
        }
    }

    async fn write(&self, id: u64, offset: u64, data: Vec<u8>) -> Result<u64> {
        match self
            .call(Request::Write(WriteRequest { id, offset, data }))
            .await?
        {
            Response::Write(rsp) => Ok(rsp.size),
            other => Err(unexpected("Write", other)),
        }
    }

    async fn close(&self, id: u64) -> Result<()> {
        match self.call(Request::Close(CloseRequest { id })).await? {
            Response::Close => Ok(()),
            other => Err(unexpected("Close", other)),
        }
    }
}
