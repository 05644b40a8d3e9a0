//! RPC listener: serves a [`FileService`] over framed byte streams.
//!
//! Each connection gets one reader loop and one writer task. Every request
//! frame is dispatched on its own task, so calls on a connection run
//! concurrently and responses may come back out of order; the `call_id`
//! pairs them up on the client.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use rfio_core::constants::RESPONSE_QUEUE_DEPTH;
use rfio_core::error::{Error, Result};
use rfio_core::protocol::{FrameReader, Message, Response, write_message};
use rfio_core::service::dispatch;
use rfio_core::FileService;

/// Accept TCP connections forever, serving each on its own task.
pub async fn serve<S>(listener: TcpListener, service: Arc<S>) -> Result<()>
where
    S: FileService + ?Sized + 'static,
{
    let local: Option<SocketAddr> = listener.local_addr().ok();
    info!(addr = ?local, "Listening for RPC connections");

    loop {
        let (stream, peer) = listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let service = service.clone();
        tokio::spawn(async move {
            debug!(%peer, "Connection accepted");
            match serve_connection(stream, service).await {
                Ok(()) => debug!(%peer, "Connection closed"),
                Err(e) => warn!(%peer, error = %e, "Connection ended with error"),
            }
        });
    }
}

/// Serve one connection until the peer closes it.
///
/// Returns once the stream ends and every in-flight call has been answered.
pub async fn serve_connection<T, S>(stream: T, service: Arc<S>) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
    S: FileService + ?Sized + 'static,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let (tx, mut rx) = mpsc::channel::<Message>(RESPONSE_QUEUE_DEPTH);

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            write_message(&mut writer, &msg).await?;
        }
        let _ = writer.shutdown().await;
        Ok::<_, Error>(())
    });

    let mut frames = FrameReader::new(reader);
    let result = loop {
        match frames.next_message().await {
            Ok(Some(Message::Request { call_id, body })) => {
                let service = service.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let method = body.method();
                    trace!(call_id, method, "Request received");

                    let response = dispatch(service.as_ref(), body).await;
                    if let Response::Error(err) = &response {
                        debug!(call_id, method, error = ?err, "Call failed");
                    }

                    if tx.send(Message::Response { call_id, body: response }).await.is_err() {
                        debug!(call_id, "Connection writer gone, dropping response");
                    }
                });
            }
            Ok(Some(Message::Response { call_id, .. })) => {
                break Err(Error::Protocol {
                    message: format!("unexpected response frame from client (call {})", call_id),
                });
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    drop(tx);
    let written = writer_task.await.map_err(|e| Error::Internal {
        message: format!("writer task failed: {}", e),
    })?;

    result.and(written)
}
