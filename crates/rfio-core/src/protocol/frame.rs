//! Framed message I/O over async byte streams.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::READ_BUFFER_CAPACITY;
use crate::error::{Error, Result};
use crate::protocol::{Codec, Message};

/// Reads length-prefixed messages from a byte stream.
pub struct FrameReader<R> {
    reader: R,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
        }
    }

    /// Read the next message.
    ///
    /// Returns `Ok(None)` on a clean end of stream between frames and
    /// [`Error::ConnectionClosed`] when the stream ends inside a frame.
    pub async fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(msg) = Codec::decode(&mut self.buffer)? {
                return Ok(Some(msg));
            }

            let n = self.reader.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

/// Encode and write one message, flushing the writer.
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = Codec::encode(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CloseRequest, Request};

    #[tokio::test]
    async fn write_then_read_over_duplex() {
        let (mut a, b) = tokio::io::duplex(1024);
        let msg = Message::Request {
            call_id: 4,
            body: Request::Close(CloseRequest { id: 12 }),
        };

        write_message(&mut a, &msg).await.unwrap();
        drop(a);

        let mut reader = FrameReader::new(b);
        assert_eq!(reader.next_message().await.unwrap(), Some(msg));
        assert_eq!(reader.next_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn truncated_frame_is_connection_closed() {
        let (mut a, b) = tokio::io::duplex(1024);
        let msg = Message::Request {
            call_id: 4,
            body: Request::Close(CloseRequest { id: 12 }),
        };
        let frame = Codec::encode(&msg).unwrap();
        a.write_all(&frame[..frame.len() - 1]).await.unwrap();
        drop(a);

        let mut reader = FrameReader::new(b);
        let err = reader.next_message().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn large_frame_crosses_small_pipe() {
        let (mut a, b) = tokio::io::duplex(256);
        let msg = Message::Request {
            call_id: 1,
            body: Request::Write(crate::protocol::WriteRequest {
                id: 1,
                offset: 0,
                data: vec![0xAB; 100_000],
            }),
        };
        let expected = msg.clone();

        let writer = tokio::spawn(async move { write_message(&mut a, &msg).await });
        let mut reader = FrameReader::new(b);
        assert_eq!(reader.next_message().await.unwrap(), Some(expected));
        writer.await.unwrap().unwrap();
    }
}
