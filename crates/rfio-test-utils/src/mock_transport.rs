//! In-memory byte streams for testing without real network.
//!
//! The RPC stack runs over any `AsyncRead + AsyncWrite`, so a tokio duplex
//! pair stands in for a TCP connection.

use tokio::io::DuplexStream;

/// Buffer size of each direction of a [`duplex_pair`].
///
/// Large enough to hold a full block write frame without back-pressure.
pub const DUPLEX_CAPACITY: usize = 1024 * 1024;

/// Create a connected pair of in-memory streams: `(client, server)`.
pub fn duplex_pair() -> (DuplexStream, DuplexStream) {
    tokio::io::duplex(DUPLEX_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn pair_is_connected_both_ways() {
        let (mut client, mut server) = duplex_pair();

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn drop_signals_eof() {
        let (client, mut server) = duplex_pair();
        drop(client);
        let mut buf = Vec::new();
        assert_eq!(server.read_to_end(&mut buf).await.unwrap(), 0);
    }
}
