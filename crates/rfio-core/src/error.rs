//! Error types for rfio.

use thiserror::Error;

use crate::protocol::RemoteError;

/// Main error type for rfio operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation or unexpected message.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Codec error during encoding/decoding.
    #[error("codec error: {message}")]
    Codec { message: String },

    /// Path does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Caller supplied a path or argument the server rejects.
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Operation referenced a session id absent from the session table.
    #[error("invalid session: {0}")]
    InvalidSession(u64),

    /// Backend failure other than end-of-stream.
    #[error("internal error: {message}")]
    Internal { message: String },

    /// Client-side file handle used after close.
    #[error("file handle is closed")]
    HandleClosed,

    /// Connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Call deadline elapsed.
    #[error("operation timed out")]
    Timeout,

    /// Call was cancelled by its context.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns true if the error was raised by the remote file service
    /// rather than by the transport or the local side.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::BadRequest { .. }
                | Error::InvalidSession(_)
                | Error::Internal { .. }
        )
    }

    /// Returns true if the caller is at fault (unknown path, bad argument,
    /// stale session or closed handle).
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::BadRequest { .. }
                | Error::InvalidSession(_)
                | Error::HandleClosed
        )
    }

    /// Convert into the wire representation sent back to clients.
    ///
    /// Errors without a dedicated wire code are reported as internal.
    pub fn to_remote(&self) -> RemoteError {
        match self {
            Error::NotFound { message } => RemoteError::NotFound(message.clone()),
            Error::BadRequest { message } => RemoteError::BadRequest(message.clone()),
            Error::InvalidSession(id) => RemoteError::InvalidSession(*id),
            Error::Internal { message } => RemoteError::Internal(message.clone()),
            other => RemoteError::Internal(other.to_string()),
        }
    }
}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(message) => Error::NotFound { message },
            RemoteError::BadRequest(message) => Error::BadRequest { message },
            RemoteError::InvalidSession(id) => Error::InvalidSession(id),
            RemoteError::Internal(message) => Error::Internal { message },
        }
    }
}

/// Convenience result type for rfio operations.
pub type Result<T> = std::result::Result<T, Error>;
