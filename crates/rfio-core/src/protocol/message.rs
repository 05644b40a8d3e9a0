//! Request, response and envelope types for the file protocol.

use serde::{Deserialize, Serialize};

// =============================================================================
// Envelope
// =============================================================================

/// Top-level frame carried on an rfio connection.
///
/// Every request carries a caller-chosen `call_id`; the matching response
/// echoes it, which lets one connection carry many concurrent calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Client to server.
    Request { call_id: u64, body: Request },
    /// Server to client.
    Response { call_id: u64, body: Response },
}

/// RPC request bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Open(OpenRequest),
    Create(CreateRequest),
    Stat(StatRequest),
    Read(ReadRequest),
    Write(WriteRequest),
    Close(CloseRequest),
}

impl Request {
    /// Method name, for logging.
    pub fn method(&self) -> &'static str {
        match self {
            Request::Open(_) => "Open",
            Request::Create(_) => "Create",
            Request::Stat(_) => "Stat",
            Request::Read(_) => "Read",
            Request::Write(_) => "Write",
            Request::Close(_) => "Close",
        }
    }
}

/// RPC response bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Open(OpenResponse),
    Create(CreateResponse),
    Stat(StatResponse),
    Read(ReadResponse),
    Write(WriteResponse),
    Close,
    /// The call failed on the server.
    Error(RemoteError),
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenResponse {
    pub id: u64,
    pub result: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: u64,
    pub result: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRequest {
    pub filename: String,
}

/// Kind of a stat'ed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Directory,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::File => write!(f, "File"),
            FileKind::Directory => write!(f, "Directory"),
        }
    }
}

/// Result of a Stat call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatResponse {
    pub kind: FileKind,
    /// Byte length; only set for files.
    pub size: Option<u64>,
    /// Modification time in unix seconds.
    pub last_modified: i64,
}

impl StatResponse {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Size in bytes, 0 for directories.
    pub fn len(&self) -> u64 {
        self.size.unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub id: u64,
    pub offset: u64,
    pub size: u64,
}

/// Result of a Read call.
///
/// `size == data.len()` always holds; `eof` is set when the backend ran out
/// of bytes before `size` was satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub data: Vec<u8>,
    pub size: u64,
    pub eof: bool,
}

impl ReadResponse {
    pub fn new(data: Vec<u8>, eof: bool) -> Self {
        let size = data.len() as u64;
        Self { data, size, eof }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub id: u64,
    pub offset: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequest {
    pub id: u64,
}

/// Server-side failure classes carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteError {
    NotFound(String),
    BadRequest(String),
    InvalidSession(u64),
    Internal(String),
}
