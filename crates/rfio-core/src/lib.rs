//! rfio-core: Shared library for the rfio remote file protocol.
//!
//! This crate provides:
//! - Request/response message definitions and the wire format codec
//! - The `FileService` trait implemented by the server and the RPC client
//! - The storage capability trait with OS and in-memory backends
//! - Per-call context (deadline and cancellation)
//! - Logging setup and error types

pub mod constants;
pub mod context;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod service;
pub mod storage;

pub use constants::{BLOCK_SIZE, block_count, block_offset};
pub use context::CallContext;
pub use error::{Error, Result};
pub use logging::{LogFormat, init_logging};
pub use service::FileService;
