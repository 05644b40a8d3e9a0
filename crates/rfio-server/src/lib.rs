//! rfio-server: Server library for the rfio remote file protocol.
//!
//! Provides:
//! - The session table mapping numeric ids to open files
//! - The file service (`FileHandler`) over a storage backend
//! - The RPC listener serving a file service over byte streams

pub mod cli;
pub mod handler;
pub mod listener;
pub mod session;

pub use cli::{Backend, Cli, CliLogFormat};
pub use handler::FileHandler;
pub use listener::{serve, serve_connection};
pub use session::{Session, SessionTable};
