//! rfio-client: Client library for the rfio remote file protocol.
//!
//! Provides:
//! - CLI argument parsing for `rfio-cp` and `rfio-gateway`
//! - A multiplexed RPC connection implementing `FileService`
//! - The block transfer client with progress reporting
//! - A seekable remote file handle
//! - An HTTP gateway (`GET`/`POST /uploads`)

pub mod cli;
pub mod connection;
pub mod file;
pub mod gateway;
pub mod transfer;

pub use cli::{CliLogFormat, CpCli, FilePath, GatewayCli};
pub use connection::RpcConnection;
pub use file::RemoteFile;
pub use gateway::{Gateway, GatewayError, HeaderMatcher};
pub use transfer::{
    Direction, IndicatifCallback, NoOpCallback, ProgressCallback, ProgressEvent, ReadChunk,
    TransferClient, TransferStats, callback,
};
