//! Client CLI implementation.
//!
//! Provides command-line argument parsing for `rfio-cp` and `rfio-gateway`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

use rfio_core::CallContext;
use rfio_core::constants::{DEFAULT_GATEWAY_ADDR, DEFAULT_RPC_PORT};

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for rfio_core::LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => rfio_core::LogFormat::Text,
            CliLogFormat::Json => rfio_core::LogFormat::Json,
        }
    }
}

// =============================================================================
// Paths
// =============================================================================

/// Parsed file path (local or remote).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePath {
    /// Local file path.
    Local(PathBuf),
    /// Remote file path on an rfio server.
    Remote { host: String, path: String },
}

impl FilePath {
    /// Parse a string into a FilePath.
    ///
    /// Remote paths use the format `host:path`. Anything with a path
    /// separator before the first colon is local.
    pub fn parse(s: &str) -> FilePath {
        if let Some((host, path)) = s.split_once(':') {
            if !host.is_empty() && !host.contains('/') && !host.contains('\\') {
                return FilePath::Remote {
                    host: host.to_string(),
                    path: path.to_string(),
                };
            }
        }

        FilePath::Local(PathBuf::from(s))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, FilePath::Remote { .. })
    }
}

// =============================================================================
// rfio-cp
// =============================================================================

/// rfio-cp - copy files to or from an rfio server in 512 KiB blocks.
#[derive(Debug, Parser)]
#[command(name = "rfio-cp", version, about = "Copy files to or from an rfio server")]
pub struct CpCli {
    /// Source path (host:path or local path)
    #[arg(required = true)]
    pub source: String,

    /// Destination path (host:path or local path)
    #[arg(required = true)]
    pub dest: String,

    /// First block to transfer; earlier blocks are assumed already in place
    #[arg(long = "start-block", default_value = "0", value_name = "N")]
    pub start_block: u64,

    /// Timeout for the whole transfer in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Server RPC port
    #[arg(short = 'p', long = "port", env = "RFIO_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub port: u16,

    /// Disable the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Increase verbosity
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log to file
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl CpCli {
    /// Get parsed source path.
    pub fn source_path(&self) -> FilePath {
        FilePath::parse(&self.source)
    }

    /// Get parsed destination path.
    pub fn dest_path(&self) -> FilePath {
        FilePath::parse(&self.dest)
    }

    /// Check if this is an upload (local -> remote).
    pub fn is_upload(&self) -> bool {
        !self.source_path().is_remote() && self.dest_path().is_remote()
    }

    /// Check if this is a download (remote -> local).
    pub fn is_download(&self) -> bool {
        self.source_path().is_remote() && !self.dest_path().is_remote()
    }

    /// The remote host for this transfer.
    pub fn remote_host(&self) -> Option<String> {
        [self.source_path(), self.dest_path()]
            .into_iter()
            .find_map(|p| match p {
                FilePath::Remote { host, .. } => Some(host),
                FilePath::Local(_) => None,
            })
    }

    /// `host:port` of the server, if either side is remote.
    pub fn server_addr(&self) -> Option<String> {
        self.remote_host()
            .map(|host| format!("{}:{}", host, self.port))
    }

    /// Context applied to every call of the transfer.
    pub fn call_context(&self) -> CallContext {
        match self.timeout {
            Some(secs) => CallContext::background().with_timeout(Duration::from_secs(secs)),
            None => CallContext::background(),
        }
    }
}

// =============================================================================
// rfio-gateway
// =============================================================================

/// rfio-gateway - HTTP front end for an rfio server.
#[derive(Debug, Parser)]
#[command(
    name = "rfio-gateway",
    version,
    about = "Serve GET/POST /uploads over HTTP, backed by an rfio server"
)]
pub struct GatewayCli {
    /// rfio server to forward to
    #[arg(long = "server", env = "RFIO_SERVER", value_name = "HOST:PORT")]
    pub server: String,

    /// HTTP listen address
    #[arg(
        long = "listen",
        env = "RFIO_GATEWAY_LISTEN",
        default_value = DEFAULT_GATEWAY_ADDR
    )]
    pub listen: SocketAddr,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log to file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text")]
    pub log_format: CliLogFormat,
}

impl GatewayCli {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================
