//! Server CLI implementation.
//!
//! Provides command-line argument parsing for the rfio server.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, ValueEnum};

use rfio_core::constants::DEFAULT_RPC_PORT;
use rfio_core::error::{Error, Result};
use rfio_core::storage::{MemoryStorage, OsStorage, Storage};

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

/// Storage backend served by the file service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    /// Local filesystem.
    #[default]
    Os,
    /// Volatile in-memory tree (contents are lost on exit).
    Memory,
}

/// rfio server - remote random-access file service.
#[derive(Debug, Parser)]
#[command(
    name = "rfio-server",
    version,
    about = "rfio server - serves a directory over the rfio file protocol"
)]
pub struct Cli {
    /// Directory to serve; every client path resolves beneath it
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Address to listen on
    #[arg(
        short = 'b',
        long = "bind",
        env = "RFIO_BIND",
        default_value_t = SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_RPC_PORT))
    )]
    pub bind: SocketAddr,

    /// Storage backend
    #[arg(long = "fs", env = "RFIO_FS", value_enum, default_value = "os")]
    pub fs: Backend,

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

impl Cli {
    /// Build the selected storage backend.
    ///
    /// The in-memory backend starts with the root directory already present.
    pub fn storage(&self) -> Result<Arc<dyn Storage>> {
        match self.fs {
            Backend::Os => Ok(Arc::new(OsStorage::new())),
            Backend::Memory => {
                let storage = MemoryStorage::new();
                storage.create_dir_all(&self.root).map_err(|e| Error::Internal {
                    message: format!("memory root {}: {}", self.root.display(), e),
                })?;
                Ok(Arc::new(storage))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn root_is_required() {
        assert!(Cli::try_parse_from(["rfio-server"]).is_err());
    }

    #[test]
    fn default_values() {
        let cli = Cli::try_parse_from(["rfio-server", "/srv/files"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("/srv/files"));
        assert_eq!(cli.bind, "0.0.0.0:7420".parse::<SocketAddr>().unwrap());
        assert_eq!(cli.fs, Backend::Os);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.log_format, CliLogFormat::Text);
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn parse_bind_and_backend() {
        let cli = Cli::try_parse_from([
            "rfio-server",
            "data",
            "-b",
            "127.0.0.1:9000",
            "--fs",
            "memory",
        ])
        .unwrap();
        assert_eq!(cli.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(cli.fs, Backend::Memory);
    }

    #[test]
    fn parse_invalid_backend() {
        assert!(Cli::try_parse_from(["rfio-server", "data", "--fs", "cache"]).is_err());
    }

    #[test]
    fn parse_verbosity_and_logging() {
        let cli = Cli::try_parse_from([
            "rfio-server",
            "data",
            "-vv",
            "--log-format",
            "json",
            "--log-file",
            "/tmp/rfio.log",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, CliLogFormat::Json);
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/rfio.log")));
    }

    #[test]
    fn memory_backend_has_root() {
        let cli = Cli::try_parse_from(["rfio-server", "/srv/mem", "--fs", "memory"]).unwrap();
        let storage = cli.storage().unwrap();
        assert!(storage.stat(&cli.root).unwrap().is_dir());
    }
}
