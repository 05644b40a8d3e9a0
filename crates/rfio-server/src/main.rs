//! rfio server binary entry point.
//!
//! Serves a directory over the rfio file protocol.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use rfio_server::{Cli, FileHandler};

fn main() {
    let cli = Cli::parse();

    let log_format = cli.log_format.into();
    if let Err(e) = rfio_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "rfio-server starting");

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("rfio-server: failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run(&cli)) {
        error!(error = %e, "Server failed");
        eprintln!("rfio-server: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> rfio_core::Result<()> {
    let storage = cli.storage()?;
    let handler = Arc::new(FileHandler::new(&cli.root, storage)?);

    info!(
        root = %handler.root().display(),
        fs = ?cli.fs,
        addr = %cli.bind,
        "Binding server"
    );
    let listener = TcpListener::bind(cli.bind).await?;

    tokio::select! {
        result = rfio_server::serve(listener, handler) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}
