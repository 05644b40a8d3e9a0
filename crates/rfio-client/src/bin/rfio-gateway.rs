//! rfio-gateway: HTTP front end for an rfio server.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use rfio_client::{Gateway, GatewayCli, RpcConnection};

fn main() {
    let cli = GatewayCli::parse();

    let log_format = cli.log_format.into();
    if let Err(e) = rfio_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "rfio-gateway starting");

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("rfio-gateway: failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run(&cli)) {
        error!(error = %e, "Gateway failed");
        eprintln!("rfio-gateway: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &GatewayCli) -> rfio_core::Result<()> {
    info!(server = %cli.server, "Connecting to server");
    let conn = Arc::new(RpcConnection::connect(cli.server.as_str()).await?);

    let mut gateway = Gateway::new(conn);
    if let Some(timeout) = cli.call_timeout() {
        gateway = gateway.with_timeout(timeout);
    }

    let listener = TcpListener::bind(cli.listen).await?;

    tokio::select! {
        result = rfio_client::gateway::serve(listener, gateway) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}
