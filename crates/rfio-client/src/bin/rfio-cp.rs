//! rfio-cp: Block-wise file copy to and from an rfio server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use rfio_client::{CpCli, FilePath, IndicatifCallback, RpcConnection, TransferClient, TransferStats};
use rfio_core::LogFormat;

fn main() {
    let cli = CpCli::parse();

    if let Err(e) = rfio_core::init_logging(cli.verbose, cli.log_file.as_deref(), LogFormat::Text) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "rfio-cp starting");

    // Must be one local and one remote
    if !cli.is_upload() && !cli.is_download() {
        eprintln!("rfio-cp: exactly one path must be remote (host:path)");
        std::process::exit(1);
    }

    let addr = match cli.server_addr() {
        Some(addr) => addr,
        None => {
            eprintln!("rfio-cp: no remote host specified");
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("rfio-cp: failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run(&cli, &addr)) {
        error!(error = %e, "Transfer failed");
        eprintln!("rfio-cp: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &CpCli, addr: &str) -> rfio_core::Result<()> {
    info!(addr = %addr, "Connecting to server");
    let conn = Arc::new(RpcConnection::connect(addr).await?);

    // Ctrl-C cancels the in-flight call; the session is still closed.
    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling transfer");
            interrupt.cancel();
        }
    });

    let ctx = cli.call_context().with_cancellation(token);
    let mut client = TransferClient::new(conn).with_context(ctx);
    if !cli.no_progress {
        client = client.with_progress(Arc::new(IndicatifCallback::new()));
    }

    let stats = match (cli.source_path(), cli.dest_path()) {
        (FilePath::Local(local), FilePath::Remote { path, .. }) => {
            let remote = upload_target(&local, &path);
            client.upload_at(&local, &remote, cli.start_block).await?
        }
        (FilePath::Remote { path, .. }, FilePath::Local(local)) => {
            let local = download_target(&path, local);
            client.download_at(&path, &local, cli.start_block).await?
        }
        _ => unreachable!("checked by is_upload/is_download"),
    };

    if cli.no_progress {
        print_summary(&stats);
    }
    Ok(())
}

/// `host:` or `host:dir/` uploads under the local file name.
fn upload_target(local: &Path, remote: &str) -> String {
    if !remote.is_empty() && !remote.ends_with('/') {
        return remote.to_string();
    }
    let name = local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}{}", remote, name)
}

/// A local directory destination receives the remote file name.
fn download_target(remote: &str, local: PathBuf) -> PathBuf {
    if !local.is_dir() {
        return local;
    }
    match Path::new(remote).file_name() {
        Some(name) => local.join(name),
        None => local,
    }
}

fn print_summary(stats: &TransferStats) {
    let rate = if stats.duration_secs > 0.0 {
        (stats.bytes as f64 / stats.duration_secs) as u64
    } else {
        0
    };
    eprintln!(
        "Transferred {} in {} blocks, {:.1}s ({}/s)",
        format_bytes(stats.bytes),
        stats.blocks,
        stats.duration_secs,
        format_bytes(rate)
    );
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
