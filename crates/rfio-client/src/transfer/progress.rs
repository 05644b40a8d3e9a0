//! Progress event types for block transfers.

use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};

/// Direction of a transfer, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

/// Events emitted during a transfer.
///
/// Block counts start from the transfer's `start_block`, so a resumed
/// transfer reports only the blocks it actually moves.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Session is open and the first block is about to move.
    TransferStarted {
        direction: Direction,
        remote_path: String,
        total_bytes: u64,
        blocks_total: u64,
    },
    /// One block finished.
    BlockCompleted {
        block: u64,
        bytes: u64,
        blocks_done: u64,
        blocks_total: u64,
    },
    /// All blocks moved.
    TransferCompleted {
        remote_path: String,
        bytes: u64,
        elapsed_secs: f64,
    },
    /// The transfer stopped at an error.
    TransferFailed { remote_path: String, error: String },
}

/// Callback for progress events.
///
/// This trait allows consumers to handle progress events. The callback is
/// invoked synchronously during transfer operations.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// A no-op progress callback that ignores all events.
pub struct NoOpCallback;

impl ProgressCallback for NoOpCallback {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// A function-based progress callback.
pub struct FnCallback<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    f: F,
}

impl<F> FnCallback<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ProgressCallback for FnCallback<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) {
        (self.f)(event)
    }
}

/// Helper to create an Arc-wrapped callback from a closure.
pub fn callback<F>(f: F) -> Arc<dyn ProgressCallback>
where
    F: Fn(ProgressEvent) + Send + Sync + 'static,
{
    Arc::new(FnCallback::new(f))
}

// =============================================================================
// Indicatif-based progress callback
// =============================================================================

/// Progress callback rendering one indicatif bar per transfer.
pub struct IndicatifCallback {
    bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifCallback {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }
}

impl Default for IndicatifCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for IndicatifCallback {
    fn on_progress(&self, event: ProgressEvent) {
        let mut bar = self.bar.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            ProgressEvent::TransferStarted {
                direction,
                remote_path,
                total_bytes,
                ..
            } => {
                let pb = ProgressBar::new(total_bytes);
                pb.set_style(Self::style());
                pb.set_message(format!("{} {}", direction, remote_path));
                *bar = Some(pb);
            }
            ProgressEvent::BlockCompleted { bytes, .. } => {
                if let Some(pb) = bar.as_ref() {
                    pb.inc(bytes);
                }
            }
            ProgressEvent::TransferCompleted {
                bytes,
                elapsed_secs,
                ..
            } => {
                if let Some(pb) = bar.take() {
                    pb.finish_with_message("done");
                }

                let speed = if elapsed_secs > 0.0 {
                    bytes as f64 / elapsed_secs / 1024.0 / 1024.0
                } else {
                    0.0
                };
                eprintln!(
                    "{} bytes transferred in {:.2}s ({:.2} MB/s)",
                    bytes, elapsed_secs, speed
                );
            }
            ProgressEvent::TransferFailed { remote_path, error } => {
                if let Some(pb) = bar.take() {
                    pb.abandon_with_message("failed");
                }
                eprintln!("Error: {} - {}", remote_path, error);
            }
        }
    }
}
