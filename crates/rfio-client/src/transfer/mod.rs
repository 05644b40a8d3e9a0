//! Block transfer engine.
//!
//! Files move as a sequence of 512 KiB blocks, one Read or Write call per
//! block, issued strictly in order over a single session. Transfers can start
//! at any block to resume a partial copy.

pub mod engine;
pub mod progress;

pub use engine::{ReadChunk, TransferClient, TransferStats};
pub use progress::{
    Direction, FnCallback, IndicatifCallback, NoOpCallback, ProgressCallback, ProgressEvent,
    callback,
};
