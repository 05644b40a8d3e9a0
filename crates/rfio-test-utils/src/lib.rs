//! rfio-test-utils: Test infrastructure for rfio.
//!
//! Provides:
//! - RecordingService: FileService wrapper that records calls and injects faults
//! - duplex_pair: In-memory byte stream pair for running the RPC stack without network
//! - pattern: Deterministic payload generation

mod data;
mod mock_transport;
mod recording;

pub use data::{pattern, pattern_from};
pub use mock_transport::{DUPLEX_CAPACITY, duplex_pair};
pub use recording::{Call, Fault, RecordingService};
