//! Protocol and configuration constants for rfio.

use std::time::Duration;

// =============================================================================
// Protocol Constants
// =============================================================================

/// Transfer block size (512 KiB), shared by client and server.
pub const BLOCK_SIZE: u64 = 512 * 1024;

/// Maximum frame payload size (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Largest `size` a single Read request may ask for (8 MiB).
pub const MAX_READ_SIZE: u64 = 8 * 1024 * 1024;

// =============================================================================
// Network Defaults
// =============================================================================

/// Default RPC port for `rfio-server`.
pub const DEFAULT_RPC_PORT: u16 = 7420;

/// Default listen address for the HTTP gateway.
pub const DEFAULT_GATEWAY_ADDR: &str = "0.0.0.0:18888";

/// Buffered outgoing responses per connection before request handling stalls.
pub const RESPONSE_QUEUE_DEPTH: usize = 64;

/// Initial read buffer capacity for frame decoding.
pub const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// Connect timeout used by the CLI tools.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on the best-effort `Close` issued when a transfer or handle ends.
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of blocks needed to hold `len` bytes.
pub fn block_count(len: u64) -> u64 {
    len.div_ceil(BLOCK_SIZE)
}

/// Byte offset of the first byte of `block_id`, or `None` past `u64::MAX`.
pub fn block_offset(block_id: u64) -> Option<u64> {
    block_id.checked_mul(BLOCK_SIZE)
}
