//! Protocol module for the rfio wire format.
//!
//! This module provides:
//! - Request/response message types and the call envelope
//! - Length-prefixed bincode codec
//! - Framed reads and writes over async byte streams

mod codec;
mod frame;
mod message;

#[cfg(test)]
mod proptest;

pub use codec::{Codec, FRAME_HEADER_LEN};
pub use frame::{FrameReader, write_message};
pub use message::*;
