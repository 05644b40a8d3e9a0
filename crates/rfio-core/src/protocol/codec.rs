//! Length-prefixed bincode framing.
//!
//! A frame is a `u32` little-endian payload length followed by the bincode
//! encoding of one [`Message`]. Frames larger than `MAX_MESSAGE_SIZE` are
//! refused on both sides.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::constants::MAX_MESSAGE_SIZE;
use crate::error::{Error, Result};
use crate::protocol::Message;

/// Length of the frame header (4 bytes, little-endian u32).
pub const FRAME_HEADER_LEN: usize = 4;

fn codec_error(message: String) -> Error {
    Error::Codec { message }
}

fn check_len(len: usize) -> Result<()> {
    if len > MAX_MESSAGE_SIZE {
        return Err(codec_error(format!(
            "frame of {} bytes exceeds limit of {}",
            len, MAX_MESSAGE_SIZE
        )));
    }
    Ok(())
}

/// Stateless frame encoder/decoder.
pub struct Codec;

impl Codec {
    /// Encode `msg` as one complete frame.
    pub fn encode(msg: &Message) -> Result<Bytes> {
        let payload =
            bincode::serialize(msg).map_err(|e| codec_error(format!("encode: {}", e)))?;
        check_len(payload.len())?;

        let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.put_u32_le(payload.len() as u32);
        frame.extend_from_slice(&payload);
        Ok(frame.freeze())
    }

    /// Take one frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched until a whole frame has
    /// arrived. An oversized length header fails immediately.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Message>> {
        let Some(header) = buf.get(..FRAME_HEADER_LEN) else {
            return Ok(None);
        };
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        check_len(len)?;

        let needed = FRAME_HEADER_LEN + len;
        if buf.len() < needed {
            buf.reserve(needed - buf.len());
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_LEN);
        let payload = buf.split_to(len);
        bincode::deserialize(&payload)
            .map(Some)
            .map_err(|e| codec_error(format!("decode: {}", e)))
    }

    /// Decode a frame held in a plain slice.
    pub fn decode_slice(data: &[u8]) -> Result<Option<Message>> {
        Self::decode(&mut BytesMut::from(data))
    }
}
