//! Property-based tests for the protocol codec.
//!
//! These tests use proptest to verify:
//! - Codec roundtrip for arbitrary requests and responses
//! - Codec never panics on arbitrary input
//! - Length prefix correctness

#![cfg(test)]

use bytes::BytesMut;
use proptest::prelude::*;

use crate::protocol::{
    CloseRequest, Codec, CreateRequest, FileKind, Message, OpenRequest, OpenResponse, ReadRequest,
    ReadResponse, RemoteError, Request, Response, StatResponse, WriteRequest, WriteResponse,
};

// =============================================================================
// Arbitrary Generators
// =============================================================================

fn arb_filename() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./-]{0,64}"
}

fn arb_request() -> impl Strategy<Value = Request> {
    prop_oneof![
        arb_filename().prop_map(|filename| Request::Open(OpenRequest { filename })),
        arb_filename().prop_map(|filename| Request::Create(CreateRequest { filename })),
        (any::<u64>(), any::<u64>(), 0u64..=1 << 20)
            .prop_map(|(id, offset, size)| Request::Read(ReadRequest { id, offset, size })),
        (
            any::<u64>(),
            any::<u64>(),
            proptest::collection::vec(any::<u8>(), 0..2048)
        )
            .prop_map(|(id, offset, data)| Request::Write(WriteRequest { id, offset, data })),
        any::<u64>().prop_map(|id| Request::Close(CloseRequest { id })),
    ]
}

fn arb_response() -> impl Strategy<Value = Response> {
    prop_oneof![
        any::<u64>().prop_map(|id| Response::Open(OpenResponse { id, result: true })),
        (proptest::option::of(any::<u64>()), any::<i64>(), any::<bool>()).prop_map(
            |(size, last_modified, dir)| Response::Stat(StatResponse {
                kind: if dir { FileKind::Directory } else { FileKind::File },
                size,
                last_modified,
            })
        ),
        (proptest::collection::vec(any::<u8>(), 0..2048), any::<bool>())
            .prop_map(|(data, eof)| Response::Read(ReadResponse::new(data, eof))),
        any::<u64>().prop_map(|size| Response::Write(WriteResponse { size })),
        Just(Response::Close),
        any::<u64>().prop_map(|id| Response::Error(RemoteError::InvalidSession(id))),
        ".{0,40}".prop_map(|m| Response::Error(RemoteError::NotFound(m))),
    ]
}

fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        (any::<u64>(), arb_request()).prop_map(|(call_id, body)| Message::Request { call_id, body }),
        (any::<u64>(), arb_response())
            .prop_map(|(call_id, body)| Message::Response { call_id, body }),
    ]
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn roundtrip(msg in arb_message()) {
        let encoded = Codec::encode(&msg).unwrap();
        let decoded = Codec::decode_slice(&encoded).unwrap().unwrap();
        prop_assert_eq!(msg, decoded);
    }

    #[test]
    fn length_prefix_matches_payload(msg in arb_message()) {
        let encoded = Codec::encode(&msg).unwrap();
        let len = u32::from_le_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
        prop_assert_eq!(len + 4, encoded.len());
    }

    #[test]
    fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut buf = BytesMut::from(&data[..]);
        let _ = Codec::decode(&mut buf);
    }
}
