//! Property-based round trips over the RPC stack.
//!
//! Arbitrary contents, with lengths clustered around block boundaries, must
//! come back byte-for-byte after an upload and a download.

use std::io::Cursor;
use std::sync::Arc;

use proptest::prelude::*;

use rfio_client::{RpcConnection, TransferClient};
use rfio_core::BLOCK_SIZE;
use rfio_core::storage::MemoryStorage;
use rfio_server::FileHandler;
use rfio_test_utils::duplex_pair;

fn arb_len() -> impl Strategy<Value = u64> {
    prop_oneof![
        0u64..=4096,
        (0u64..=3, -64i64..=64).prop_map(|(blocks, delta)| {
            (blocks * BLOCK_SIZE).saturating_add_signed(delta)
        }),
        0u64..=3 * BLOCK_SIZE,
    ]
}

/// Pseudo-random bytes derived from `seed`, cheap enough for multi-block sizes.
fn contents(seed: u64, len: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 56) as u8
        })
        .collect()
}

fn round_trip(content: &[u8]) -> Vec<u8> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async {
        let storage = MemoryStorage::new();
        storage.create_dir_all("/data").unwrap();
        let handler = Arc::new(FileHandler::new("/data", Arc::new(storage)).unwrap());

        let (client_end, server_end) = duplex_pair();
        tokio::spawn(rfio_server::serve_connection(server_end, handler));
        let client = TransferClient::new(Arc::new(RpcConnection::from_stream(client_end)));

        let mut source = Cursor::new(content.to_vec());
        let up = client
            .upload_from(&mut source, content.len() as u64, "blob", 0)
            .await
            .unwrap();
        assert_eq!(up.bytes, content.len() as u64);

        let mut sink = Cursor::new(Vec::new());
        let down = client.download_to("blob", &mut sink, 0).await.unwrap();
        assert_eq!(down.bytes, content.len() as u64);
        sink.into_inner()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn upload_then_download_is_identity(seed in any::<u64>(), len in arb_len()) {
        let content = contents(seed, len);
        let copy = round_trip(&content);
        prop_assert_eq!(copy.len(), content.len());
        prop_assert!(copy == content, "contents differ for len {}", len);
    }
}
