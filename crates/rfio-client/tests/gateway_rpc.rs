//! HTTP gateway backed by an RPC connection to a real server.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tempfile::tempdir;
use tower::ServiceExt;

use rfio_client::{Gateway, RpcConnection};
use rfio_core::BLOCK_SIZE;
use rfio_core::storage::OsStorage;
use rfio_server::FileHandler;
use rfio_test_utils::{duplex_pair, pattern};

const BOUNDARY: &str = "XyZ-gateway";

fn upload_request(filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/uploads")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn upload_then_download_through_gateway() {
    let root = tempdir().unwrap();
    let handler = Arc::new(FileHandler::new(root.path(), Arc::new(OsStorage::new())).unwrap());
    let (client, server) = duplex_pair();
    tokio::spawn(rfio_server::serve_connection(server, handler.clone()));

    let conn = Arc::new(RpcConnection::from_stream(client));
    let router = Gateway::new(conn).router();

    let content = pattern((3 * BLOCK_SIZE + 12345) as usize);
    let rsp = router
        .clone()
        .oneshot(upload_request("big.dat", &content))
        .await
        .unwrap();
    assert_eq!(rsp.status(), StatusCode::OK);
    assert_eq!(std::fs::read(root.path().join("big.dat")).unwrap(), content);

    let rsp = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/uploads/big.dat")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rsp.status(), StatusCode::OK);
    assert_eq!(
        rsp.headers()[header::CONTENT_LENGTH],
        content.len().to_string().as_str()
    );
    let body = rsp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.to_vec(), content);

    // Every session opened by the gateway was closed again.
    assert!(handler.sessions().is_empty());
}

#[tokio::test]
async fn missing_file_is_not_found_through_gateway() {
    let root = tempdir().unwrap();
    let handler = Arc::new(FileHandler::new(root.path(), Arc::new(OsStorage::new())).unwrap());
    let (client, server) = duplex_pair();
    tokio::spawn(rfio_server::serve_connection(server, handler));

    let router = Gateway::new(Arc::new(RpcConnection::from_stream(client))).router();
    let rsp = router
        .oneshot(
            Request::builder()
                .uri("/uploads/absent.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rsp.status(), StatusCode::NOT_FOUND);
    let body = rsp.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("absent.txt"));
}
