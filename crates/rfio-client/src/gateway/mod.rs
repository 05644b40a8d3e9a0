//! HTTP gateway over the transfer client.
//!
//! - `GET /uploads/{name}` streams a remote file back in block-sized reads
//! - `POST /uploads` takes a multipart form with a `file` field and writes it
//!   to the server one block at a time
//!
//! Every request runs its calls under the [`CallContext`] produced by the
//! gateway's header matcher.

mod content_type;
mod error;

use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info, trace, warn};

use rfio_core::constants::{BLOCK_SIZE, CLEANUP_TIMEOUT};
use rfio_core::{CallContext, FileService};

use crate::file::RemoteFile;
use crate::transfer::TransferClient;

pub use content_type::{SNIFF_LEN, by_extension, detect, sniff};
pub use error::GatewayError;

/// Builds the call context for one HTTP request from its headers.
pub type HeaderMatcher = Arc<dyn Fn(&HeaderMap) -> CallContext + Send + Sync>;

/// Body of a successful upload.
pub const UPLOAD_OK: &str = "Successfully Uploaded File";

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// HTTP front end for a [`FileService`].
#[derive(Clone)]
pub struct Gateway {
    client: TransferClient<dyn FileService>,
    matcher: HeaderMatcher,
    timeout: Option<Duration>,
}

impl Gateway {
    pub fn new(service: Arc<dyn FileService>) -> Self {
        Self {
            client: TransferClient::new(service),
            matcher: Arc::new(|_| CallContext::background()),
            timeout: None,
        }
    }

    /// Derive each request's context from its headers.
    pub fn with_header_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&HeaderMap) -> CallContext + Send + Sync + 'static,
    {
        self.matcher = Arc::new(matcher);
        self
    }

    /// Bound every request by `timeout`, on top of the matcher's context.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn client_for(&self, headers: &HeaderMap) -> TransferClient<dyn FileService> {
        let mut ctx = (self.matcher)(headers);
        if let Some(timeout) = self.timeout {
            ctx = ctx.with_timeout(timeout);
        }
        self.client.with_context(ctx)
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/uploads/{name}", get(download))
            .route("/uploads", post(upload))
            .layer(DefaultBodyLimit::disable())
            .with_state(Arc::new(self))
    }
}

/// Serve the gateway on `listener` until the server stops.
pub async fn serve(listener: TcpListener, gateway: Gateway) -> rfio_core::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Gateway listening");
    }
    axum::serve(listener, gateway.router()).await?;
    Ok(())
}

/// Final path component of `raw`; rejects names with none.
fn base_name(raw: &str) -> Result<String, GatewayError> {
    FsPath::new(raw)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| GatewayError::InvalidName(raw.to_string()))
}

fn http_date(unix_secs: i64) -> Option<String> {
    Utc.timestamp_opt(unix_secs, 0)
        .single()
        .map(|t| t.format(HTTP_DATE).to_string())
}

/// `If-Modified-Since` as unix seconds, if present and well formed.
fn if_modified_since(headers: &HeaderMap) -> Option<i64> {
    let raw = headers.get(header::IF_MODIFIED_SINCE)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|t| t.timestamp())
}

// =============================================================================
// GET /uploads/{name}
// =============================================================================

async fn download(
    State(gateway): State<Arc<Gateway>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let name = base_name(&name)?;
    trace!(name = %name, "Download request");
    let client = gateway.client_for(&headers);

    let stat = client.stat(&name).await?;
    if stat.is_dir() {
        return Err(rfio_core::Error::BadRequest {
            message: format!("{} is a directory", name),
        }
        .into());
    }
    let last_modified = http_date(stat.last_modified);

    if let Some(since) = if_modified_since(&headers) {
        if stat.last_modified <= since {
            debug!(name = %name, "Not modified");
            let mut rsp = StatusCode::NOT_MODIFIED.into_response();
            if let Some(lm) = last_modified.and_then(|v| v.parse().ok()) {
                rsp.headers_mut().insert(header::LAST_MODIFIED, lm);
            }
            return Ok(rsp);
        }
    }

    let file = client.open(&name).await?;
    let content_type = match by_extension(&name) {
        Some(mime) => mime,
        None => {
            let mut head = vec![0u8; SNIFF_LEN];
            let n = file.read_at(&mut head, 0).await?;
            sniff(&head[..n])
        }
    };

    let mut rsp = Body::from_stream(stream_file(file)).into_response();
    let headers = rsp.headers_mut();
    headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, stat.len().into());
    if let Some(lm) = last_modified.and_then(|v| v.parse().ok()) {
        headers.insert(header::LAST_MODIFIED, lm);
    }
    Ok(rsp)
}

/// Yield the file one block at a time, closing the session at end of file.
///
/// A stream dropped early leaves the close to the handle's drop.
fn stream_file(
    file: RemoteFile<dyn FileService>,
) -> impl futures::Stream<Item = rfio_core::Result<Bytes>> + Send + 'static {
    futures::stream::unfold(Some(file), |state| async move {
        let Some(mut file) = state else {
            return None;
        };
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        match file.read(&mut buf).await {
            Ok(0) => {
                if let Err(e) = file.close().await {
                    warn!(name = %file.name(), error = %e, "Failed to close remote file");
                }
                None
            }
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(file)))
            }
            Err(e) => {
                warn!(name = %file.name(), error = %e, "Download aborted");
                Some((Err(e), None))
            }
        }
    })
}

// =============================================================================
// POST /uploads
// =============================================================================

async fn upload(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, GatewayError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let name = base_name(field.file_name().unwrap_or_default())?;
        let client = gateway.client_for(&headers);
        let id = client.create(&name).await?;
        debug!(session_id = id, name = %name, "Upload started");

        let result = write_field(&client, id, &mut field).await;

        let cleanup = client.with_context(CallContext::background().with_timeout(CLEANUP_TIMEOUT));
        if let Err(e) = cleanup.close(id).await {
            warn!(session_id = id, error = %e, "Failed to close remote session");
        }

        let bytes = result?;
        info!(name = %name, bytes, "Upload complete");
        return Ok(Json(json!({ "response": UPLOAD_OK })).into_response());
    }

    Err(GatewayError::MissingFile)
}

/// Copy a form field to session `id` in whole blocks at sequential offsets.
async fn write_field(
    client: &TransferClient<dyn FileService>,
    id: u64,
    field: &mut Field<'_>,
) -> Result<u64, GatewayError> {
    let block_len = BLOCK_SIZE as usize;
    let mut pending = BytesMut::with_capacity(block_len);
    let mut block = 0;
    let mut written = 0;

    while let Some(chunk) = field.chunk().await? {
        pending.extend_from_slice(&chunk);
        while pending.len() >= block_len {
            let data = pending.split_to(block_len);
            written += client.set_block(id, block, data.to_vec()).await?;
            block += 1;
        }
    }
    if !pending.is_empty() {
        written += client.set_block(id, block, pending.to_vec()).await?;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use rfio_core::storage::MemoryStorage;
    use rfio_server::FileHandler;
    use rfio_test_utils::{RecordingService, pattern};

    const BOUNDARY: &str = "rfio-test-boundary";

    struct Fixture {
        storage: MemoryStorage,
        service: Arc<RecordingService<FileHandler>>,
    }

    impl Fixture {
        fn new() -> Self {
            let storage = MemoryStorage::new();
            storage.create_dir_all("/www").unwrap();
            let handler = FileHandler::new("/www", Arc::new(storage.clone())).unwrap();
            Self {
                storage,
                service: Arc::new(RecordingService::new(handler)),
            }
        }

        fn gateway(&self) -> Gateway {
            Gateway::new(self.service.clone())
        }

        fn router(&self) -> Router {
            self.gateway().router()
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn post_multipart(body: Vec<u8>) -> Request<Body> {
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

    async fn body_bytes(rsp: Response) -> Bytes {
        rsp.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn get_streams_file_with_headers() {
        let fx = Fixture::new();
        let len = (2 * BLOCK_SIZE + BLOCK_SIZE / 2) as usize;
        fx.storage.insert("/www/data.bin", pattern(len)).unwrap();

        let rsp = fx.router().oneshot(get("/uploads/data.bin")).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::OK);
        let h = rsp.headers();
        assert_eq!(h[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(h[header::CONTENT_LENGTH], len.to_string().as_str());
        assert!(h.contains_key(header::LAST_MODIFIED));

        assert_eq!(body_bytes(rsp).await.to_vec(), pattern(len));
        assert_eq!(fx.service.closes(), 1);
        assert!(fx.service.inner().sessions().is_empty());
    }

    #[tokio::test]
    async fn get_uses_extension_for_content_type() {
        let fx = Fixture::new();
        fx.storage.insert("/www/notes.txt", b"hello".to_vec()).unwrap();

        let rsp = fx.router().oneshot(get("/uploads/notes.txt")).await.unwrap();
        assert_eq!(rsp.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(body_bytes(rsp).await.as_ref(), b"hello");
        // Known extension: no sniffing read before the block reads.
        assert_eq!(fx.service.reads()[0], (0, BLOCK_SIZE));
    }

    #[tokio::test]
    async fn get_empty_file() {
        let fx = Fixture::new();
        fx.storage.insert("/www/empty", Vec::new()).unwrap();

        let rsp = fx.router().oneshot(get("/uploads/empty")).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::OK);
        assert_eq!(rsp.headers()[header::CONTENT_LENGTH], "0");
        assert!(body_bytes(rsp).await.is_empty());
    }

    #[tokio::test]
    async fn get_missing_is_404() {
        let fx = Fixture::new();
        let rsp = fx.router().oneshot(get("/uploads/nope")).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_directory_is_400() {
        let fx = Fixture::new();
        fx.storage.create_dir_all("/www/sub").unwrap();
        let rsp = fx.router().oneshot(get("/uploads/sub")).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::BAD_REQUEST);
        assert!(fx.service.inner().sessions().is_empty());
    }

    #[tokio::test]
    async fn get_parent_name_is_400() {
        let fx = Fixture::new();
        let rsp = fx.router().oneshot(get("/uploads/..")).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::BAD_REQUEST);
        assert!(fx.service.calls().is_empty());
    }

    #[tokio::test]
    async fn if_modified_since_answers_304() {
        let fx = Fixture::new();
        fx.storage.insert("/www/a.txt", b"abc".to_vec()).unwrap();

        let future = (Utc::now() + chrono::Duration::hours(1)).format(HTTP_DATE).to_string();
        let req = Request::builder()
            .uri("/uploads/a.txt")
            .header(header::IF_MODIFIED_SINCE, future)
            .body(Body::empty())
            .unwrap();
        let rsp = fx.router().oneshot(req).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::NOT_MODIFIED);
        assert!(body_bytes(rsp).await.is_empty());
        assert!(fx.service.inner().sessions().is_empty());

        let req = Request::builder()
            .uri("/uploads/a.txt")
            .header(header::IF_MODIFIED_SINCE, "Sun, 06 Nov 1994 08:49:37 GMT")
            .body(Body::empty())
            .unwrap();
        let rsp = fx.router().oneshot(req).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_writes_blocks_at_sequential_offsets() {
        let fx = Fixture::new();
        let content = pattern((BLOCK_SIZE + 100) as usize);

        let rsp = fx
            .router()
            .oneshot(post_multipart(multipart_body("file", "up.bin", &content)))
            .await
            .unwrap();
        assert_eq!(rsp.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(rsp).await).unwrap();
        assert_eq!(body, json!({ "response": UPLOAD_OK }));

        assert_eq!(fx.storage.contents("/www/up.bin").unwrap(), content);
        assert_eq!(
            fx.service.writes(),
            vec![(0, BLOCK_SIZE as usize), (BLOCK_SIZE, 100)]
        );
        assert_eq!(fx.service.closes(), 1);
    }

    #[tokio::test]
    async fn post_strips_directories_from_filename() {
        let fx = Fixture::new();
        let rsp = fx
            .router()
            .oneshot(post_multipart(multipart_body("file", "../../etc/x.txt", b"hi")))
            .await
            .unwrap();
        assert_eq!(rsp.status(), StatusCode::OK);
        assert_eq!(fx.storage.contents("/www/x.txt").unwrap(), b"hi");
    }

    #[tokio::test]
    async fn post_without_file_field_is_400() {
        let fx = Fixture::new();
        let rsp = fx
            .router()
            .oneshot(post_multipart(multipart_body("other", "a.txt", b"x")))
            .await
            .unwrap();
        assert_eq!(rsp.status(), StatusCode::BAD_REQUEST);
        assert!(fx.service.calls().is_empty());
    }

    #[tokio::test]
    async fn post_without_multipart_is_client_error() {
        let fx = Fixture::new();
        let req = Request::builder()
            .method("POST")
            .uri("/uploads")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("x"))
            .unwrap();
        let rsp = fx.router().oneshot(req).await.unwrap();
        assert!(rsp.status().is_client_error());
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let fx = Fixture::new();
        let req = Request::builder()
            .method("PUT")
            .uri("/uploads")
            .body(Body::empty())
            .unwrap();
        let rsp = fx.router().oneshot(req).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn header_matcher_supplies_context() {
        let fx = Fixture::new();
        fx.storage.insert("/www/a.txt", b"abc".to_vec()).unwrap();
        let router = fx
            .gateway()
            .with_header_matcher(|headers| {
                let token = tokio_util::sync::CancellationToken::new();
                if headers.contains_key("x-cancel") {
                    token.cancel();
                }
                CallContext::background().with_cancellation(token)
            })
            .router();

        let req = Request::builder()
            .uri("/uploads/a.txt")
            .header("x-cancel", "1")
            .body(Body::empty())
            .unwrap();
        let rsp = router.clone().oneshot(req).await.unwrap();
        assert!(rsp.status().is_server_error());
        assert!(fx.service.calls().is_empty());

        let rsp = router.oneshot(get("/uploads/a.txt")).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::OK);
    }

    #[test]
    fn base_name_rules() {
        assert_eq!(base_name("a.txt").unwrap(), "a.txt");
        assert_eq!(base_name("dir/a.txt").unwrap(), "a.txt");
        assert!(base_name("").is_err());
        assert!(base_name("..").is_err());
    }

    #[test]
    fn http_date_format() {
        assert_eq!(
            http_date(784111777).unwrap(),
            "Sun, 06 Nov 1994 08:49:37 GMT"
        );
    }
}
