//! HTTP error mapping for the gateway.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors returned by gateway handlers.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Remote(#[from] rfio_core::Error),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("missing form field \"file\"")]
    MissingFile,

    #[error("invalid file name: {0:?}")]
    InvalidName(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Remote(err) => match err {
                rfio_core::Error::NotFound { .. } => StatusCode::NOT_FOUND,
                rfio_core::Error::BadRequest { .. }
                | rfio_core::Error::InvalidSession(_)
                | rfio_core::Error::HandleClosed => StatusCode::BAD_REQUEST,
                rfio_core::Error::Timeout => StatusCode::GATEWAY_TIMEOUT,
                rfio_core::Error::ConnectionClosed => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Multipart(err) => {
                let status = err.status();
                if status.is_client_error() {
                    status
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            GatewayError::MissingFile | GatewayError::InvalidName(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Gateway request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Gateway request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
