//! Error types for the assistant client.
//!
//! REST failures are collapsed into [`ApiError`]; SSE frame-level
//! failures live in [`crate::sse::SseParseError`] and are never fatal
//! to a stream.

use thiserror::Error;

/// Errors produced by the REST client and the streaming transport.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP transport failed (connection refused, timeout, TLS, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be deserialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned a non-success envelope or status
    #[error("server error ({status}): {message}")]
    Server {
        status: u16,
        error_code: Option<i64>,
        message: String,
    },

    /// Envelope was marked successful but carried no data payload
    #[error("missing data in response from {endpoint}")]
    MissingData { endpoint: String },

    /// No access token available for an authenticated endpoint
    #[error("not authenticated")]
    NotAuthenticated,

    /// The one-shot refresh-token exchange failed; the session was cleared
    #[error("session expired: {0}")]
    SessionExpired(String),
}

impl ApiError {
    /// Whether this error came back as an HTTP 401.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Server { status: 401, .. })
    }
}
