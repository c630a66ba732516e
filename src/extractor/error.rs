//! Error taxonomy for the extraction pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Every way a single extraction can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The URL is not a recognised post-detail URL.
    #[error("invalid post URL: {0}")]
    InvalidUrl(String),

    /// Neither the request nor the process configuration supplied cookies.
    #[error("no cookies provided: supply cookies in the request or configure XHS_COOKIES")]
    AuthMissing,

    /// The platform rejected the session (expired or invalid cookie, or a
    /// post gated behind an access token).
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The post does not exist, was deleted, or is private.
    #[error("post not found: {0}")]
    NotFound(String),

    /// The platform is throttling this client.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Connection, DNS or timeout failure, or an upstream 5xx.
    #[error("network error: {0}")]
    Network(String),

    /// A response arrived but did not contain a well-formed payload envelope.
    #[error("malformed response envelope: {0}")]
    ParseFailure(String),

    /// The payload envelope was fine but the note inside it was not.
    #[error("unexpected note payload: {0}")]
    Parse(String),

    /// The batch was cancelled before this item was started.
    #[error("cancelled before the request was sent")]
    Cancelled,

    /// A worker task died without producing an outcome.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Machine-readable tag for an [`ExtractError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    AuthMissing,
    AuthError,
    NotFound,
    RateLimited,
    NetworkError,
    ParseFailure,
    ParseError,
    Cancelled,
    Internal,
}

impl ExtractError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::AuthMissing => ErrorKind::AuthMissing,
            Self::Auth(_) => ErrorKind::AuthError,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::ParseFailure(_) => ErrorKind::ParseFailure,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only network-class failures are worth repeating with the same inputs.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else if e.is_connect() {
            Self::Network(format!("connection failed: {e}"))
        } else {
            Self::Network(e.to_string())
        }
    }
}
