use std::sync::Arc;

use cas_types::HashParseError;
use thiserror::Error;
use xorb_codec::XorbCodecError;

/// Errors surfaced by the CAS download client.
///
/// The type is `Clone` (non-clonable sources are wrapped in `Arc`) so a single
/// failure can be handed to every task awaiting a shared download or token
/// refresh.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum CasClientError {
    #[error("Invalid file id: {0}")]
    InvalidFileId(#[from] HashParseError),

    #[error("Invalid URL: {0}")]
    UrlParseError(Arc<url::ParseError>),

    #[error("Refusing non-HTTPS URL to host {0:?}; enable insecure URLs to permit this")]
    InsecureUrl(String),

    #[error("Malformed token response: {0}")]
    MalformedTokenResponse(String),

    #[error("Token refresh failed with status {status}: {body}")]
    TokenRefreshFailed { status: u16, body: String },

    #[error("Reconstruction query for {file_id} failed with status {status}: {body}")]
    ReconstructionFailed {
        /// Truncated file id prefix, not the full hash.
        file_id: String,
        status: u16,
        body: String,
    },

    #[error("Malformed reconstruction: {0}")]
    MalformedReconstruction(String),

    #[error("Fetch from {url_host} failed with status {status:?}")]
    FetchFailed { url_host: String, status: Option<u16> },

    #[error("Range response length mismatch: expected {expected} bytes, got {actual}")]
    RangeLengthMismatch { expected: u64, actual: u64 },

    #[error("Xorb decode error: {0}")]
    XorbCodecError(Arc<XorbCodecError>),

    #[error("HTTP error: {0}")]
    ReqwestError(Arc<reqwest::Error>),

    #[error("HTTP middleware error: {0}")]
    ReqwestMiddlewareError(Arc<reqwest_middleware::Error>),

    #[error("IO error: {0}")]
    IoError(Arc<std::io::Error>),

    #[error("Task join error: {0}")]
    JoinError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, CasClientError>;

impl From<url::ParseError> for CasClientError {
    fn from(err: url::ParseError) -> Self {
        CasClientError::UrlParseError(Arc::new(err))
    }
}

impl From<XorbCodecError> for CasClientError {
    fn from(err: XorbCodecError) -> Self {
        CasClientError::XorbCodecError(Arc::new(err))
    }
}

impl From<reqwest::Error> for CasClientError {
    fn from(err: reqwest::Error) -> Self {
        CasClientError::ReqwestError(Arc::new(err))
    }
}

impl From<reqwest_middleware::Error> for CasClientError {
    fn from(err: reqwest_middleware::Error) -> Self {
        CasClientError::ReqwestMiddlewareError(Arc::new(err))
    }
}

impl From<std::io::Error> for CasClientError {
    fn from(err: std::io::Error) -> Self {
        CasClientError::IoError(Arc::new(err))
    }
}

impl From<tokio::task::JoinError> for CasClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        CasClientError::JoinError(err.to_string())
    }
}

impl From<tokio::sync::AcquireError> for CasClientError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        CasClientError::InternalError(format!("semaphore closed: {err}"))
    }
}

impl<T> From<std::sync::PoisonError<T>> for CasClientError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        CasClientError::InternalError("lock poisoned".to_string())
    }
}
