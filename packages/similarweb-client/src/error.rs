use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimilarWebError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("domain not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("batch too large: {0} domains (max {max})", max = crate::MAX_BATCH_DOMAINS)]
    BatchTooLarge(usize),
}

impl SimilarWebError {
    /// Map a transport error, splitting out timeouts.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SimilarWebError::Timeout
        } else {
            SimilarWebError::Http(err)
        }
    }

    /// Map a failure while reading or decoding a response body. The client
    /// timeout can fire mid-body, which must still read as a timeout.
    pub(crate) fn from_body(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SimilarWebError::Timeout
        } else {
            SimilarWebError::InvalidPayload(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SimilarWebError>;
