use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("render timed out")]
    Timeout,

    #[error("rate limited by rendering service")]
    RateLimited { retry_after: Option<Duration> },

    /// The page itself could not be loaded (bad URL, DNS, 4xx target).
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl RenderingError {
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RenderingError::Timeout
        } else {
            RenderingError::Http(err)
        }
    }

    /// Map a body read or decode failure; a mid-body client timeout stays a timeout.
    pub(crate) fn from_body(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RenderingError::Timeout
        } else {
            RenderingError::UnexpectedResponse(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderingError>;
