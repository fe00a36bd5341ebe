//! Typed errors for the enrichment library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match
//! on the failure class when deciding how to persist a record outcome.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Failure of a single outbound call to a metrics provider or renderer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// The call exceeded its wall-clock budget
    #[error("timed out after {}s", budget.as_secs_f64())]
    Timeout { budget: Duration },

    /// Provider asked us to slow down
    #[error("rate limited{}", retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// Provider has no data for the domain
    #[error("no data found for domain")]
    NotFound,

    /// Target page could not be loaded
    #[error("navigation failed: {0}")]
    NavigationError(String),

    /// The provider itself errored (5xx, bad payload, auth)
    #[error("upstream error: {0}")]
    UpstreamError(String),
}

impl FetchError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Artifact upload or thumbnail failure. Always treated as retryable.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upload rejected ({status}): {message}")]
    Upload { status: u16, message: String },

    #[error("thumbnail generation failed: {0}")]
    Thumbnail(String),

    #[error("storage misconfigured: {0}")]
    Config(String),
}

/// Status store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record is not in the expected state (claim lost to another worker)
    #[error("record {id} was claimed or modified concurrently")]
    Conflict { id: Uuid },

    #[error("record {id} not found")]
    NotFound { id: Uuid },

    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(Box::new(err))
    }
}

/// Errors surfaced by the orchestrator.
///
/// Per-record variants (`Metrics`, `Render`, `Storage`, `InvalidUrl`) are
/// converted into a `failed` status write and never escape a run.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("metrics: {0}")]
    Metrics(FetchError),

    #[error("render: {0}")]
    Render(FetchError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("invalid product url: {0}")]
    InvalidUrl(String),

    #[error("config error: {0}")]
    Config(String),
}

impl EnrichmentError {
    /// Provider-suggested delay, if the failure was a rate limit.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            EnrichmentError::Metrics(e) | EnrichmentError::Render(e) => e.retry_after(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EnrichmentError::Metrics(FetchError::NotFound))
    }
}

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, EnrichmentError>;

/// Result type alias for external fetches.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for artifact storage.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for status store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
