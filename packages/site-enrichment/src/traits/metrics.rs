use async_trait::async_trait;

use crate::error::FetchResult;
use crate::types::metrics::MetricsSnapshot;

/// Source of traffic metrics for a bare domain.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Fetch metrics for `domain` (scheme and `www.` already stripped).
    ///
    /// Partial data is still a success; a provider with nothing at all for
    /// the domain returns `FetchError::NotFound`.
    async fn fetch_metrics(&self, domain: &str) -> FetchResult<MetricsSnapshot>;

    /// Ask the provider to start collecting data for unknown domains.
    ///
    /// Best-effort: callers log failures and move on.
    async fn queue_collection(&self, _domains: &[String]) -> FetchResult<()> {
        Ok(())
    }
}
