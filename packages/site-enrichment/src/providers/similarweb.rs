use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use similarweb_client::{CollectionPriority, DomainMetrics, SimilarWebClient, SimilarWebError};

use crate::error::{FetchError, FetchResult};
use crate::security::credentials::SecretString;
use crate::traits::metrics::MetricsProvider;
use crate::types::metrics::{MetricsSnapshot, TrafficSources};

/// Cached provider data older than this is refreshed upstream.
const DEFAULT_MAX_AGE_DAYS: u32 = 30;

/// Traffic metrics from a SimilarWeb-compatible API.
pub struct SimilarWebProvider {
    client: SimilarWebClient,
    timeout: Duration,
    max_age_days: u32,
}

impl SimilarWebProvider {
    pub fn new(base_url: &str, api_key: &SecretString, timeout: Duration) -> FetchResult<Self> {
        let client = SimilarWebClient::with_timeout(base_url, api_key.expose().to_string(), timeout)
            .map_err(|e| FetchError::UpstreamError(e.to_string()))?;
        Ok(Self {
            client,
            timeout,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        })
    }

    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age_days = days;
        self
    }

    fn classify(&self, err: SimilarWebError) -> FetchError {
        match err {
            SimilarWebError::Timeout => FetchError::Timeout {
                budget: self.timeout,
            },
            SimilarWebError::RateLimited { retry_after } => FetchError::RateLimited { retry_after },
            SimilarWebError::NotFound(_) => FetchError::NotFound,
            other => FetchError::UpstreamError(other.to_string()),
        }
    }
}

fn to_snapshot(metrics: DomainMetrics) -> MetricsSnapshot {
    MetricsSnapshot {
        monthly_visits: metrics.monthly_visits,
        global_rank: metrics.global_rank,
        country_rank: metrics.country_rank,
        bounce_rate: metrics.bounce_rate,
        pages_per_visit: metrics.pages_per_visit,
        avg_visit_duration_secs: metrics.avg_visit_duration,
        traffic_sources: metrics.traffic_sources.map(|t| TrafficSources {
            direct: t.direct,
            referral: t.referral,
            search: t.search,
            social: t.social,
            mail: t.mail,
            display: t.display,
        }),
        extra: metrics.extra,
        fetched_at: Utc::now(),
    }
}

#[async_trait]
impl MetricsProvider for SimilarWebProvider {
    async fn fetch_metrics(&self, domain: &str) -> FetchResult<MetricsSnapshot> {
        match self.client.get_domain_data(domain, self.max_age_days).await {
            Ok(Some(metrics)) => Ok(to_snapshot(metrics)),
            Ok(None) => Err(FetchError::NotFound),
            Err(e) => Err(self.classify(e)),
        }
    }

    async fn queue_collection(&self, domains: &[String]) -> FetchResult<()> {
        self.client
            .queue_collection(domains, CollectionPriority::Normal)
            .await
            .map_err(|e| self.classify(e))
    }
}
