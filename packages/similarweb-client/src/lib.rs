//! Pure SimilarWeb-compatible REST API client.
//!
//! Talks to a traffic-data service exposing `/domain/{domain}`,
//! `/domain/batch`, `/collect` and `/queue`.
//!
//! # Example
//!
//! ```rust,ignore
//! use similarweb_client::SimilarWebClient;
//!
//! let client = SimilarWebClient::new("https://traffic.internal/api/v1", "key".into())?;
//!
//! if let Some(metrics) = client.get_domain_data("example.com", 30).await? {
//!     println!("{:?}", metrics.monthly_visits);
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{Result, SimilarWebError};
pub use types::{
    BatchResult, CollectionPriority, DomainMetrics, FlexNumber, QueueStatus, RawDomainData,
    TrafficSources,
};

use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use types::{BatchRequest, BatchResponse, CollectRequest, SingleResponse};

/// Maximum domains accepted by the batch endpoint.
pub const MAX_BATCH_DOMAINS: usize = 100;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SimilarWebClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SimilarWebClient {
    pub fn new(base_url: impl Into<String>, api_key: String) -> Result<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    /// Build a client whose every request is bounded by `timeout`.
    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Fetch metrics for a single bare domain.
    ///
    /// Returns `Ok(None)` when the provider knows the domain but has neither
    /// visits nor rank for it.
    pub async fn get_domain_data(&self, domain: &str, max_age_days: u32) -> Result<Option<DomainMetrics>> {
        let url = format!("{}/domain/{}", self.base_url, domain);
        let resp = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .query(&[("maxAge", max_age_days)])
            .send()
            .await
            .map_err(SimilarWebError::from_transport)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(SimilarWebError::NotFound(domain.to_string()));
        }
        let resp = check_status(resp).await?;

        let body: SingleResponse = resp
            .json()
            .await
            .map_err(SimilarWebError::from_body)?;

        Ok(body.data.and_then(RawDomainData::into_metrics))
    }

    /// Look up to [`MAX_BATCH_DOMAINS`] domains in one request.
    pub async fn batch_get_domains(
        &self,
        domains: &[String],
        max_age_days: u32,
    ) -> Result<Vec<BatchResult>> {
        if domains.is_empty() {
            return Ok(Vec::new());
        }
        if domains.len() > MAX_BATCH_DOMAINS {
            return Err(SimilarWebError::BatchTooLarge(domains.len()));
        }

        let url = format!("{}/domain/batch", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(&BatchRequest {
                domains,
                max_age: max_age_days,
            })
            .send()
            .await
            .map_err(SimilarWebError::from_transport)?;
        let resp = check_status(resp).await?;

        let body: BatchResponse = resp
            .json()
            .await
            .map_err(SimilarWebError::from_body)?;

        let items = body.data.or(body.results).unwrap_or_default();
        Ok(items
            .into_iter()
            .map(|item| {
                let domain = item.domain.clone().unwrap_or_default();
                let error = item.message.clone();
                BatchResult {
                    domain,
                    data: item.into_metrics(),
                    error,
                }
            })
            .collect())
    }

    /// Ask the provider to collect data for domains it does not know yet.
    pub async fn queue_collection(
        &self,
        domains: &[String],
        priority: CollectionPriority,
    ) -> Result<()> {
        if domains.is_empty() {
            return Ok(());
        }

        let url = format!("{}/collect", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(&CollectRequest { domains, priority })
            .send()
            .await
            .map_err(SimilarWebError::from_transport)?;
        check_status(resp).await?;

        tracing::info!(count = domains.len(), "Queued domains for collection");
        Ok(())
    }

    pub async fn queue_status(&self) -> Result<QueueStatus> {
        let url = format!("{}/queue", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(SimilarWebError::from_transport)?;
        let resp = check_status(resp).await?;

        resp.json()
            .await
            .map_err(SimilarWebError::from_body)
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(SimilarWebError::RateLimited { retry_after });
    }

    let message = resp.text().await.unwrap_or_default();
    Err(SimilarWebError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::io::Write;

    fn client_for(server: &mockito::ServerGuard) -> SimilarWebClient {
        SimilarWebClient::new(server.url(), "test-key".into()).unwrap()
    }

    #[tokio::test]
    async fn get_domain_data_parses_string_numbers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/domain/example.com")
            .match_header("x-api-key", "test-key")
            .match_query(Matcher::UrlEncoded("maxAge".into(), "30".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":{"domain":"example.com","monthly_visits":"1,500","global_rank":4200,
                    "bounce_rate":"41.5","traffic_sources":{"direct":0.5,"search":0.3}}}"#,
            )
            .create_async()
            .await;

        let metrics = client_for(&server)
            .get_domain_data("example.com", 30)
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(metrics.monthly_visits, Some(1500));
        assert_eq!(metrics.global_rank, Some(4200));
        assert_eq!(metrics.bounce_rate, Some(41.5));
        assert_eq!(metrics.traffic_sources.unwrap().direct, 0.5);
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/domain/busy.com")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "120")
            .create_async()
            .await;

        let err = client_for(&server)
            .get_domain_data("busy.com", 30)
            .await
            .unwrap_err();

        match err {
            SimilarWebError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(120)));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_domain_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/domain/nope.example")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let err = client_for(&server)
            .get_domain_data("nope.example", 30)
            .await
            .unwrap_err();
        assert!(matches!(err, SimilarWebError::NotFound(d) if d == "nope.example"));
    }

    #[tokio::test]
    async fn server_error_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/domain/broken.com")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let err = client_for(&server)
            .get_domain_data("broken.com", 30)
            .await
            .unwrap_err();
        assert!(matches!(err, SimilarWebError::Api { status: 502, .. }));
    }

    #[tokio::test]
    async fn stalled_body_is_a_timeout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/domain/slow.com")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_chunked_body(|w| {
                w.write_all(br#"{"data":"#)?;
                w.flush()?;
                std::thread::sleep(Duration::from_secs(2));
                w.write_all(br#"{"domain":"slow.com","monthly_visits":1}}"#)
            })
            .create_async()
            .await;

        let client =
            SimilarWebClient::with_timeout(server.url(), "test-key".into(), Duration::from_millis(300))
                .unwrap();
        let err = client.get_domain_data("slow.com", 30).await.unwrap_err();

        assert!(matches!(err, SimilarWebError::Timeout), "got {err:?}");
    }

    #[tokio::test]
    async fn batch_rejects_oversized_requests() {
        let server = mockito::Server::new_async().await;
        let domains: Vec<String> = (0..101).map(|i| format!("site{i}.com")).collect();

        let err = client_for(&server)
            .batch_get_domains(&domains, 30)
            .await
            .unwrap_err();
        assert!(matches!(err, SimilarWebError::BatchTooLarge(101)));
    }

    #[tokio::test]
    async fn batch_accepts_results_key() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/domain/batch")
            .with_status(200)
            .with_body(
                r#"{"results":[
                    {"domain":"a.com","monthly_visits":100,"global_rank":null},
                    {"domain":"b.com","monthly_visits":null,"global_rank":null,"message":"not collected"}
                ]}"#,
            )
            .create_async()
            .await;

        let domains = vec!["a.com".to_string(), "b.com".to_string()];
        let results = client_for(&server)
            .batch_get_domains(&domains, 30)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].data.as_ref().unwrap().monthly_visits, Some(100));
        assert!(results[1].data.is_none());
        assert_eq!(results[1].error.as_deref(), Some("not collected"));
    }
}
