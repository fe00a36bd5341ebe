//! Pure Cloudflare Browser Rendering REST client.
//!
//! Wraps the `/screenshot` and `/content` endpoints of the browser
//! rendering API. Both endpoints drive a remote headless browser, so a
//! call can fail either at the API layer or because the target page
//! could not be loaded.
//!
//! # Example
//!
//! ```rust,ignore
//! use browser_rendering_client::{BrowserRenderingClient, ScreenshotOptions};
//!
//! let client = BrowserRenderingClient::new("account-id", "api-token".into())?;
//! let png = client.screenshot("https://example.com", &ScreenshotOptions::default()).await?;
//! let html = client.content("https://example.com").await?;
//! ```

pub mod error;
pub mod types;

pub use error::{RenderingError, Result};
pub use types::{ImageFormat, ScreenshotOptions, Viewport};

use std::time::Duration;

use reqwest::{
    header::{CONTENT_TYPE, RETRY_AFTER},
    Response, StatusCode,
};
use types::{ApiEnvelope, CaptureOptions, ContentRequest, GotoOptions, ScreenshotRequest};

const BASE_URL: &str = "https://api.cloudflare.com/client/v4";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);
const WAIT_UNTIL: &str = "domcontentloaded";

pub struct BrowserRenderingClient {
    client: reqwest::Client,
    base_url: String,
    account_id: String,
    api_token: String,
    navigation_timeout_ms: u64,
}

impl BrowserRenderingClient {
    pub fn new(account_id: impl Into<String>, api_token: String) -> Result<Self> {
        Self::with_timeout(account_id, api_token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        account_id: impl Into<String>,
        api_token: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            account_id: account_id.into(),
            api_token,
            navigation_timeout_ms: ScreenshotOptions::default().navigation_timeout_ms,
        })
    }

    /// Point the client at a different API root (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/accounts/{}/browser-rendering/{}",
            self.base_url, self.account_id, name
        )
    }

    /// Capture a screenshot of `url` and return the encoded image bytes.
    pub async fn screenshot(&self, url: &str, options: &ScreenshotOptions) -> Result<Vec<u8>> {
        let body = ScreenshotRequest {
            url,
            viewport: options.viewport,
            goto_options: GotoOptions {
                wait_until: WAIT_UNTIL,
                timeout: options.navigation_timeout_ms,
            },
            screenshot_options: CaptureOptions {
                full_page: options.full_page,
                format: options.format,
            },
        };

        let resp = self
            .client
            .post(self.endpoint("screenshot"))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(RenderingError::from_transport)?;
        let resp = check_status(resp).await?;

        // The endpoint answers with JSON instead of an image when the
        // browser could not produce a capture.
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        if is_json {
            let text = resp.text().await.map_err(RenderingError::from_transport)?;
            let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&text)
                .map(|env| env.error_text())
                .unwrap_or(text);
            return Err(RenderingError::Navigation(message));
        }

        let bytes = resp.bytes().await.map_err(RenderingError::from_transport)?;
        if bytes.is_empty() {
            return Err(RenderingError::UnexpectedResponse(
                "empty screenshot body".to_string(),
            ));
        }

        tracing::debug!(url, size = bytes.len(), "Screenshot captured");
        Ok(bytes.to_vec())
    }

    /// Fetch the rendered HTML of `url`.
    pub async fn content(&self, url: &str) -> Result<String> {
        let body = ContentRequest {
            url,
            goto_options: GotoOptions {
                wait_until: WAIT_UNTIL,
                timeout: self.navigation_timeout_ms,
            },
        };

        let resp = self
            .client
            .post(self.endpoint("content"))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(RenderingError::from_transport)?;
        let resp = check_status(resp).await?;

        let envelope: ApiEnvelope<String> = resp
            .json()
            .await
            .map_err(RenderingError::from_body)?;

        match envelope.result {
            Some(html) if envelope.success => Ok(html),
            _ => Err(RenderingError::Navigation(envelope.error_text())),
        }
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(RenderingError::RateLimited { retry_after })
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Err(RenderingError::Timeout),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RenderingError::Api {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        }),
        s if s.is_client_error() => {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&text)
                .map(|env| env.error_text())
                .unwrap_or(text);
            Err(RenderingError::Navigation(message))
        }
        _ => Err(RenderingError::Api {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        }),
    }
}
