use std::time::Duration;

use async_trait::async_trait;
use browser_rendering_client::{BrowserRenderingClient, RenderingError, ScreenshotOptions, Viewport};

use crate::error::{FetchError, FetchResult};
use crate::security::credentials::CloudflareCredentials;
use crate::traits::renderer::{PageCapture, PageRenderer};
use crate::types::seo::SeoMetadata;

/// Screenshots and rendered HTML from Cloudflare Browser Rendering.
pub struct BrowserRenderingProvider {
    client: BrowserRenderingClient,
    options: ScreenshotOptions,
    timeout: Duration,
}

impl BrowserRenderingProvider {
    pub fn new(credentials: &CloudflareCredentials, timeout: Duration) -> FetchResult<Self> {
        let client = BrowserRenderingClient::with_timeout(
            credentials.account_id.clone(),
            credentials.api_token.expose().to_string(),
            timeout,
        )
        .map_err(|e| FetchError::UpstreamError(e.to_string()))?;

        Ok(Self {
            client,
            options: ScreenshotOptions::default(),
            timeout,
        })
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.options.viewport = Viewport { width, height };
        self
    }

    pub fn with_full_page(mut self, full_page: bool) -> Self {
        self.options.full_page = full_page;
        self
    }

    pub fn with_api_base(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }

    fn classify(&self, err: RenderingError) -> FetchError {
        match err {
            RenderingError::Timeout => FetchError::Timeout {
                budget: self.timeout,
            },
            RenderingError::RateLimited { retry_after } => FetchError::RateLimited { retry_after },
            RenderingError::Navigation(msg) => FetchError::NavigationError(msg),
            other => FetchError::UpstreamError(other.to_string()),
        }
    }
}

#[async_trait]
impl PageRenderer for BrowserRenderingProvider {
    async fn capture_full_data(&self, url: &str) -> FetchResult<PageCapture> {
        let (screenshot, html) = tokio::try_join!(
            self.client.screenshot(url, &self.options),
            self.client.content(url),
        )
        .map_err(|e| self.classify(e))?;

        Ok(PageCapture {
            screenshot,
            seo: SeoMetadata::from_html(&html, url),
        })
    }
}
