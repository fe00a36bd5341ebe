use async_trait::async_trait;

use crate::error::FetchResult;
use crate::types::seo::SeoMetadata;

/// Result of rendering one page.
#[derive(Debug, Clone)]
pub struct PageCapture {
    /// Encoded full-resolution screenshot.
    pub screenshot: Vec<u8>,
    pub seo: SeoMetadata,
}

/// Remote headless browser.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Navigate to `url`, capture a screenshot and scrape page metadata.
    async fn capture_full_data(&self, url: &str) -> FetchResult<PageCapture>;
}
