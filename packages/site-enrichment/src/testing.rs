//! Testing utilities including mock implementations.
//!
//! These let applications exercise the orchestrator without calling real
//! providers, a real browser or real object storage. Every mock records its
//! calls and supports failure injection.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{FetchError, FetchResult, StorageError, StorageResult};
use crate::traits::{
    metrics::MetricsProvider,
    object_store::ObjectStore,
    renderer::{PageCapture, PageRenderer},
};
use crate::types::{metrics::MetricsSnapshot, seo::SeoMetadata};

/// Encode a solid-color PNG of the given size.
pub fn test_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 120, 200]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("encoding an in-memory PNG cannot fail");
    buf.into_inner()
}

/// A mock metrics provider.
///
/// Returns a snapshot with 1000 monthly visits unless a response was
/// registered for the domain.
#[derive(Default)]
pub struct MockMetricsProvider {
    responses: Arc<RwLock<HashMap<String, FetchResult<MetricsSnapshot>>>>,
    default_error: Arc<RwLock<Option<FetchError>>>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
    queued: Arc<RwLock<Vec<String>>>,
}

impl MockMetricsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, domain: impl Into<String>, response: FetchResult<MetricsSnapshot>) -> Self {
        self.responses.write().unwrap().insert(domain.into(), response);
        self
    }

    /// Fail every domain without a registered response.
    pub fn failing_with(self, error: FetchError) -> Self {
        *self.default_error.write().unwrap() = Some(error);
        self
    }

    /// Sleep before answering (for timeout tests under paused time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn queued(&self) -> Vec<String> {
        self.queued.read().unwrap().clone()
    }
}

#[async_trait]
impl MetricsProvider for MockMetricsProvider {
    async fn fetch_metrics(&self, domain: &str) -> FetchResult<MetricsSnapshot> {
        self.calls.write().unwrap().push(domain.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(response) = self.responses.read().unwrap().get(domain) {
            return response.clone();
        }
        if let Some(error) = self.default_error.read().unwrap().clone() {
            return Err(error);
        }
        Ok(MetricsSnapshot::new(Utc::now()).with_monthly_visits(1000))
    }

    async fn queue_collection(&self, domains: &[String]) -> FetchResult<()> {
        self.queued.write().unwrap().extend(domains.iter().cloned());
        Ok(())
    }
}

/// A mock page renderer.
///
/// Returns a small PNG and a title derived from the URL unless a response
/// was registered for it.
pub struct MockRenderer {
    responses: Arc<RwLock<HashMap<String, FetchResult<PageCapture>>>>,
    default_error: Arc<RwLock<Option<FetchError>>>,
    screenshot: Vec<u8>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            responses: Arc::default(),
            default_error: Arc::default(),
            screenshot: test_png(640, 960),
            delay: None,
            calls: Arc::default(),
        }
    }

    pub fn with_response(self, url: impl Into<String>, response: FetchResult<PageCapture>) -> Self {
        self.responses.write().unwrap().insert(url.into(), response);
        self
    }

    pub fn failing_with(self, error: FetchError) -> Self {
        *self.default_error.write().unwrap() = Some(error);
        self
    }

    /// Return bytes that are not a decodable image.
    pub fn with_corrupt_screenshots(mut self) -> Self {
        self.screenshot = b"definitely not a png".to_vec();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn capture_full_data(&self, url: &str) -> FetchResult<PageCapture> {
        self.calls.write().unwrap().push(url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(response) = self.responses.read().unwrap().get(url) {
            return response.clone();
        }
        if let Some(error) = self.default_error.read().unwrap().clone() {
            return Err(error);
        }
        Ok(PageCapture {
            screenshot: self.screenshot.clone(),
            seo: SeoMetadata {
                title: Some(format!("Mock page for {url}")),
                ..Default::default()
            },
        })
    }
}

/// In-memory object store with failure injection.
#[derive(Default)]
pub struct MockObjectStore {
    objects: Arc<RwLock<HashMap<String, (Vec<u8>, String)>>>,
    deleted: Arc<RwLock<Vec<String>>>,
    fail_substring: Option<String>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject uploads whose key contains `needle`.
    pub fn fail_keys_containing(mut self, needle: impl Into<String>) -> Self {
        self.fail_substring = Some(needle.into());
        self
    }

    /// Reject every upload.
    pub fn failing() -> Self {
        Self::new().fail_keys_containing("")
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().unwrap().get(key).map(|(_, ct)| ct.clone())
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.read().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String> {
        if let Some(needle) = &self.fail_substring {
            if key.contains(needle.as_str()) {
                return Err(StorageError::Upload {
                    status: 503,
                    message: format!("injected failure for {key}"),
                });
            }
        }
        self.objects
            .write()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(format!("https://mock.storage/{key}"))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().unwrap().remove(key);
        self.deleted.write().unwrap().push(key.to_string());
        Ok(())
    }
}
