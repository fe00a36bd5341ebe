//! Screenshot artifact storage.
//!
//! Turns one captured screenshot into a full-size + thumbnail pair of
//! public URLs. The thumbnail is generated before anything is uploaded, and
//! a half-uploaded pair is rolled back, so callers only ever see a complete
//! pair or an error.

pub mod local;
pub mod r2;
pub mod thumbnail;

pub use local::LocalObjectStore;
pub use r2::R2ObjectStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::traits::object_store::ObjectStore;
use crate::types::{config::ThumbnailSpec, domain::sanitize_key, record::ArtifactPair};

const SCREENSHOT_PREFIX: &str = "screenshots";
const THUMBNAIL_PREFIX: &str = "screenshots/thumbnails";

/// Object keys for one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    pub full: String,
    pub thumbnail: String,
}

impl ArtifactKeys {
    /// Keys embed the capture time so repeated captures never collide.
    pub fn for_capture(domain_key: &str, captured_at: DateTime<Utc>) -> Self {
        let stem = format!("{}-{}", sanitize_key(domain_key), captured_at.timestamp_millis());
        Self {
            full: format!("{SCREENSHOT_PREFIX}/{stem}.png"),
            thumbnail: format!("{THUMBNAIL_PREFIX}/{stem}-thumb.jpg"),
        }
    }
}

#[derive(Clone)]
pub struct ScreenshotStorage {
    store: Arc<dyn ObjectStore>,
    thumbnail: ThumbnailSpec,
}

impl ScreenshotStorage {
    pub fn new(store: Arc<dyn ObjectStore>, thumbnail: ThumbnailSpec) -> Self {
        Self { store, thumbnail }
    }

    /// Upload a screenshot and its thumbnail.
    pub async fn save_screenshot(
        &self,
        bytes: Vec<u8>,
        domain_key: &str,
        captured_at: DateTime<Utc>,
    ) -> StorageResult<ArtifactPair> {
        let keys = ArtifactKeys::for_capture(domain_key, captured_at);

        let spec = self.thumbnail;
        let (bytes, thumb) = tokio::task::spawn_blocking(move || {
            let thumb = thumbnail::make_thumbnail(&bytes, spec);
            (bytes, thumb)
        })
        .await
        .map_err(|e| StorageError::Thumbnail(format!("thumbnail task failed: {e}")))?;
        let thumb = thumb?;

        let full_url = self.store.put(&keys.full, bytes, "image/png").await?;

        let thumbnail_url = match self.store.put(&keys.thumbnail, thumb, "image/jpeg").await {
            Ok(url) => url,
            Err(e) => {
                // Best-effort rollback of the orphaned full-size object.
                if let Err(cleanup) = self.store.delete(&keys.full).await {
                    warn!(key = %keys.full, error = %cleanup, "Failed to remove orphaned screenshot");
                }
                return Err(e);
            }
        };

        debug!(full = %keys.full, thumbnail = %keys.thumbnail, "Saved screenshot pair");
        Ok(ArtifactPair {
            full_url,
            thumbnail_url,
        })
    }

    /// Upload an arbitrary file under `{path}/{key}`.
    pub async fn upload_file(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        path: &str,
        key: &str,
    ) -> StorageResult<String> {
        let path = path.trim_matches('/');
        let key = key.trim_start_matches('/');
        let object_key = if path.is_empty() {
            key.to_string()
        } else {
            format!("{path}/{key}")
        };
        self.store.put(&object_key, bytes, content_type).await
    }
}
