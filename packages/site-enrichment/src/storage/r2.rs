//! Cloudflare R2 object storage over the Cloudflare REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, StatusCode};

use crate::error::{StorageError, StorageResult};
use crate::security::credentials::CloudflareCredentials;
use crate::traits::object_store::ObjectStore;

const API_BASE: &str = "https://api.cloudflare.com/client/v4";

pub struct R2ObjectStore {
    client: reqwest::Client,
    api_base: String,
    credentials: CloudflareCredentials,
    bucket: String,
    public_base_url: String,
}

impl R2ObjectStore {
    pub fn new(
        credentials: CloudflareCredentials,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> StorageResult<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(StorageError::Config("R2 bucket name is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            credentials,
            bucket,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Point at a different API root (tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/accounts/{}/r2/buckets/{}/objects/{}",
            self.api_base, self.credentials.account_id, self.bucket, key
        )
    }
}

#[async_trait]
impl ObjectStore for R2ObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String> {
        let size = bytes.len();
        let resp = self
            .client
            .put(self.object_url(key))
            .bearer_auth(self.credentials.api_token.expose())
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StorageError::Upload {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        tracing::debug!(key, size, "Uploaded object to R2");
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let resp = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(self.credentials.api_token.expose())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(StorageError::Upload {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        })
    }
}
