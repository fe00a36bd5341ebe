use async_trait::async_trait;

use crate::error::StorageResult;

/// Blob storage with publicly resolvable URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return its public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String>;

    /// Remove an object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
