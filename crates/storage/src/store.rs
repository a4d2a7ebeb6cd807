use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Key/value object storage, implemented by the S3 and local-directory backends.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` under `key`, replacing any existing object.
    async fn put_bytes(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Upload a local file. Backends that can stream override this.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("read upload source {}", path.display()))?;
        self.put_bytes(key, body, content_type).await
    }

    /// All objects whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Remove `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
