use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use starbackup_core::naming::{is_manifest_key, manifest_file_name, object_key};
use starbackup_core::{ArchiveName, Manifest};
use tracing::{info, warn};

use crate::store::{ObjectInfo, ObjectStore};

const ZIP_CONTENT_TYPE: &str = "application/zip";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestMode {
    /// Keep only the newest manifest.
    #[default]
    Replace,
    /// Keep every run's manifest.
    Append,
}

impl std::str::FromStr for ManifestMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            other => anyhow::bail!("unknown manifest mode {other:?} (expected replace or append)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub key: String,
    /// The repository had at least one archive before this upload.
    pub is_update: bool,
    /// Older archives of the same repository, other than `key`.
    pub superseded: Vec<String>,
    /// Superseded keys whose deletion failed.
    pub cleanup_failures: Vec<String>,
    /// Why older archives could not be listed; nothing was deleted.
    pub cleanup_error: Option<String>,
}

/// Archive and manifest layout on top of an [`ObjectStore`].
#[derive(Clone)]
pub struct BackupRepository {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl BackupRepository {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into().trim_matches('/').to_owned(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn key_for(&self, name: &ArchiveName) -> String {
        object_key(&self.prefix, &name.file_name())
    }

    fn list_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        }
    }

    /// Keys directly under the configured prefix. Other prefixes and
    /// nested paths belong to someone else.
    fn owns(&self, key: &str) -> bool {
        key.strip_prefix(&self.list_prefix())
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
    }

    /// Archives currently stored for `owner/repo`, in key order.
    pub async fn existing_archives(&self, owner: &str, repo: &str) -> Result<Vec<ObjectInfo>> {
        let listed = self.store.list(&self.list_prefix()).await?;
        Ok(listed
            .into_iter()
            .filter(|obj| self.owns(&obj.key))
            .filter(|obj| {
                ArchiveName::parse(&obj.key).is_some_and(|name| name.is_same_repo(owner, repo))
            })
            .collect())
    }

    /// Note the archives already stored for the repository, upload the new
    /// one, then delete the noted keys other than the new one. Until the deletes finish both old and new copies exist,
    /// so an interrupted run never leaves a repository without a backup.
    ///
    /// Once the upload succeeds the outcome is `Ok`; cleanup problems are
    /// reported on it instead.
    pub async fn publish_archive(&self, name: &ArchiveName, file: &Path) -> Result<PublishOutcome> {
        let key = self.key_for(name);

        let (existing, cleanup_error) = match self.existing_archives(&name.owner, &name.repo).await {
            Ok(found) => (found.into_iter().map(|obj| obj.key).collect::<Vec<_>>(), None),
            Err(e) => {
                let message = format!("list archives of {}/{}: {e:#}", name.owner, name.repo);
                warn!(%key, error = %message, "cannot look up older archives, keeping them");
                (Vec::new(), Some(message))
            }
        };

        self.store
            .put_file(&key, file, ZIP_CONTENT_TYPE)
            .await
            .with_context(|| format!("upload archive {key}"))?;
        info!(%key, "uploaded archive");

        let is_update = !existing.is_empty();
        let superseded: Vec<String> = existing.into_iter().filter(|old| *old != key).collect();

        let mut cleanup_failures = Vec::new();
        for old in &superseded {
            match self.store.delete(old).await {
                Ok(()) => info!(key = %old, "deleted superseded archive"),
                Err(e) => {
                    warn!(key = %old, error = %e, "failed to delete superseded archive");
                    cleanup_failures.push(old.clone());
                }
            }
        }

        Ok(PublishOutcome {
            key,
            is_update,
            superseded,
            cleanup_failures,
            cleanup_error,
        })
    }

    /// Upload the run manifest and, in replace mode, drop earlier manifests.
    pub async fn publish_manifest(&self, manifest: &Manifest, mode: ManifestMode) -> Result<String> {
        let key = object_key(
            &self.prefix,
            &manifest_file_name(&manifest.backup_info.backup_id),
        );
        let body = manifest.to_json().context("serialize manifest")?;
        self.store
            .put_bytes(&key, body.into_bytes(), JSON_CONTENT_TYPE)
            .await
            .with_context(|| format!("upload manifest {key}"))?;
        info!(%key, entries = manifest.repositories.len(), errors = manifest.errors.len(), "uploaded manifest");

        if mode == ManifestMode::Replace {
            for old in self.store.list(&self.list_prefix()).await? {
                if old.key == key || !self.owns(&old.key) || !is_manifest_key(&old.key) {
                    continue;
                }
                match self.store.delete(&old.key).await {
                    Ok(()) => info!(key = %old.key, "deleted old manifest"),
                    Err(e) => warn!(key = %old.key, error = %e, "failed to delete old manifest"),
                }
            }
        }

        Ok(key)
    }
}
