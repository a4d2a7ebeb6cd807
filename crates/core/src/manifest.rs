use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repo::StarredRepo;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStage {
    Clone,
    Archive,
    Upload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoError {
    pub full_name: String,
    pub stage: ErrorStage,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// One live archive for a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub archive_key: String,
    pub full_name: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub backed_up_at: DateTime<Utc>,
    /// True when the repository already had an archive, even at this key.
    pub is_update: bool,
    pub superseded: Vec<String>,
    /// Old archives that could not be removed; they are retried on the next run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleanup_failures: Vec<String>,
    /// Set when older archives could not be looked up at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
    pub repo: StarredRepo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    pub backup_id: String,
    pub created_at: DateTime<Utc>,
    pub github_username: Option<String>,
    pub github_user_id: Option<u64>,
    pub total_starred: usize,
    pub total_repos: usize,
    pub failed: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingSummary {
    pub pages: u32,
    /// Set when pagination stopped early because the API quota ran out.
    pub rate_limited_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Categories {
    pub by_language: BTreeMap<String, Vec<String>>,
    pub by_topic: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub backup_info: BackupInfo,
    pub listing: ListingSummary,
    pub repositories: Vec<ManifestEntry>,
    pub errors: Vec<RepoError>,
    /// `name` and `owner/name` to archive key.
    pub lookup: BTreeMap<String, String>,
    pub categories: Categories,
}

impl Manifest {
    pub fn new(backup_id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            backup_info: BackupInfo {
                backup_id,
                created_at,
                github_username: None,
                github_user_id: None,
                total_starred: 0,
                total_repos: 0,
                failed: 0,
                dry_run: false,
            },
            listing: ListingSummary::default(),
            repositories: Vec::new(),
            errors: Vec::new(),
            lookup: BTreeMap::new(),
            categories: Categories::default(),
        }
    }

    pub fn record_entry(&mut self, entry: ManifestEntry) {
        let key = entry.archive_key.clone();
        self.lookup.insert(entry.repo.name.clone(), key.clone());
        self.lookup.insert(entry.full_name.clone(), key.clone());

        let language = entry
            .repo
            .language
            .clone()
            .unwrap_or_else(|| "Unknown".to_owned());
        self.categories
            .by_language
            .entry(language)
            .or_default()
            .push(key.clone());
        for topic in &entry.repo.topics {
            self.categories
                .by_topic
                .entry(topic.clone())
                .or_default()
                .push(key.clone());
        }

        self.repositories.push(entry);
        self.backup_info.total_repos = self.repositories.len();
    }

    pub fn record_error(&mut self, full_name: &str, stage: ErrorStage, message: impl Into<String>) {
        self.errors.push(RepoError {
            full_name: full_name.to_owned(),
            stage,
            message: message.into(),
            at: Utc::now(),
        });
        self.backup_info.failed = self.errors.len();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
