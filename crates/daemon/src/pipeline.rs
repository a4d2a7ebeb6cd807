use std::io;
use std::sync::Arc;

use chrono::Utc;
use starbackup_archive::{Archive, ArchiveError, Archiver};
use starbackup_core::{ArchiveName, ErrorStage, Manifest, ManifestEntry, StarredRepo};
use starbackup_storage::BackupRepository;
use tracing::{error, info, warn};

/// Clone, archive and upload repositories one at a time, recording each
/// outcome in the manifest. A failed repository never stops the run.
pub struct Pipeline {
    archiver: Arc<dyn Archiver>,
    repo: BackupRepository,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub backed_up: usize,
    pub updated: usize,
    pub failed: usize,
}

enum Failure {
    Archive(ArchiveError),
    Upload(anyhow::Error),
}

impl Pipeline {
    pub fn new(archiver: Arc<dyn Archiver>, repo: BackupRepository) -> Self {
        Self { archiver, repo }
    }

    pub async fn run(&self, manifest: &mut Manifest, repos: Vec<StarredRepo>) -> RunStats {
        let total = repos.len();
        let mut stats = RunStats::default();

        for (i, repo) in repos.into_iter().enumerate() {
            info!(repo = %repo.full_name, n = i + 1, total, "backing up");
            match self.backup_one(&repo).await {
                Ok(entry) => {
                    stats.backed_up += 1;
                    if entry.is_update {
                        stats.updated += 1;
                    }
                    manifest.record_entry(entry);
                }
                Err(Failure::Archive(e)) => {
                    stats.failed += 1;
                    error!(repo = %repo.full_name, stage = ?e.stage(), error = %e, "archive failed");
                    manifest.record_error(&repo.full_name, e.stage(), e.to_string());
                }
                Err(Failure::Upload(e)) => {
                    stats.failed += 1;
                    let message = format!("{e:#}");
                    error!(repo = %repo.full_name, error = %message, "upload failed");
                    manifest.record_error(&repo.full_name, ErrorStage::Upload, message);
                }
            }
        }

        stats
    }

    async fn backup_one(&self, repo: &StarredRepo) -> Result<ManifestEntry, Failure> {
        let archive = self.archive(repo).await?;

        let name = ArchiveName::new(
            Utc::now().date_naive(),
            archive.content_hash(),
            &repo.owner.login,
            &repo.name,
        );
        let outcome = self
            .repo
            .publish_archive(&name, archive.path())
            .await
            .map_err(Failure::Upload)?;
        if !outcome.cleanup_failures.is_empty() {
            warn!(
                repo = %repo.full_name,
                failed = outcome.cleanup_failures.len(),
                "some superseded archives could not be deleted"
            );
        }

        Ok(ManifestEntry {
            is_update: outcome.is_update,
            archive_key: outcome.key,
            full_name: repo.full_name.clone(),
            content_hash: archive.content_hash().to_owned(),
            size_bytes: archive.size_bytes(),
            backed_up_at: Utc::now(),
            superseded: outcome.superseded,
            cleanup_failures: outcome.cleanup_failures,
            cleanup_error: outcome.cleanup_error,
            repo: repo.clone(),
        })
    }

    async fn archive(&self, repo: &StarredRepo) -> Result<Archive, Failure> {
        let archiver = Arc::clone(&self.archiver);
        let target = repo.clone();
        tokio::task::spawn_blocking(move || archiver.archive(&target))
            .await
            .map_err(|e| Failure::Archive(ArchiveError::Io(io::Error::other(e))))?
            .map_err(Failure::Archive)
    }
}
