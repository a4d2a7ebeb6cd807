use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use starbackup_archive::{Archiver, GitArchiver};
use starbackup_core::naming::backup_id;
use starbackup_core::{ListingSummary, Manifest};
use starbackup_github::{GitHubClient, GitHubConfig, TargetUser};
use starbackup_storage::{BackupRepository, LocalStore, ManifestMode, ObjectStore, S3Store};
use tracing::{info, warn};

use crate::config::{Settings, StorageTarget};
use crate::pipeline::{Pipeline, RunStats};

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// List and enrich only; nothing is cloned or uploaded.
    pub dry_run: bool,
    pub max_repos: Option<usize>,
    pub enrich: bool,
}

#[derive(Debug)]
pub struct RunReport {
    pub manifest: Manifest,
    /// `None` for dry runs.
    pub manifest_key: Option<String>,
    pub stats: RunStats,
}

/// One configured backup job: where stars come from and where archives go.
pub struct Runner {
    github: GitHubClient,
    target: TargetUser,
    archiver: Arc<dyn Archiver>,
    backups: BackupRepository,
    manifest_mode: ManifestMode,
}

impl Runner {
    pub fn new(
        github: &GitHubConfig,
        target: TargetUser,
        archiver: Arc<dyn Archiver>,
        backups: BackupRepository,
        manifest_mode: ManifestMode,
    ) -> Result<Self> {
        Ok(Self {
            github: GitHubClient::new(github)?,
            target,
            archiver,
            backups,
            manifest_mode,
        })
    }

    /// Wire up the real archiver and the configured object store.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match &settings.storage {
            StorageTarget::S3(s3) => {
                info!(endpoint = %s3.endpoint, bucket = %s3.bucket, "using S3 storage");
                Arc::new(S3Store::new(s3))
            }
            StorageTarget::Local(dir) => {
                info!(dir = %dir.display(), "using local storage");
                Arc::new(LocalStore::new(dir)?)
            }
        };

        let mut archiver = GitArchiver::new(Some(settings.github.token.clone()));
        if let Some(dir) = &settings.work_dir {
            archiver = archiver.with_work_root(dir);
        }

        Self::new(
            &settings.github,
            settings.target.clone(),
            Arc::new(archiver),
            BackupRepository::new(store, settings.key_prefix.clone()),
            settings.manifest_mode,
        )
    }

    pub async fn run_once(&self, opts: RunOptions) -> Result<RunReport> {
        let started = Utc::now();

        let user = self
            .github
            .resolve_user(&self.target)
            .await
            .context("resolving GitHub user")?;
        info!(login = %user.login, id = user.id, "resolved GitHub user");

        let listing = self
            .github
            .list_starred(&user.login)
            .await
            .context("listing starred repositories")?;
        let total_starred = listing.repos.len();
        let mut repos = listing.repos;
        if let Some(max) = opts.max_repos {
            repos.truncate(max);
        }
        info!(starred = total_starred, selected = repos.len(), "starred repositories listed");

        if opts.enrich {
            for repo in &mut repos {
                if let Err(e) = self.github.enrich(repo).await {
                    // Only a spent rate limit comes back here; further calls would fail too.
                    warn!(error = %e, "rate limited, skipping remaining metadata lookups");
                    break;
                }
            }
        }

        let mut manifest = Manifest::new(backup_id(started), started);
        manifest.backup_info.github_username = Some(user.login.clone());
        manifest.backup_info.github_user_id = Some(user.id);
        manifest.backup_info.total_starred = total_starred;
        manifest.backup_info.dry_run = opts.dry_run;
        manifest.listing = ListingSummary {
            pages: listing.pages,
            rate_limited_until: listing.rate_limited_until,
        };

        if opts.dry_run {
            for repo in &repos {
                info!(repo = %repo.full_name, size_kb = repo.size_kb, "would back up");
            }
            info!(planned = repos.len(), "dry run, nothing cloned or uploaded");
            return Ok(RunReport {
                manifest,
                manifest_key: None,
                stats: RunStats::default(),
            });
        }

        let pipeline = Pipeline::new(Arc::clone(&self.archiver), self.backups.clone());
        let stats = pipeline.run(&mut manifest, repos).await;

        let key = self
            .backups
            .publish_manifest(&manifest, self.manifest_mode)
            .await
            .context("uploading manifest")?;

        info!(
            backup_id = %manifest.backup_info.backup_id,
            backed_up = stats.backed_up,
            updated = stats.updated,
            failed = stats.failed,
            manifest = %key,
            elapsed_secs = (Utc::now() - started).num_seconds(),
            "backup run finished"
        );
        Ok(RunReport {
            manifest,
            manifest_key: Some(key),
            stats,
        })
    }
}
