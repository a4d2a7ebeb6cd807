use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use starbackup_archive::{Archive, ArchiveError, Archiver};
use starbackup_core::naming::backup_id;
use starbackup_core::{content_hash, ErrorStage, Manifest, StarredRepo};
use starbackup_daemon::pipeline::{Pipeline, RunStats};
use starbackup_storage::{BackupRepository, LocalStore, ManifestMode, ObjectStore};

/// Writes a tiny zip whose hash comes from a per-repo revision counter.
struct FakeArchiver {
    inaccessible: &'static str,
    revisions: Mutex<HashMap<String, u32>>,
}

impl FakeArchiver {
    fn new(inaccessible: &'static str) -> Self {
        Self {
            inaccessible,
            revisions: Mutex::new(HashMap::new()),
        }
    }

    fn bump(&self, full_name: &str) {
        *self
            .revisions
            .lock()
            .unwrap()
            .entry(full_name.to_owned())
            .or_default() += 1;
    }
}

impl Archiver for FakeArchiver {
    fn archive(&self, repo: &StarredRepo) -> Result<Archive, ArchiveError> {
        if repo.full_name == self.inaccessible {
            return Err(ArchiveError::Clone {
                url: repo.clone_url.clone(),
                stderr: "remote: Repository not found.".into(),
            });
        }
        let rev = self
            .revisions
            .lock()
            .unwrap()
            .get(&repo.full_name)
            .copied()
            .unwrap_or(0);
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(format!("{}.zip", repo.name));
        let mut file = std::fs::File::create(&path)?;
        write!(file, "{}@{rev}", repo.full_name)?;
        let hash = content_hash(format!("{}@{rev}", repo.full_name).as_bytes());
        Ok(Archive::new(dir, path, hash)?)
    }
}

fn starred() -> Vec<StarredRepo> {
    vec![
        StarredRepo::new("rust-lang", "rust", "https://github.com/rust-lang/rust.git"),
        StarredRepo::new("ghost", "gone", "https://github.com/ghost/gone.git"),
        StarredRepo::new("tokio-rs", "tokio", "https://github.com/tokio-rs/tokio.git"),
    ]
}

struct Harness {
    _tmp: tempfile::TempDir,
    store: Arc<LocalStore>,
    backups: BackupRepository,
    archiver: Arc<FakeArchiver>,
}

fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalStore::new(tmp.path().join("bucket")).unwrap());
    let backups = BackupRepository::new(store.clone(), "stars");
    Harness {
        _tmp: tmp,
        store,
        backups,
        archiver: Arc::new(FakeArchiver::new("ghost/gone")),
    }
}

async fn run(h: &Harness) -> (Manifest, RunStats) {
    let mut manifest = Manifest::new(backup_id(Utc::now()), Utc::now());
    let pipeline = Pipeline::new(h.archiver.clone(), h.backups.clone());
    let stats = pipeline.run(&mut manifest, starred()).await;
    (manifest, stats)
}

async fn archive_keys(store: &LocalStore) -> Vec<String> {
    store
        .list("stars/")
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key)
        .filter(|k| k.ends_with(".zip"))
        .collect()
}

#[tokio::test]
async fn one_inaccessible_repo_is_recorded_and_skipped() {
    let h = harness();
    let (manifest, stats) = run(&h).await;

    assert_eq!(
        stats,
        RunStats {
            backed_up: 2,
            updated: 0,
            failed: 1
        }
    );
    assert_eq!(manifest.repositories.len(), 2);
    assert_eq!(manifest.backup_info.total_repos, 2);
    assert_eq!(manifest.backup_info.failed, 1);
    assert_eq!(manifest.errors.len(), 1);
    assert_eq!(manifest.errors[0].full_name, "ghost/gone");
    assert_eq!(manifest.errors[0].stage, ErrorStage::Clone);

    let keys = archive_keys(&h.store).await;
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().any(|k| k.ends_with("_rust-lang_rust.zip")));
    assert!(keys.iter().any(|k| k.ends_with("_tokio-rs_tokio.zip")));
    assert_eq!(
        manifest.lookup.get("rust-lang/rust"),
        Some(&manifest.repositories[0].archive_key)
    );
}

#[tokio::test]
async fn rerun_keeps_one_archive_per_repo() {
    let h = harness();
    let (first, _) = run(&h).await;

    h.archiver.bump("rust-lang/rust");
    let (second, stats) = run(&h).await;

    assert_eq!(stats.backed_up, 2);
    assert_eq!(stats.updated, 2);
    let keys = archive_keys(&h.store).await;
    assert_eq!(keys.len(), 2);

    let rust_old = &first.repositories[0];
    let rust_new = &second.repositories[0];
    assert_eq!(rust_new.full_name, "rust-lang/rust");
    assert_ne!(rust_old.archive_key, rust_new.archive_key);
    assert_eq!(rust_new.superseded, vec![rust_old.archive_key.clone()]);
    assert!(keys.contains(&rust_new.archive_key));

    // Unchanged content on the same day lands on the same key; it still
    // counts as an update, with nothing superseded.
    let tokio_new = &second.repositories[1];
    assert!(tokio_new.is_update);
    assert!(tokio_new.superseded.is_empty());
    assert_eq!(tokio_new.archive_key, first.repositories[1].archive_key);
}

#[tokio::test]
async fn manifest_is_published_with_entries_and_errors() {
    let h = harness();
    let (manifest, _) = run(&h).await;

    let key = h
        .backups
        .publish_manifest(&manifest, ManifestMode::Replace)
        .await
        .unwrap();
    let body = std::fs::read_to_string(h.store.root().join(&key)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();

    assert_eq!(json["repositories"].as_array().unwrap().len(), 2);
    assert_eq!(json["errors"][0]["stage"], "clone");
    assert_eq!(
        json["backup_info"]["backup_id"],
        manifest.backup_info.backup_id.as_str()
    );
}
