//! Mirror-clones a repository and packs it into a zip archive.

mod compress;
pub mod git;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use starbackup_core::{content_hash, ErrorStage, StarredRepo};
use tempfile::TempDir;
use thiserror::Error;
use tracing::info;

pub use compress::zip_dir;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("git clone of {url} failed: {stderr}")]
    Clone { url: String, stderr: String },
    #[error("failed to run git: {0}")]
    GitSpawn(#[source] io::Error),
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },
    #[error("zip error: {0}")]
    Zip(#[from] ::zip::result::ZipError),
    #[error("walking mirror: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ArchiveError {
    pub fn stage(&self) -> ErrorStage {
        match self {
            ArchiveError::Clone { .. } | ArchiveError::GitSpawn(_) => ErrorStage::Clone,
            _ => ErrorStage::Archive,
        }
    }
}

/// A finished zip on local disk. The file lives in a private temporary
/// directory that is removed when the archive is dropped.
#[derive(Debug)]
pub struct Archive {
    _dir: TempDir,
    path: PathBuf,
    size_bytes: u64,
    content_hash: String,
}

impl Archive {
    /// Adopt a zip already written inside `dir`.
    pub fn new(dir: TempDir, path: PathBuf, content_hash: String) -> io::Result<Self> {
        let size_bytes = fs::metadata(&path)?.len();
        Ok(Self {
            _dir: dir,
            path,
            size_bytes,
            content_hash,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// SHA-256 over the mirror's refs; changes exactly when a ref moves.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

/// Produces an archive for one repository. Blocking; callers on an async
/// runtime should run it on a blocking thread.
pub trait Archiver: Send + Sync {
    fn archive(&self, repo: &StarredRepo) -> Result<Archive, ArchiveError>;
}

#[derive(Debug, Clone, Default)]
pub struct GitArchiver {
    token: Option<String>,
    work_root: Option<PathBuf>,
}

impl GitArchiver {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            work_root: None,
        }
    }

    /// Place temporary clones under `root` instead of the system temp dir.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    fn scratch_dir(&self, prefix: &str) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        match &self.work_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }
}

impl Archiver for GitArchiver {
    fn archive(&self, repo: &StarredRepo) -> Result<Archive, ArchiveError> {
        // Dropped on every return path, taking the clone with it.
        let clone_dir = self.scratch_dir("starbackup-clone-")?;
        let mirror = clone_dir.path().join(format!("{}.git", repo.name));

        info!(repo = %repo.full_name, "cloning mirror");
        git::clone_mirror(&repo.clone_url, &mirror, self.token.as_deref())?;

        let refs = git::ref_listing(&mirror)?;
        let hash = content_hash(refs.as_bytes());

        let out_dir = self.scratch_dir("starbackup-zip-")?;
        let path = out_dir.path().join(format!("{}.zip", repo.name));
        let size = zip_dir(&mirror, &path)?;
        info!(repo = %repo.full_name, size_bytes = size, "archive created");

        Ok(Archive::new(out_dir, path, hash)?)
    }
}
