pub mod hash;
pub mod manifest;
pub mod naming;
pub mod repo;

pub use hash::{content_hash, short_hash};
pub use manifest::{ErrorStage, ListingSummary, Manifest, ManifestEntry, RepoError};
pub use naming::ArchiveName;
pub use repo::{Contributor, RepoOwner, StarredRepo};
