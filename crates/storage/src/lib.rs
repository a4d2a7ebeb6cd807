pub mod local_store;
mod repository;
pub mod s3_store;
pub mod store;

pub use local_store::LocalStore;
pub use repository::{BackupRepository, ManifestMode, PublishOutcome};
pub use s3_store::{S3Config, S3Store};
pub use store::{ObjectInfo, ObjectStore};
