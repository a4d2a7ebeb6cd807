//! GitHub REST client for listing and describing a user's starred repositories.

mod client;
mod error;
pub mod pagination;
pub mod types;

pub use client::{
    GitHubClient, GitHubConfig, StarredListing, StarredPages, TargetUser, DEFAULT_API_URL,
    MAX_PER_PAGE, TOP_CONTRIBUTORS,
};
pub use error::{is_rate_limited, rate_limit_reset, GitHubError};
pub use types::GitHubUser;
