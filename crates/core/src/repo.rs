use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoOwner {
    pub login: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contributor {
    pub login: String,
    pub contributions: u64,
}

/// Snapshot of a starred repository as listed by the API at the start of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StarredRepo {
    pub owner: RepoOwner,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub language: Option<String>,
    pub default_branch: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    /// Repository size in kilobytes as reported by GitHub.
    pub size_kb: u64,
    pub topics: Vec<String>,
    pub license: Option<String>,
    pub is_fork: bool,
    pub is_archived: bool,
    pub is_private: bool,
    pub clone_url: String,
    pub html_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contributors: Vec<Contributor>,
    #[serde(default)]
    pub languages: BTreeMap<String, u64>,
}

impl StarredRepo {
    /// Minimal snapshot, mostly useful for tests and fixtures.
    pub fn new(owner: &str, name: &str, clone_url: &str) -> Self {
        Self {
            owner: RepoOwner {
                login: owner.to_owned(),
                kind: "User".to_owned(),
                html_url: format!("https://github.com/{owner}"),
            },
            name: name.to_owned(),
            full_name: format!("{owner}/{name}"),
            description: None,
            homepage: None,
            language: None,
            default_branch: "main".to_owned(),
            stars: 0,
            forks: 0,
            watchers: 0,
            size_kb: 0,
            topics: Vec::new(),
            license: None,
            is_fork: false,
            is_archived: false,
            is_private: false,
            clone_url: clone_url.to_owned(),
            html_url: format!("https://github.com/{owner}/{name}"),
            created_at: None,
            updated_at: None,
            pushed_at: None,
            contributors: Vec::new(),
            languages: BTreeMap::new(),
        }
    }
}
