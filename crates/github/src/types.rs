//! Wire types for the subset of the GitHub REST API the backup needs.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use starbackup_core::{Contributor, RepoOwner, StarredRepo};

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub id: u64,
    pub name: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub followers: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOwner {
    pub login: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubLicense {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    pub full_name: String,
    pub owner: GitHubOwner,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub language: Option<String>,
    pub default_branch: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub watchers_count: u64,
    #[serde(default)]
    pub size: u64,
    /// Absent on older API versions; fetched separately when missing.
    pub topics: Option<Vec<String>>,
    pub license: Option<GitHubLicense>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub private: bool,
    pub clone_url: String,
    #[serde(default)]
    pub html_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubContributor {
    pub login: Option<String>,
    #[serde(default)]
    pub contributions: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubTopics {
    #[serde(default)]
    pub names: Vec<String>,
}

impl From<GitHubRepo> for StarredRepo {
    fn from(repo: GitHubRepo) -> Self {
        StarredRepo {
            owner: RepoOwner {
                login: repo.owner.login,
                kind: repo.owner.kind,
                html_url: repo.owner.html_url,
            },
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description,
            homepage: repo.homepage.filter(|h| !h.is_empty()),
            language: repo.language,
            default_branch: repo.default_branch.unwrap_or_else(|| "main".to_owned()),
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            watchers: repo.watchers_count,
            size_kb: repo.size,
            topics: repo.topics.unwrap_or_default(),
            license: repo.license.and_then(|l| l.name),
            is_fork: repo.fork,
            is_archived: repo.archived,
            is_private: repo.private,
            clone_url: repo.clone_url,
            html_url: repo.html_url,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            pushed_at: repo.pushed_at,
            contributors: Vec::new(),
            languages: Default::default(),
        }
    }
}

impl GitHubContributor {
    /// Anonymous contributors have no login and are dropped.
    pub fn into_contributor(self) -> Option<Contributor> {
        self.login.map(|login| Contributor {
            login,
            contributions: self.contributions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_api_payload() {
        let raw = serde_json::json!({
            "name": "ripgrep",
            "full_name": "BurntSushi/ripgrep",
            "owner": {"login": "BurntSushi", "type": "User", "html_url": "https://github.com/BurntSushi"},
            "description": "fast grep",
            "homepage": "",
            "language": "Rust",
            "default_branch": "master",
            "stargazers_count": 50000,
            "forks_count": 2000,
            "watchers_count": 50000,
            "size": 1234,
            "topics": ["cli", "search"],
            "license": {"name": "The Unlicense"},
            "fork": false,
            "archived": false,
            "private": false,
            "clone_url": "https://github.com/BurntSushi/ripgrep.git",
            "html_url": "https://github.com/BurntSushi/ripgrep",
            "created_at": "2016-03-11T19:01:48Z",
            "updated_at": "2026-02-01T00:00:00Z",
            "pushed_at": "2026-01-30T10:00:00Z"
        });
        let repo: GitHubRepo = serde_json::from_value(raw).expect("deserialize");
        let starred = StarredRepo::from(repo);

        assert_eq!(starred.owner.login, "BurntSushi");
        assert_eq!(starred.default_branch, "master");
        assert_eq!(starred.stars, 50000);
        assert_eq!(starred.topics, vec!["cli", "search"]);
        assert_eq!(starred.license.as_deref(), Some("The Unlicense"));
        assert_eq!(starred.homepage, None);
        assert!(starred.pushed_at.is_some());
    }

    #[test]
    fn anonymous_contributors_are_dropped() {
        let anon = GitHubContributor {
            login: None,
            contributions: 3,
        };
        assert!(anon.into_contributor().is_none());
    }
}
