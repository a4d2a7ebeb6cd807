use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use starbackup_core::StarredRepo;
use tracing::{debug, info, warn};

use crate::error::{is_rate_limited, rate_limit_reset, GitHubError};
use crate::pagination::LinkPagination;
use crate::types::{GitHubContributor, GitHubRepo, GitHubTopics, GitHubUser};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const MAX_PER_PAGE: u32 = 100;
pub const TOP_CONTRIBUTORS: usize = 10;

#[derive(Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub api_url: String,
    pub per_page: u32,
}

impl GitHubConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_owned(),
            per_page: MAX_PER_PAGE,
        }
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("per_page", &self.per_page)
            .finish()
    }
}

/// Whose stars to back up. The numeric id survives renames, so it is tried first.
#[derive(Debug, Clone, Default)]
pub struct TargetUser {
    pub id: Option<u64>,
    pub username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StarredListing {
    pub repos: Vec<StarredRepo>,
    pub pages: u32,
    pub rate_limited_until: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    per_page: u32,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        if config.per_page == 0 || config.per_page > MAX_PER_PAGE {
            return Err(GitHubError::InvalidConfig(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}, got {}",
                config.per_page
            )));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| GitHubError::InvalidConfig("token contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let http = reqwest::Client::builder()
            .user_agent(concat!("starbackup/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            per_page: config.per_page,
        })
    }

    /// Resolve the target account, by id first and by username as a fallback.
    pub async fn resolve_user(&self, target: &TargetUser) -> Result<GitHubUser, GitHubError> {
        let mut last_err = None;

        if let Some(id) = target.id {
            info!(user_id = id, "resolving target user by id");
            match self
                .get_json::<GitHubUser>(&format!("{}/user/{id}", self.api_url))
                .await
            {
                Ok(user) => {
                    info!(user_id = id, login = %user.login, public_repos = user.public_repos, "resolved target user");
                    return Ok(user);
                }
                Err(e) => {
                    warn!(user_id = id, error = %e, "lookup by user id failed");
                    last_err = Some(e);
                }
            }
        }

        if let Some(username) = &target.username {
            info!(%username, "resolving target user by username");
            let user = self
                .get_json::<GitHubUser>(&format!("{}/users/{username}", self.api_url))
                .await?;
            info!(%username, user_id = user.id, "resolved target user");
            return Ok(user);
        }

        Err(last_err.unwrap_or(GitHubError::MissingTarget))
    }

    /// Lazy cursor over the starred-repositories pages of `login`.
    pub fn starred_pages(&self, login: &str) -> StarredPages<'_> {
        StarredPages {
            client: self,
            login: login.to_owned(),
            next: Some(1),
            pages: 0,
        }
    }

    /// Drain every page. A spent rate limit ends the listing early and is
    /// reported in the result; any other error is returned.
    pub async fn list_starred(&self, login: &str) -> Result<StarredListing, GitHubError> {
        let mut pages = self.starred_pages(login);
        let mut repos = Vec::new();
        let mut rate_limited_until = None;

        loop {
            match pages.next_page().await {
                Ok(Some(batch)) => {
                    info!(
                        page = pages.fetched(),
                        count = batch.len(),
                        total = repos.len() + batch.len(),
                        "fetched starred page"
                    );
                    repos.extend(batch);
                }
                Ok(None) => break,
                Err(GitHubError::RateLimited { reset_at }) => {
                    warn!(%reset_at, fetched = repos.len(), "rate limit exhausted, starred listing is incomplete");
                    rate_limited_until = Some(reset_at);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if repos.is_empty() {
            warn!(%login, "no starred repositories found; check the token scopes and the target user");
        }

        Ok(StarredListing {
            repos,
            pages: pages.fetched(),
            rate_limited_until,
        })
    }

    /// Fill in contributors, languages and (when the listing had none) topics.
    ///
    /// Individual lookups are best effort. Only a spent rate limit is
    /// returned, since every further call would fail the same way.
    pub async fn enrich(&self, repo: &mut StarredRepo) -> Result<(), GitHubError> {
        let base = format!("{}/repos/{}", self.api_url, repo.full_name);

        match self.contributors(&base).await {
            Ok(contributors) => repo.contributors = contributors,
            Err(e) if e.is_rate_limit() => return Err(e),
            Err(e) => warn!(repo = %repo.full_name, error = %e, "failed to fetch contributors"),
        }

        match self
            .get_json::<BTreeMap<String, u64>>(&format!("{base}/languages"))
            .await
        {
            Ok(languages) => repo.languages = languages,
            Err(e) if e.is_rate_limit() => return Err(e),
            Err(e) => warn!(repo = %repo.full_name, error = %e, "failed to fetch languages"),
        }

        if repo.topics.is_empty() {
            match self
                .get_json::<GitHubTopics>(&format!("{base}/topics"))
                .await
            {
                Ok(topics) => repo.topics = topics.names,
                Err(e) if e.is_rate_limit() => return Err(e),
                Err(e) => warn!(repo = %repo.full_name, error = %e, "failed to fetch topics"),
            }
        }

        Ok(())
    }

    async fn contributors(&self, base: &str) -> Result<Vec<starbackup_core::Contributor>, GitHubError> {
        let resp = self
            .get(&format!("{base}/contributors?per_page={TOP_CONTRIBUTORS}"))
            .await?;
        // Empty repositories answer 204 with no body.
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        let raw: Vec<GitHubContributor> = resp.json().await?;
        Ok(raw
            .into_iter()
            .filter_map(GitHubContributor::into_contributor)
            .take(TOP_CONTRIBUTORS)
            .collect())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GitHubError> {
        let resp = self.get(url).await?;
        Ok(resp.json().await?)
    }

    async fn get(&self, url: &str) -> Result<Response, GitHubError> {
        debug!(%url, "GET");
        let resp = self.http.get(url).send().await?;
        check_status(resp, url).await
    }
}

async fn check_status(resp: Response, url: &str) -> Result<Response, GitHubError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if is_rate_limited(status, resp.headers()) {
        return Err(GitHubError::RateLimited {
            reset_at: rate_limit_reset(resp.headers(), Utc::now()),
        });
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(GitHubError::Unauthorized),
        StatusCode::NOT_FOUND => Err(GitHubError::NotFound(url.to_owned())),
        _ => {
            let message = resp.text().await.unwrap_or_default();
            Err(GitHubError::Status {
                status: status.as_u16(),
                url: url.to_owned(),
                message,
            })
        }
    }
}

pub struct StarredPages<'a> {
    client: &'a GitHubClient,
    login: String,
    next: Option<u32>,
    pages: u32,
}

impl StarredPages<'_> {
    /// Next page of stars, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<StarredRepo>>, GitHubError> {
        let Some(page) = self.next else {
            return Ok(None);
        };
        let per_page = self.client.per_page;
        let url = format!(
            "{}/users/{}/starred?per_page={per_page}&page={page}",
            self.client.api_url, self.login
        );

        let resp = self.client.get(&url).await?;
        let link = resp
            .headers()
            .get(header::LINK)
            .and_then(|v| v.to_str().ok())
            .map(LinkPagination::parse);
        let repos: Vec<GitHubRepo> = resp.json().await?;
        self.pages += 1;

        if repos.is_empty() {
            debug!(page, "empty page, end of starred list");
            self.next = None;
            return Ok(None);
        }

        self.next = match link {
            Some(link) => link.next_page.filter(|next| *next > page),
            // Without a Link header only a full page hints at more.
            None if repos.len() as u32 >= per_page => Some(page + 1),
            None => None,
        };

        Ok(Some(repos.into_iter().map(StarredRepo::from).collect()))
    }

    /// Pages fetched so far, including a trailing empty page.
    pub fn fetched(&self) -> u32 {
        self.pages
    }
}
