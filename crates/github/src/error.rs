use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("github request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("github rejected the token (401 Unauthorized)")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("github returned {status} for {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    #[error("no target user: set GH_USER_ID or GH_USERNAME")]
    MissingTarget,

    #[error("invalid github configuration: {0}")]
    InvalidConfig(String),
}

impl GitHubError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, GitHubError::RateLimited { .. })
    }
}

/// 429 always means throttled; 403 only when the remaining quota is zero
/// (a plain 403 is a permissions problem).
pub fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN && header_str(headers, "x-ratelimit-remaining") == Some("0")
}

/// When the quota resets, from `x-ratelimit-reset` (epoch seconds) or
/// `retry-after` (seconds from now).
pub fn rate_limit_reset(headers: &HeaderMap, now: DateTime<Utc>) -> DateTime<Utc> {
    if let Some(reset) = header_str(headers, "x-ratelimit-reset").and_then(|v| v.parse::<i64>().ok())
    {
        if let Some(at) = DateTime::from_timestamp(reset, 0) {
            return at;
        }
    }
    header_str(headers, "retry-after")
        .and_then(|v| v.parse::<i64>().ok())
        .map(|secs| now + chrono::Duration::seconds(secs))
        .unwrap_or(now)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
