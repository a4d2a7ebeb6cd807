use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use starbackup_github::{GitHubConfig, TargetUser, DEFAULT_API_URL};
use starbackup_storage::{ManifestMode, S3Config};
use thiserror::Error;

const DEFAULT_REGION: &str = "auto";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub github: GithubSection,
    pub storage: StorageSection,
    pub backup: BackupSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct GithubSection {
    pub token: Option<String>,
    pub user_id: Option<u64>,
    pub username: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StorageSection {
    pub account_id: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub key_prefix: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct BackupSection {
    pub manifest_mode: Option<ManifestMode>,
    pub enrich: Option<bool>,
    pub max_repos: Option<usize>,
    /// Scratch directory for clones; defaults to the system temp dir.
    pub work_dir: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading config file {path:?}"))?;
    toml::from_str(&contents).with_context(|| format!("parsing config file {path:?}"))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingVars(Vec<String>),
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub enum StorageTarget {
    S3(S3Config),
    Local(PathBuf),
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub github: GitHubConfig,
    pub target: TargetUser,
    pub storage: StorageTarget,
    pub key_prefix: String,
    pub manifest_mode: ManifestMode,
    pub enrich: bool,
    pub max_repos: Option<usize>,
    pub work_dir: Option<PathBuf>,
}

impl Settings {
    /// Merge environment over the config file. Every missing required
    /// variable is reported in one error.
    ///
    /// `local_output` selects a directory store, which makes the R2
    /// credentials optional.
    pub fn resolve(
        cfg: &Config,
        local_output: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str, fallback: &Option<String>| {
            env(name)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| fallback.clone())
        };
        let mut missing = Vec::new();

        let token = var("GH_TOKEN", &cfg.github.token);
        if token.is_none() {
            missing.push("GH_TOKEN".to_owned());
        }

        let user_id = match env("GH_USER_ID").filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: "GH_USER_ID",
                message: e.to_string(),
            })?),
            None => cfg.github.user_id,
        };
        let username = var("GH_USERNAME", &cfg.github.username);
        if user_id.is_none() && username.is_none() {
            missing.push("GH_USER_ID or GH_USERNAME".to_owned());
        }

        let storage = match local_output {
            Some(dir) => Some(StorageTarget::Local(dir)),
            None => {
                let s = &cfg.storage;
                let account_id = var("R2_ACCOUNT_ID", &s.account_id);
                let endpoint = var("R2_ENDPOINT", &s.endpoint);
                if account_id.is_none() && endpoint.is_none() {
                    missing.push("R2_ACCOUNT_ID".to_owned());
                }
                let mut required = |name: &str, fallback: &Option<String>| {
                    let value = var(name, fallback);
                    if value.is_none() {
                        missing.push(name.to_owned());
                    }
                    value
                };
                let access_key_id = required("R2_ACCESS_KEY_ID", &s.access_key_id);
                let secret_access_key = required("R2_SECRET_ACCESS_KEY", &s.secret_access_key);
                let bucket = required("R2_BUCKET_NAME", &s.bucket);

                let endpoint = endpoint.or_else(|| account_id.map(|id| S3Config::r2_endpoint(&id)));

                match (endpoint, access_key_id, secret_access_key, bucket) {
                    (Some(endpoint), Some(access_key_id), Some(secret_access_key), Some(bucket)) => {
                        Some(StorageTarget::S3(S3Config {
                            endpoint,
                            region: s.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_owned()),
                            bucket,
                            access_key_id,
                            secret_access_key,
                        }))
                    }
                    _ => None,
                }
            }
        };

        let manifest_mode = match env("STARBACKUP_MANIFEST_MODE").filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw.trim().parse::<ManifestMode>().map_err(|e| ConfigError::Invalid {
                var: "STARBACKUP_MANIFEST_MODE",
                message: e.to_string(),
            })?,
            None => cfg.backup.manifest_mode.unwrap_or_default(),
        };

        let (Some(token), Some(storage)) = (token, storage) else {
            return Err(ConfigError::MissingVars(missing));
        };
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let mut github = GitHubConfig::new(token);
        github.api_url = var("GH_API_URL", &cfg.github.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            github,
            target: TargetUser {
                id: user_id,
                username,
            },
            storage,
            key_prefix: var("STARBACKUP_KEY_PREFIX", &cfg.storage.key_prefix).unwrap_or_default(),
            manifest_mode,
            enrich: cfg.backup.enrich.unwrap_or(true),
            max_repos: cfg.backup.max_repos,
            work_dir: cfg.backup.work_dir.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const FULL: &[(&str, &str)] = &[
        ("GH_TOKEN", "ghp_x"),
        ("GH_USERNAME", "octocat"),
        ("R2_ACCOUNT_ID", "acct"),
        ("R2_ACCESS_KEY_ID", "ak"),
        ("R2_SECRET_ACCESS_KEY", "sk"),
        ("R2_BUCKET_NAME", "stars"),
    ];

    #[test]
    fn resolves_r2_from_env() {
        let settings = Settings::resolve(&Config::default(), None, env_of(FULL)).unwrap();
        assert_eq!(settings.target.username.as_deref(), Some("octocat"));
        assert_eq!(settings.github.api_url, DEFAULT_API_URL);
        assert_eq!(settings.manifest_mode, ManifestMode::Replace);
        assert!(settings.enrich);
        match settings.storage {
            StorageTarget::S3(s3) => {
                assert_eq!(s3.endpoint, "https://acct.r2.cloudflarestorage.com");
                assert_eq!(s3.bucket, "stars");
                assert_eq!(s3.region, "auto");
            }
            other => panic!("unexpected storage {other:?}"),
        }
    }

    #[test]
    fn reports_every_missing_variable() {
        let err = Settings::resolve(&Config::default(), None, env_of(&[])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingVars(vec![
                "GH_TOKEN".into(),
                "GH_USER_ID or GH_USERNAME".into(),
                "R2_ACCOUNT_ID".into(),
                "R2_ACCESS_KEY_ID".into(),
                "R2_SECRET_ACCESS_KEY".into(),
                "R2_BUCKET_NAME".into(),
            ])
        );
    }

    #[test]
    fn local_output_skips_r2_credentials() {
        let env = env_of(&[("GH_TOKEN", "t"), ("GH_USER_ID", "583231")]);
        let settings =
            Settings::resolve(&Config::default(), Some(PathBuf::from("/tmp/out")), env).unwrap();
        assert_eq!(settings.target.id, Some(583231));
        assert!(matches!(settings.storage, StorageTarget::Local(ref p) if p == Path::new("/tmp/out")));
    }

    #[test]
    fn env_overrides_file_and_blank_is_unset() {
        let cfg: Config = toml::from_str(
            r#"
            [github]
            token = "from-file"
            username = "file-user"
            api_url = "http://localhost:9000/"

            [storage]
            key_prefix = "stars"

            [backup]
            manifest_mode = "append"
            enrich = false
            max_repos = 5
            "#,
        )
        .unwrap();
        let env = env_of(&[("GH_TOKEN", "from-env"), ("GH_USERNAME", "  ")]);
        let settings = Settings::resolve(&cfg, Some(PathBuf::from("out")), env).unwrap();

        assert_eq!(settings.github.token, "from-env");
        assert_eq!(settings.target.username.as_deref(), Some("file-user"));
        assert_eq!(settings.github.api_url, "http://localhost:9000");
        assert_eq!(settings.key_prefix, "stars");
        assert_eq!(settings.manifest_mode, ManifestMode::Append);
        assert!(!settings.enrich);
        assert_eq!(settings.max_repos, Some(5));
    }

    #[test]
    fn rejects_bad_values() {
        let mut pairs = FULL.to_vec();
        pairs.push(("STARBACKUP_MANIFEST_MODE", "merge"));
        let err = Settings::resolve(&Config::default(), None, env_of(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "STARBACKUP_MANIFEST_MODE", .. }));

        let mut pairs = FULL.to_vec();
        pairs.push(("GH_USER_ID", "abc"));
        let err = Settings::resolve(&Config::default(), None, env_of(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "GH_USER_ID", .. }));
    }
}
