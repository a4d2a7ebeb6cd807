//! Object naming for archives and manifests.
//!
//! Archive names are `{YYYYMMDD}_{hash8}_{owner}_{repo}.zip`. Public
//! github.com logins never contain `_`, so `parse` splits the owner at the
//! third `_`. Enterprise managed-user logins (`name_shortcode`) do, so repo
//! matching compares the whole `{owner}_{repo}` tail rather than the split
//! fields. The one case that stays ambiguous is two pairs joining to the
//! same tail, e.g. `a_b/c` and `a/b_c`.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

use crate::hash::short_hash;

const DATE_FORMAT: &str = "%Y%m%d";
const ARCHIVE_SUFFIX: &str = ".zip";
const MANIFEST_PREFIX: &str = "manifest_backup_";
const MANIFEST_SUFFIX: &str = ".json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub date: NaiveDate,
    pub hash: String,
    pub owner: String,
    pub repo: String,
}

impl ArchiveName {
    pub fn new(date: NaiveDate, content_hash: &str, owner: &str, repo: &str) -> Self {
        Self {
            date,
            hash: short_hash(content_hash).to_owned(),
            owner: owner.to_owned(),
            repo: repo.to_owned(),
        }
    }

    /// Parses an object key (with or without a key prefix) back into its parts.
    pub fn parse(key: &str) -> Option<Self> {
        let file_name = key.rsplit('/').next()?;
        let stem = file_name.strip_suffix(ARCHIVE_SUFFIX)?;
        let mut parts = stem.splitn(4, '_');
        let date = parts.next()?;
        let hash = parts.next()?;
        let owner = parts.next()?;
        let repo = parts.next()?;

        if date.len() != 8 {
            return None;
        }
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        if owner.is_empty() || repo.is_empty() {
            return None;
        }

        Some(Self {
            date,
            hash: hash.to_owned(),
            owner: owner.to_owned(),
            repo: repo.to_owned(),
        })
    }

    /// GitHub treats owner and repository names case-insensitively.
    pub fn is_same_repo(&self, owner: &str, repo: &str) -> bool {
        format!("{}_{}", self.owner, self.repo).eq_ignore_ascii_case(&format!("{owner}_{repo}"))
    }

    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}{}",
            self.date.format(DATE_FORMAT),
            self.hash,
            self.owner,
            self.repo,
            ARCHIVE_SUFFIX
        )
    }
}

/// Joins an optional key prefix and a file name into an object key.
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_owned()
    } else {
        format!("{prefix}/{file_name}")
    }
}

/// Run identifier, e.g. `backup_20260213_010000`.
pub fn backup_id(at: DateTime<Utc>) -> String {
    format!("backup_{}", at.format("%Y%m%d_%H%M%S"))
}

pub fn manifest_file_name(backup_id: &str) -> String {
    format!("manifest_{backup_id}{MANIFEST_SUFFIX}")
}

pub fn is_manifest_key(key: &str) -> bool {
    key.rsplit('/')
        .next()
        .is_some_and(|name| name.starts_with(MANIFEST_PREFIX) && name.ends_with(MANIFEST_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::content_hash;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn name_has_expected_layout() {
        let name = ArchiveName::new(day(2026, 2, 13), "deadbeefcafebabe", "rust-lang", "rust");
        assert_eq!(name.file_name(), "20260213_deadbeef_rust-lang_rust.zip");
    }

    #[test]
    fn name_is_deterministic_and_tracks_content() {
        let hash = content_hash(b"refs v1");
        let a = ArchiveName::new(day(2026, 2, 13), &hash, "octo", "repo");
        let b = ArchiveName::new(day(2026, 2, 13), &hash, "octo", "repo");
        assert_eq!(a.file_name(), b.file_name());

        let changed = ArchiveName::new(day(2026, 2, 13), &content_hash(b"refs v2"), "octo", "repo");
        assert_ne!(a.file_name(), changed.file_name());
    }

    #[test]
    fn parse_keeps_underscores_in_repo_name() {
        let parsed = ArchiveName::parse("backups/20250101_0a1b2c3d_octo_my_repo_name.zip")
            .expect("parse");
        assert_eq!(parsed.date, day(2025, 1, 1));
        assert_eq!(parsed.hash, "0a1b2c3d");
        assert_eq!(parsed.owner, "octo");
        assert_eq!(parsed.repo, "my_repo_name");
    }

    #[test]
    fn parse_rejects_foreign_keys() {
        for key in [
            "manifest_backup_20250101_000000.json",
            "20250101_0a1b2c3d_octo.zip",
            "2025011_0a1b2c3d_octo_repo.zip",
            "20250101_nothex!!_octo_repo.zip",
            "20250101_0a1b2c3d_octo_repo.tar",
            "readme.zip",
        ] {
            assert!(ArchiveName::parse(key).is_none(), "{key} should not parse");
        }
    }

    #[test]
    fn suffix_lookalikes_are_different_repos() {
        let theirs = ArchiveName::parse("20250101_0a1b2c3d_x_foo_bar.zip").expect("parse");
        assert!(theirs.is_same_repo("x", "foo_bar"));
        assert!(!theirs.is_same_repo("foo", "bar"));
        assert!(theirs.is_same_repo("X", "Foo_Bar"));
    }

    #[test]
    fn managed_user_owner_with_underscore_matches() {
        let name = ArchiveName::new(day(2026, 3, 1), "0a1b2c3d", "mona_corp", "tool");
        let parsed = ArchiveName::parse(&name.file_name()).expect("parse");
        assert_eq!(parsed.owner, "mona");
        assert!(parsed.is_same_repo("mona_corp", "tool"));
        assert!(parsed.is_same_repo("Mona_Corp", "TOOL"));
        assert!(!parsed.is_same_repo("mona_corp", "tool2"));
        assert!(!parsed.is_same_repo("corp", "tool"));
    }

    #[test]
    fn keys_and_manifests() {
        assert_eq!(object_key("", "a.zip"), "a.zip");
        assert_eq!(object_key("stars/", "a.zip"), "stars/a.zip");

        let at = DateTime::parse_from_rfc3339("2026-02-13T01:02:03Z")
            .expect("rfc3339")
            .with_timezone(&Utc);
        let id = backup_id(at);
        assert_eq!(id, "backup_20260213_010203");
        let manifest = manifest_file_name(&id);
        assert_eq!(manifest, "manifest_backup_20260213_010203.json");
        assert!(is_manifest_key(&object_key("stars", &manifest)));
        assert!(!is_manifest_key("20250101_0a1b2c3d_octo_repo.zip"));
    }
}
