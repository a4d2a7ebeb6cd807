use std::path::Path;
use std::process::{Command, Output};

use base64::Engine;
use tracing::debug;

use crate::ArchiveError;

/// `git clone --mirror <url> <dest>`.
///
/// For HTTPS remotes the token travels as a one-off `http.extraHeader`
/// through `GIT_CONFIG_*` variables, so it is neither on the command line
/// nor written into the mirror's config.
pub fn clone_mirror(url: &str, dest: &Path, token: Option<&str>) -> Result<(), ArchiveError> {
    let mut cmd = Command::new("git");
    cmd.arg("clone")
        .arg("--mirror")
        .arg("--quiet")
        .arg(url)
        .arg(dest)
        .env("GIT_TERMINAL_PROMPT", "0");

    if let Some(token) = token.filter(|_| url.starts_with("https://")) {
        cmd.env("GIT_CONFIG_COUNT", "1")
            .env("GIT_CONFIG_KEY_0", "http.extraHeader")
            .env("GIT_CONFIG_VALUE_0", auth_header(token));
    }

    debug!(%url, dest = %dest.display(), "git clone --mirror");
    let out = cmd.output().map_err(ArchiveError::GitSpawn)?;
    if !out.status.success() {
        return Err(ArchiveError::Clone {
            url: url.to_owned(),
            stderr: stderr(&out),
        });
    }
    Ok(())
}

/// Every ref and the object it points at, one per line, in refname order.
pub fn ref_listing(repo: &Path) -> Result<String, ArchiveError> {
    let out = Command::new("git")
        .arg("--git-dir")
        .arg(repo)
        .args(["for-each-ref", "--sort=refname", "--format=%(objectname) %(refname)"])
        .output()
        .map_err(ArchiveError::GitSpawn)?;
    if !out.status.success() {
        return Err(ArchiveError::Git {
            command: "for-each-ref".to_owned(),
            stderr: stderr(&out),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

fn auth_header(token: &str) -> String {
    let basic =
        base64::engine::general_purpose::STANDARD.encode(format!("x-access-token:{token}"));
    format!("Authorization: Basic {basic}")
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_header_is_basic_with_access_token_user() {
        let header = auth_header("ghp_secret");
        let encoded = header
            .strip_prefix("Authorization: Basic ")
            .expect("basic prefix");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .expect("base64");
        assert_eq!(decoded, b"x-access-token:ghp_secret");
    }
}
