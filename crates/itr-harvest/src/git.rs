//! Git operations
//!
//! Drives the `git` executable as a subprocess. [`VersionControl`] abstracts
//! the handful of commands the extractor needs so extraction can be tested
//! without a real repository.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::{error, trace};
use url::Url;

use itr_common::ACCESS_TOKEN_ENV;

use crate::{Error, Result};

/// Default base URL repositories are cloned from
pub const DEFAULT_GIT_BASE_URL: &str = "https://github.com";

/// Trait for the version-control operations used during extraction
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// `clone --no-checkout <url> .` inside `workdir`
    async fn clone_no_checkout(&self, workdir: &Path, url: &str) -> Result<()>;

    /// Restrict the working tree to `paths` (cone mode) and materialize `HEAD`
    async fn sparse_checkout(&self, workdir: &Path, paths: Vec<String>) -> Result<()>;

    /// Force-checkout `commit_ref`, discarding local changes
    async fn checkout(&self, workdir: &Path, commit_ref: &str) -> Result<()>;
}

/// [`VersionControl`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    /// Use `git` from `PATH`
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    async fn git(&self, workdir: &Path, args: &[&str]) -> Result<()> {
        let command = args
            .iter()
            .map(|a| redact_credentials(a))
            .collect::<Vec<_>>()
            .join(" ");
        trace!(args = %command, cwd = %workdir.display(), "Calling git");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if !stderr.is_empty() {
                error!(args = %command, "{}", stderr);
            }
            return Err(Error::Git {
                args: command,
                code: output.status.code(),
                stderr,
            });
        }
        Ok(())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn clone_no_checkout(&self, workdir: &Path, url: &str) -> Result<()> {
        self.git(workdir, &["clone", "--no-checkout", url, "."]).await
    }

    async fn sparse_checkout(&self, workdir: &Path, paths: Vec<String>) -> Result<()> {
        self.git(workdir, &["sparse-checkout", "init", "--cone"])
            .await?;

        let mut set = vec!["sparse-checkout", "set"];
        set.extend(paths.iter().map(String::as_str));
        self.git(workdir, &set).await?;

        self.git(workdir, &["reset", "--hard", "HEAD"]).await
    }

    async fn checkout(&self, workdir: &Path, commit_ref: &str) -> Result<()> {
        self.git(workdir, &["checkout", "-f", commit_ref]).await
    }
}

/// Where repositories of the organization are cloned from
#[derive(Debug, Clone)]
pub struct CloneSource {
    /// Base URL, e.g. `https://github.com` or `file:///srv/mirror`
    pub base_url: String,
    /// Organization (first path segment below the base URL)
    pub organization: String,
    /// Access token embedded as user info for http(s) URLs
    pub token: Option<String>,
}

impl CloneSource {
    /// Clone source for `organization` on the default host, token from the environment
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_GIT_BASE_URL.to_string(),
            organization: organization.into(),
            token: std::env::var(ACCESS_TOKEN_ENV)
                .ok()
                .filter(|t| !t.is_empty()),
        }
    }

    /// Clone URL of `repository`
    pub fn url_for(&self, repository: &str) -> Result<String> {
        let raw = format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.organization,
            repository
        );
        let mut url = Url::parse(&raw).map_err(|e| Error::CloneUrl(format!("{}: {}", raw, e)))?;

        if let Some(token) = &self.token {
            if matches!(url.scheme(), "http" | "https") {
                url.set_username(token)
                    .map_err(|_| Error::CloneUrl(format!("{}: cannot carry credentials", raw)))?;
            }
        }
        Ok(url.to_string())
    }
}

/// Mask credentials embedded in a URL argument; other arguments pass through
pub fn redact_credentials(arg: &str) -> String {
    match Url::parse(arg) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            let _ = url.set_username("***");
            let _ = url.set_password(None);
            url.to_string()
        }
        _ => arg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_url_without_token() {
        let source = CloneSource {
            base_url: "https://github.com/".to_string(),
            organization: "scm-manager".to_string(),
            token: None,
        };
        assert_eq!(
            source.url_for("scm-review-plugin").unwrap(),
            "https://github.com/scm-manager/scm-review-plugin"
        );
    }

    #[test]
    fn clone_url_embeds_token() {
        let source = CloneSource {
            base_url: "https://github.com".to_string(),
            organization: "scm-manager".to_string(),
            token: Some("ghp_secret".to_string()),
        };
        assert_eq!(
            source.url_for("scm-manager").unwrap(),
            "https://ghp_secret@github.com/scm-manager/scm-manager"
        );
    }

    #[test]
    fn file_urls_never_carry_tokens() {
        let source = CloneSource {
            base_url: "file:///srv/mirror".to_string(),
            organization: "org".to_string(),
            token: Some("ghp_secret".to_string()),
        };
        assert_eq!(
            source.url_for("repo").unwrap(),
            "file:///srv/mirror/org/repo"
        );
    }

    #[test]
    fn credentials_are_redacted() {
        assert_eq!(
            redact_credentials("https://ghp_secret@github.com/org/repo"),
            "https://***@github.com/org/repo"
        );
        assert_eq!(redact_credentials("--no-checkout"), "--no-checkout");
        assert_eq!(
            redact_credentials("https://github.com/org/repo"),
            "https://github.com/org/repo"
        );
    }

    #[tokio::test]
    async fn failing_git_command_reports_exit_code() {
        if std::process::Command::new("git")
            .arg("--version")
            .output()
            .is_err()
        {
            eprintln!("git not installed, skipping");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let err = GitCli::new()
            .checkout(dir.path(), "does-not-exist")
            .await
            .unwrap_err();

        match err {
            Error::Git { args, code, .. } => {
                assert_eq!(args, "checkout -f does-not-exist");
                assert_eq!(code, Some(128));
            }
            other => panic!("expected git error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_clone_reports_redacted_arguments() {
        if std::process::Command::new("git")
            .arg("--version")
            .output()
            .is_err()
        {
            eprintln!("git not installed, skipping");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let err = GitCli::new()
            .clone_no_checkout(dir.path(), "http://ghp_secret@127.0.0.1:9/org/repo")
            .await
            .unwrap_err();

        match err {
            Error::Git { args, code, .. } => {
                assert_eq!(args, "clone --no-checkout http://***@127.0.0.1:9/org/repo .");
                assert!(!args.contains("ghp_secret"));
                assert_eq!(code, Some(128));
            }
            other => panic!("expected git error, got {:?}", other),
        }
    }
}
