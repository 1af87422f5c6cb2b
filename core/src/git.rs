//! Remote git inspection for git-sourced dependencies.

use crate::credentials::{Credential, authenticated_url, sanitize_url, scrub};
use crate::error::{Result, UpdateError};
use crate::sandbox::{IsolatedCommand, run_isolated};
use crate::types::{Dependency, GitSource};
use crate::version::Version;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A ref advertised by a remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    /// Full ref name, e.g. `refs/heads/master` or `refs/tags/v1.5.0`
    pub name: String,
    pub commit_sha: String,
}

impl GitRef {
    pub fn branch(&self) -> Option<&str> {
        self.name.strip_prefix("refs/heads/")
    }

    pub fn tag(&self) -> Option<&str> {
        self.name.strip_prefix("refs/tags/")
    }
}

/// Parse `git ls-remote` output. Annotated tags are reported with the
/// commit they point at (the peeled `^{}` entry) instead of the tag object.
pub fn parse_ls_remote(output: &str) -> Vec<GitRef> {
    let mut refs: Vec<GitRef> = Vec::new();
    for line in output.lines() {
        let Some((sha, name)) = line.trim().split_once(char::is_whitespace) else {
            continue;
        };
        let name = name.trim();
        if let Some(tag) = name.strip_suffix("^{}") {
            if let Some(existing) = refs.iter_mut().find(|r| r.name == tag) {
                existing.commit_sha = sha.to_string();
            }
            continue;
        }
        refs.push(GitRef {
            name: name.to_string(),
            commit_sha: sha.to_string(),
        });
    }
    refs
}

/// `git ls-remote` for a URL, with credentials injected and scrubbed back
/// out of any error output
async fn ls_remote(git: &str, url: &str, credentials: &[Credential], timeout: Duration) -> Result<Vec<GitRef>> {
    let command = IsolatedCommand::new(git)
        .args(["ls-remote", authenticated_url(url, credentials).as_str()])
        .env("GIT_TERMINAL_PROMPT", "0")
        .timeout(timeout);

    match run_isolated(&command).await {
        Ok(output) => Ok(parse_ls_remote(&output.stdout)),
        Err(UpdateError::ChildProcessFailed { stderr, .. }) => {
            debug!(url = %sanitize_url(url), stderr = %scrub(&stderr, credentials), "git ls-remote failed");
            Err(UpdateError::git_dependencies_not_reachable([url]))
        }
        Err(err) => Err(err),
    }
}

/// Whether `url` answers `ls-remote` with the given credentials
pub async fn remote_reachable(git: &str, url: &str, credentials: &[Credential], timeout: Duration) -> bool {
    ls_remote(git, url, credentials, timeout).await.is_ok()
}

/// Answers questions about a git-sourced dependency by listing the refs
/// of its remote.
#[derive(Debug)]
pub struct GitCommitChecker<'a> {
    dependency: &'a Dependency,
    credentials: &'a [Credential],
    git: String,
    timeout: Duration,
    refs: OnceCell<Vec<GitRef>>,
}

impl<'a> GitCommitChecker<'a> {
    pub fn new(
        dependency: &'a Dependency,
        credentials: &'a [Credential],
        git: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            dependency,
            credentials,
            git: git.into(),
            timeout,
            refs: OnceCell::new(),
        }
    }

    pub fn git_source(&self) -> Option<&GitSource> {
        self.dependency.git_source()
    }

    pub fn git_dependency(&self) -> bool {
        self.git_source().is_some()
    }

    /// The manifest pins a ref other than the branch it tracks
    pub fn pinned(&self) -> bool {
        self.git_source().is_some_and(|source| match &source.reference {
            Some(reference) => source.branch.as_ref() != Some(reference) && reference != "HEAD",
            None => false,
        })
    }

    async fn refs(&self) -> Result<&[GitRef]> {
        let source = self.git_source().ok_or_else(|| {
            UpdateError::not_evaluatable(format!("{} is not a git dependency", self.dependency.name))
        })?;
        let refs = self
            .refs
            .get_or_try_init(|| ls_remote(&self.git, &source.url, self.credentials, self.timeout))
            .await?;
        Ok(refs.as_slice())
    }

    /// Tip of the tracked branch, or of the remote's default branch when
    /// none is named
    pub async fn head_commit_for_current_branch(&self) -> Result<String> {
        let branch = self.git_source().and_then(|source| source.branch.clone());
        let refs = self.refs().await?;
        let found = match &branch {
            Some(branch) => refs.iter().find(|r| r.branch() == Some(branch.as_str())),
            None => refs.iter().find(|r| r.name == "HEAD"),
        };

        match found {
            Some(found) => {
                info!(dependency = %self.dependency.name, commit = %found.commit_sha, "resolved branch head");
                Ok(found.commit_sha.clone())
            }
            None => Err(UpdateError::GitDependencyBranchNotFound {
                dependency: self.dependency.name.clone(),
                branch: branch.unwrap_or_else(|| "HEAD".to_string()),
            }),
        }
    }

    /// Whether the current commit is the one tagged for `version`
    /// (`v1.5.0` or `1.5.0`)
    pub async fn ref_in_release(&self, version: &Version) -> Result<bool> {
        let Some(current) = self
            .dependency
            .version
            .clone()
            .or_else(|| self.git_source().and_then(|source| source.reference.clone()))
        else {
            return Ok(false);
        };

        let tags = [format!("v{version}"), version.to_string()];
        let refs = self.refs().await?;
        Ok(refs.iter().any(|r| {
            r.tag().is_some_and(|tag| tags.iter().any(|t| t == tag))
                && (r.commit_sha.starts_with(&current) || current.starts_with(&r.commit_sha))
        }))
    }
}
