//! Per-repository working copies.
//!
//! Each repository gets one checkout at `<base_dir>/<owner>/<repo>`, cloned on
//! first use and reused afterwards. Callers must hold the repository's lock
//! (see [`crate::bot::RepoLocks`]) while any method here runs.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::types::{InvalidRepoName, PrNumber, RepoId};

use super::pipeline::{Invocation, Pipeline, PipelineFailure};

/// Default clone URL; `{repo}` is replaced by the full `owner/name`.
pub const DEFAULT_CLONE_URL_TEMPLATE: &str = "git@github.com:{repo}.git";

/// Errors from workspace management.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    InvalidRepo(#[from] InvalidRepoName),

    #[error("failed to prepare workspace directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cloning the repository failed; displays the clone output.
    #[error("{0}")]
    Clone(#[source] PipelineFailure),

    /// A git command inside an existing workspace failed.
    #[error("{0}")]
    Git(#[source] PipelineFailure),
}

/// Where workspaces live and how to clone them.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Root directory holding one checkout per repository.
    pub base_dir: PathBuf,

    /// Clone URL with a `{repo}` placeholder for the full repository name.
    pub clone_url_template: String,
}

impl WorkspaceConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        WorkspaceConfig {
            base_dir: base_dir.into(),
            clone_url_template: DEFAULT_CLONE_URL_TEMPLATE.to_string(),
        }
    }
}

/// Manages the local checkouts of all repositories.
#[derive(Debug, Clone)]
pub struct Workspaces {
    config: WorkspaceConfig,
}

impl Workspaces {
    pub fn new(config: WorkspaceConfig) -> Self {
        Workspaces { config }
    }

    /// Returns the checkout path for `repo` without touching the filesystem.
    pub fn path(&self, repo: &RepoId) -> Result<PathBuf, WorkspaceError> {
        repo.validate()?;
        Ok(self.config.base_dir.join(&repo.owner).join(&repo.repo))
    }

    /// Returns the URL `repo` is cloned from.
    pub fn clone_url(&self, repo: &RepoId) -> String {
        self.config
            .clone_url_template
            .replace("{repo}", &repo.to_string())
    }

    /// Returns the checkout path for `repo`, cloning it first if it has no `.git`.
    pub fn ensure(&self, repo: &RepoId) -> Result<PathBuf, WorkspaceError> {
        let path = self.path(repo)?;
        if path.join(".git").exists() {
            return Ok(path);
        }

        let parent = self.config.base_dir.join(&repo.owner);
        std::fs::create_dir_all(&parent).map_err(|source| WorkspaceError::Io {
            path: parent.clone(),
            source,
        })?;

        // A directory without `.git` is left over from an interrupted clone.
        if path.exists() {
            warn!(repo = %repo, path = %path.display(), "Removing incomplete workspace");
            std::fs::remove_dir_all(&path).map_err(|source| WorkspaceError::Io {
                path: path.clone(),
                source,
            })?;
        }

        info!(repo = %repo, path = %path.display(), "Cloning repository");
        let mut pipeline = Pipeline::new(&parent);
        let url = self.clone_url(repo);
        pipeline.run(Invocation::git(["clone", url.as_str(), repo.repo.as_str()]));
        pipeline.finish().map_err(WorkspaceError::Clone)?;

        Ok(path)
    }

    /// Mirrors the PR head to a branch named `pr-<n>` on the remote, so it is
    /// visible (and buildable) like any other branch.
    pub fn sync_mirror(&self, repo: &RepoId, pr: PrNumber) -> Result<(), WorkspaceError> {
        let path = self.ensure(repo)?;
        let branch = pr.branch_name();

        let mut pipeline = Pipeline::new(path);
        pipeline.run(Invocation::git([
            "fetch".to_string(),
            "origin".to_string(),
            format!("+{}:{}", pr.head_ref(), branch),
        ]));
        pipeline.run(Invocation::git(["push", "-f", "origin", branch.as_str()]));
        pipeline.finish().map_err(WorkspaceError::Git)?;

        info!(repo = %repo, pr = %pr, branch = %branch, "Mirrored pull request head");
        Ok(())
    }

    /// Deletes the `pr-<n>` mirror branch from the remote and locally.
    pub fn remove_mirror(&self, repo: &RepoId, pr: PrNumber) -> Result<(), WorkspaceError> {
        let path = self.ensure(repo)?;
        let branch = pr.branch_name();

        let mut pipeline = Pipeline::new(path);
        pipeline.run(Invocation::git(["push".to_string(), "origin".to_string(), format!(":{}", branch)]));
        pipeline.run(Invocation::git(["update-ref".to_string(), "-d".to_string(), format!("refs/heads/{}", branch)]));
        pipeline.finish().map_err(WorkspaceError::Git)?;

        info!(repo = %repo, pr = %pr, branch = %branch, "Removed pull request mirror");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::{TestRemote, git};

    fn workspaces_for(remote: &TestRemote) -> Workspaces {
        Workspaces::new(WorkspaceConfig {
            base_dir: remote.root.path().join("workspaces"),
            clone_url_template: remote.url_template(),
        })
    }

    #[test]
    fn path_is_owner_then_repo() {
        let workspaces = Workspaces::new(WorkspaceConfig::new("/var/lib/merge-bot"));
        let path = workspaces.path(&RepoId::new("octocat", "hello-world")).unwrap();
        assert_eq!(path, PathBuf::from("/var/lib/merge-bot/octocat/hello-world"));
    }

    #[test]
    fn path_rejects_traversal() {
        let workspaces = Workspaces::new(WorkspaceConfig::new("/var/lib/merge-bot"));
        let result = workspaces.path(&RepoId::new("..", "etc"));
        assert!(matches!(result, Err(WorkspaceError::InvalidRepo(_))));
    }

    #[test]
    fn default_clone_url_uses_ssh() {
        let workspaces = Workspaces::new(WorkspaceConfig::new("/tmp"));
        assert_eq!(
            workspaces.clone_url(&RepoId::new("octocat", "hello-world")),
            "git@github.com:octocat/hello-world.git"
        );
    }

    #[test]
    fn ensure_clones_once_and_reuses() {
        let remote = TestRemote::new("octocat", "hello");
        let workspaces = workspaces_for(&remote);
        let repo = RepoId::new("octocat", "hello");

        let path = workspaces.ensure(&repo).unwrap();
        assert!(path.join(".git").exists());
        assert!(path.join("README.md").exists());

        // A marker survives a second call, so the checkout was reused.
        std::fs::write(path.join("marker"), "x").unwrap();
        let again = workspaces.ensure(&repo).unwrap();
        assert_eq!(again, path);
        assert!(path.join("marker").exists());
    }

    #[test]
    fn ensure_replaces_incomplete_checkout() {
        let remote = TestRemote::new("octocat", "hello");
        let workspaces = workspaces_for(&remote);
        let repo = RepoId::new("octocat", "hello");

        let path = workspaces.path(&repo).unwrap();
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("junk"), "x").unwrap();

        workspaces.ensure(&repo).unwrap();
        assert!(path.join(".git").exists());
        assert!(!path.join("junk").exists());
    }

    #[test]
    fn ensure_reports_clone_failure_with_output() {
        let remote = TestRemote::new("octocat", "hello");
        let workspaces = workspaces_for(&remote);

        let err = workspaces.ensure(&RepoId::new("octocat", "missing")).unwrap_err();

        assert!(matches!(err, WorkspaceError::Clone(_)));
        assert!(err.to_string().contains("$ git clone"));
    }

    #[test]
    fn mirror_sync_and_removal() {
        let remote = TestRemote::new("octocat", "hello");
        let head = remote.open_pr(7, "main", &[("a.txt", "a", "Add a")], ("Ada", "ada@example.com"));
        let workspaces = workspaces_for(&remote);
        let repo = RepoId::new("octocat", "hello");

        workspaces.sync_mirror(&repo, PrNumber(7)).unwrap();
        assert!(remote.origin_has_branch("pr-7"));
        assert_eq!(remote.origin_rev("refs/heads/pr-7"), head);

        workspaces.remove_mirror(&repo, PrNumber(7)).unwrap();
        assert!(!remote.origin_has_branch("pr-7"));
        let local = workspaces.path(&repo).unwrap();
        assert_eq!(git(&local, &["branch", "--list", "pr-7"]), "");
    }
}
