//! The git side of the bot, as seen by the orchestrator.
//!
//! Implementations are synchronous (they shell out to git) and are always
//! called from `spawn_blocking` while the repository lock is held.

use crate::git::{SquashError, SquashRequest, WorkspaceError, Workspaces, squash};
use crate::types::{PrNumber, RepoId, Sha};

/// Workspace-mutating operations performed on behalf of the orchestrator.
pub trait MergeEngine: Send + Sync + 'static {
    /// Squash-merges the PR into its base branch and pushes it.
    fn squash(&self, request: &SquashRequest) -> Result<Sha, SquashError>;

    /// Publishes the PR head as branch `pr-<n>` on the remote.
    fn sync_mirror(&self, repo: &RepoId, pr: PrNumber) -> Result<(), WorkspaceError>;

    /// Deletes the `pr-<n>` branch from the remote.
    fn remove_mirror(&self, repo: &RepoId, pr: PrNumber) -> Result<(), WorkspaceError>;
}

impl MergeEngine for Workspaces {
    fn squash(&self, request: &SquashRequest) -> Result<Sha, SquashError> {
        let path = self.ensure(&request.pr.repo)?;
        squash(&path, request)
    }

    fn sync_mirror(&self, repo: &RepoId, pr: PrNumber) -> Result<(), WorkspaceError> {
        Workspaces::sync_mirror(self, repo, pr)
    }

    fn remove_mirror(&self, repo: &RepoId, pr: PrNumber) -> Result<(), WorkspaceError> {
        Workspaces::remove_mirror(self, repo, pr)
    }
}
