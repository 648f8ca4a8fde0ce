//! Pull request and user types as seen by a single merge attempt.

use serde::{Deserialize, Serialize};

use super::ids::{PrNumber, RepoId, Sha};

/// A pull request, fetched fresh for each command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub repo: RepoId,
    pub number: PrNumber,
    /// Canonical web URL, referenced from the squash commit's trailer.
    pub html_url: String,
    /// The current head SHA, which status checks are reported against.
    pub head_sha: Sha,
    /// The branch the PR targets (e.g. "main").
    pub base_branch: String,
}

/// Name and email of a hosting user, used as commit identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub name: String,
    pub email: String,
}
