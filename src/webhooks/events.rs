//! GitHub webhook event types.
//!
//! Only the two events the bot acts on are modelled:
//!
//! - `issue_comment` - merge and stop commands
//! - `pull_request` - lifecycle sync of the `pr-<n>` mirror branch and review status

use crate::types::{PrNumber, PullRequest, RepoId};

/// A parsed GitHub webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitHubEvent {
    /// An issue or PR comment was created, edited, or deleted.
    ///
    /// Comments on a PR's conversation tab arrive as `issue_comment` events.
    IssueComment(IssueCommentEvent),

    /// A pull request was opened, updated, reopened or closed.
    PullRequest(PullRequestEvent),
}

impl GitHubEvent {
    /// Returns the repository this event belongs to.
    pub fn repo_id(&self) -> &RepoId {
        match self {
            GitHubEvent::IssueComment(e) => &e.repo,
            GitHubEvent::PullRequest(e) => &e.pull_request.repo,
        }
    }
}

/// Action performed on an issue comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentAction {
    Created,
    Edited,
    Deleted,
}

/// An issue/PR comment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommentEvent {
    pub repo: RepoId,
    pub action: CommentAction,
    /// Set only when the comment is on a pull request rather than a plain issue.
    pub pr_number: Option<PrNumber>,
    pub body: String,
    pub author_login: String,
}

/// Pull request lifecycle actions the bot reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrAction {
    Opened,
    Synchronize,
    Reopened,
    Closed,
}

impl PrAction {
    /// Opened, reopened and pushed-to PRs all get their mirror refreshed.
    pub fn refreshes_mirror(&self) -> bool {
        !matches!(self, PrAction::Closed)
    }
}

/// A pull request event, carrying the PR as described in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub action: PrAction,
    pub pull_request: PullRequest,
}
