//! Code-hosting API.
//!
//! The bot talks to GitHub only through the [`HostingClient`] trait, so the
//! orchestrator can be exercised against an in-memory fake. [`GitHubClient`]
//! is the real implementation over octocrab.

mod client;
mod error;

use std::future::Future;

use crate::types::{BuildState, PrNumber, PullRequest, RepoId, StatusCheck, User};

pub use client::GitHubClient;
pub use error::HostingError;

/// Operations the merge bot needs from the code host.
pub trait HostingClient: Send + Sync + 'static {
    /// Fetches a pull request's current state.
    fn pull_request(
        &self,
        repo: &RepoId,
        number: PrNumber,
    ) -> impl Future<Output = Result<PullRequest, HostingError>> + Send;

    /// Lists the status checks reported against the PR's head commit.
    fn statuses(
        &self,
        pr: &PullRequest,
    ) -> impl Future<Output = Result<Vec<StatusCheck>, HostingError>> + Send;

    /// Looks up a user's profile. `email` is empty when the user hides it.
    fn user(&self, login: &str) -> impl Future<Output = Result<User, HostingError>> + Send;

    /// Posts a comment on a pull request.
    fn post_comment(
        &self,
        repo: &RepoId,
        number: PrNumber,
        body: &str,
    ) -> impl Future<Output = Result<(), HostingError>> + Send;

    /// Closes a pull request without merging it through the host.
    fn close(
        &self,
        repo: &RepoId,
        number: PrNumber,
    ) -> impl Future<Output = Result<(), HostingError>> + Send;

    /// Sets a commit status on the PR's head commit.
    fn set_status(
        &self,
        pr: &PullRequest,
        state: BuildState,
        context: &str,
        description: &str,
    ) -> impl Future<Output = Result<(), HostingError>> + Send;
}
