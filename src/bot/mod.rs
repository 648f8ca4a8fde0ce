//! The merge orchestrator.
//!
//! [`MergeBot`] turns webhook events into merges. Its collaborators sit
//! behind traits: the code host ([`HostingClient`]), the permission check
//! ([`PermissionResolver`]) and the local git work ([`MergeEngine`]).
//!
//! # Concurrency
//!
//! - Every command and lifecycle event for a repository runs under that
//!   repository's lock ([`RepoLocks`]); other repositories are unaffected.
//! - A merge requested while the build is pending is claimed in
//!   [`PendingMerges`] and handed to a poller task. The poller sleeps without
//!   holding the lock and takes it again only to merge.
//! - Pollers are spawned on a [`TaskTracker`] and watch a
//!   [`CancellationToken`], so shutdown can interrupt and then await them.

pub mod engine;
pub mod locks;
pub mod pending;
pub mod poller;
pub mod responses;


use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::commands::{Command, parse_command};
use crate::git::{MessageOverride, SquashRequest};
use crate::github::HostingClient;
use crate::permissions::PermissionResolver;
use crate::types::{BuildState, BuildStatus, PrNumber, PullRequest, RepoId};
use crate::webhooks::{CommentAction, GitHubEvent, IssueCommentEvent, PullRequestEvent};

pub use engine::MergeEngine;
pub use locks::RepoLocks;
pub use pending::{PendingClaim, PendingMerges};
pub use poller::{Backoff, PollConfig};

/// Default status context the bot uses for its review status.
pub const DEFAULT_REVIEW_CONTEXT: &str = "merge-bot/review";

const STOP_DESCRIPTION: &str = "Not to be merged as is.";
const OPEN_DESCRIPTION: &str = "At your service.";
const CLOSED_DESCRIPTION: &str = "Closed.";

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Name the bot answers to, without the `@`.
    pub bot_name: String,

    /// Status context set by `stop` and by lifecycle events.
    pub review_context: String,

    pub poll: PollConfig,
}

impl BotConfig {
    pub fn new(bot_name: impl Into<String>) -> Self {
        BotConfig {
            bot_name: bot_name.into(),
            review_context: DEFAULT_REVIEW_CONTEXT.to_string(),
            poll: PollConfig::new(),
        }
    }
}

struct Inner<H, P, E> {
    hosting: H,
    permissions: P,
    engine: Arc<E>,
    config: BotConfig,
    locks: RepoLocks,
    pending: PendingMerges,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

/// The merge bot. Cheap to clone; clones share all state.
pub struct MergeBot<H, P, E> {
    inner: Arc<Inner<H, P, E>>,
}

impl<H, P, E> Clone for MergeBot<H, P, E> {
    fn clone(&self) -> Self {
        MergeBot {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H, P, E> MergeBot<H, P, E>
where
    H: HostingClient,
    P: PermissionResolver,
    E: MergeEngine,
{
    pub fn new(hosting: H, permissions: P, engine: E, config: BotConfig, shutdown: CancellationToken) -> Self {
        MergeBot {
            inner: Arc::new(Inner {
                hosting,
                permissions,
                engine: Arc::new(engine),
                config,
                locks: RepoLocks::new(),
                pending: PendingMerges::new(),
                shutdown,
                tasks: TaskTracker::new(),
            }),
        }
    }

    pub fn locks(&self) -> &RepoLocks {
        &self.inner.locks
    }

    pub fn pending(&self) -> &PendingMerges {
        &self.inner.pending
    }

    /// Tracker holding event handlers and pollers.
    pub fn tasks(&self) -> &TaskTracker {
        &self.inner.tasks
    }

    /// Cancels running pollers and waits for every tracked task to finish.
    pub async fn shutdown(&self) {
        info!(pending = self.inner.pending.len(), "Shutting down merge bot");
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }

    // ─── Event dispatch ───────────────────────────────────────────────────────

    /// Handles one parsed webhook event to completion (pollers excepted).
    pub async fn handle_event(&self, event: GitHubEvent) {
        match event {
            GitHubEvent::IssueComment(comment) => self.handle_comment(comment).await,
            GitHubEvent::PullRequest(event) => self.handle_pull_request(event).await,
        }
    }

    /// Runs [`handle_event`](Self::handle_event) in the background on the
    /// bot's task tracker.
    pub fn dispatch(&self, event: GitHubEvent) {
        let bot = self.clone();
        self.inner.tasks.spawn(async move { bot.handle_event(event).await });
    }

    async fn handle_comment(&self, event: IssueCommentEvent) {
        if event.action != CommentAction::Created {
            return;
        }
        let Some(number) = event.pr_number else {
            return;
        };
        if event.author_login.eq_ignore_ascii_case(&self.inner.config.bot_name) {
            return;
        }
        let Some(command) = parse_command(&event.body, &self.inner.config.bot_name) else {
            return;
        };

        info!(
            repo = %event.repo,
            pr = %number,
            user = %event.author_login,
            command = command.name(),
            "Received command"
        );
        self.handle_command(&event.repo, number, &event.author_login, command).await;
    }

    /// Executes a command issued by `login` on a pull request.
    pub async fn handle_command(&self, repo: &RepoId, number: PrNumber, login: &str, command: Command) {
        match command {
            Command::Merge { message_override } => {
                self.handle_merge(repo, number, login, message_override).await
            }
            Command::Stop => self.handle_stop(repo, number, login).await,
        }
    }

    // ─── merge ────────────────────────────────────────────────────────────────

    async fn handle_merge(
        &self,
        repo: &RepoId,
        number: PrNumber,
        login: &str,
        message_override: Option<MessageOverride>,
    ) {
        let _guard = self.inner.locks.lock(repo).await;

        if !self.inner.permissions.is_allowed(repo, login).await {
            info!(repo = %repo, pr = %number, user = %login, "Rejecting merge request from unauthorized user");
            self.respond(repo, number, &responses::no_access(login)).await;
            return;
        }

        if self.inner.pending.contains(repo, number) {
            info!(repo = %repo, pr = %number, user = %login, "Rejecting merge request for already pending PR");
            self.respond(repo, number, &responses::already_pending(login)).await;
            return;
        }

        let pr = match self.inner.hosting.pull_request(repo, number).await {
            Ok(pr) => pr,
            Err(e) => {
                warn!(repo = %repo, pr = %number, error = %e, "Failed to fetch pull request");
                self.respond(repo, number, &responses::error(login, &e.to_string())).await;
                return;
            }
        };

        let checks = match self.inner.hosting.statuses(&pr).await {
            Ok(checks) => checks,
            Err(e) => {
                warn!(repo = %repo, pr = %number, error = %e, "Failed to fetch build status");
                self.respond(repo, number, &responses::error(login, &e.to_string())).await;
                return;
            }
        };

        let status = BuildStatus::aggregate(&checks);
        match status.state {
            BuildState::Success => {
                self.perform_merge(&pr, login, message_override).await;
            }
            BuildState::Pending => {
                self.respond(repo, number, &responses::waiting(login)).await;
                let Some(claim) = self.inner.pending.claim(repo, number) else {
                    warn!(repo = %repo, pr = %number, "Pending merge appeared while holding the repository lock");
                    return;
                };
                info!(repo = %repo, pr = %number, user = %login, "Build pending, deferring merge");

                let bot = self.clone();
                let login = login.to_string();
                self.inner.tasks.spawn(async move {
                    bot.delayed_merge(claim, pr, login, message_override).await;
                });
            }
            BuildState::Failure | BuildState::Error => {
                info!(repo = %repo, pr = %number, status = %status.describe(), "Refusing to merge failing build");
                self.respond(repo, number, &responses::bad_build(login, &status)).await;
            }
        }
    }

    /// Polls the build status with backoff until it settles, then merges or
    /// reports. The pending entry is released when `claim` drops.
    async fn delayed_merge(
        &self,
        claim: PendingClaim,
        pr: PullRequest,
        login: String,
        message_override: Option<MessageOverride>,
    ) {
        let poll = &self.inner.config.poll;
        let started = Instant::now();
        let mut backoff = poll.backoff();

        loop {
            if started.elapsed() >= poll.max_wait {
                info!(repo = %pr.repo, pr = %pr.number, "Timed out waiting for build");
                self.respond(&pr.repo, pr.number, &responses::timeout(&login, poll.max_wait)).await;
                return;
            }

            match self.inner.hosting.statuses(&pr).await {
                Ok(checks) => {
                    let status = BuildStatus::aggregate(&checks);
                    match status.state {
                        BuildState::Success => {
                            let _guard = self.inner.locks.lock(&pr.repo).await;
                            self.perform_merge(&pr, &login, message_override).await;
                            // Released while the repository lock is still held.
                            drop(claim);
                            return;
                        }
                        BuildState::Failure | BuildState::Error => {
                            info!(repo = %pr.repo, pr = %pr.number, status = %status.describe(), "Build failed while waiting");
                            self.respond(&pr.repo, pr.number, &responses::bad_build(&login, &status)).await;
                            return;
                        }
                        BuildState::Pending => {
                            debug!(repo = %pr.repo, pr = %pr.number, "Build still pending");
                        }
                    }
                }
                Err(e) => {
                    warn!(repo = %pr.repo, pr = %pr.number, error = %e, "Failed to poll build status");
                }
            }

            let wait = backoff.next().unwrap_or(poll.max_interval);
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => {
                    info!(repo = %pr.repo, pr = %pr.number, "Deferred merge interrupted by shutdown");
                    self.respond(&pr.repo, pr.number, &responses::interrupted(&login)).await;
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Squash-merges `pr` on behalf of `login`. Caller holds the repository lock.
    async fn perform_merge(&self, pr: &PullRequest, login: &str, message_override: Option<MessageOverride>) {
        let repo = &pr.repo;
        let number = pr.number;
        info!(repo = %repo, pr = %number, user = %login, "Attempting merge");

        let committer = match self.inner.hosting.user(login).await {
            Ok(user) if !user.email.is_empty() => user,
            Ok(_) => {
                warn!(repo = %repo, pr = %number, user = %login, "User has no public email");
                self.respond(repo, number, &responses::no_user(login)).await;
                return;
            }
            Err(e) => {
                warn!(repo = %repo, pr = %number, user = %login, error = %e, "Failed to look up user");
                self.respond(repo, number, &responses::no_user(login)).await;
                return;
            }
        };

        let request = SquashRequest {
            pr: pr.clone(),
            committer,
            message_override,
        };
        let engine = Arc::clone(&self.inner.engine);
        let result = tokio::task::spawn_blocking(move || engine.squash(&request)).await;

        match result {
            Ok(Ok(sha)) => {
                info!(repo = %repo, pr = %number, user = %login, sha = %sha, "Completed merge");
                self.respond(repo, number, &responses::thanks(login, &sha)).await;
                if let Err(e) = self.inner.hosting.close(repo, number).await {
                    warn!(repo = %repo, pr = %number, error = %e, "Failed to close merged pull request");
                }
            }
            Ok(Err(e)) if e.is_clone_failure() => {
                warn!(repo = %repo, pr = %number, error = %e, "Failed to clone repository");
                self.respond(repo, number, &responses::clone_failed(login, &e.to_string())).await;
            }
            Ok(Err(e)) => {
                warn!(repo = %repo, pr = %number, user = %login, error = %e, "Failed merge");
                self.respond(repo, number, &responses::error(login, &e.to_string())).await;
            }
            Err(e) => {
                error!(repo = %repo, pr = %number, error = %e, "Merge task panicked");
                self.respond(repo, number, &responses::error(login, &e.to_string())).await;
            }
        }
    }

    // ─── stop ─────────────────────────────────────────────────────────────────

    async fn handle_stop(&self, repo: &RepoId, number: PrNumber, login: &str) {
        let _guard = self.inner.locks.lock(repo).await;

        if !self.inner.permissions.is_allowed(repo, login).await {
            info!(repo = %repo, pr = %number, user = %login, "Rejecting stop request from unauthorized user");
            self.respond(repo, number, &responses::no_access(login)).await;
            return;
        }

        let pr = match self.inner.hosting.pull_request(repo, number).await {
            Ok(pr) => pr,
            Err(e) => {
                warn!(repo = %repo, pr = %number, error = %e, "Failed to fetch pull request");
                self.respond(repo, number, &responses::error(login, &e.to_string())).await;
                return;
            }
        };

        self.set_review_status(&pr, BuildState::Failure, STOP_DESCRIPTION).await;
        info!(repo = %repo, pr = %number, user = %login, "Marked pull request as not to be merged");
        self.respond(repo, number, &responses::not_merging(login)).await;
    }

    // ─── PR lifecycle ─────────────────────────────────────────────────────────

    async fn handle_pull_request(&self, event: PullRequestEvent) {
        let pr = event.pull_request;
        let _guard = self.inner.locks.lock(&pr.repo).await;

        let engine = Arc::clone(&self.inner.engine);
        let repo = pr.repo.clone();
        let number = pr.number;
        let refresh = event.action.refreshes_mirror();

        let result = tokio::task::spawn_blocking(move || {
            if refresh {
                engine.sync_mirror(&repo, number)
            } else {
                engine.remove_mirror(&repo, number)
            }
        })
        .await;

        match result {
            Ok(Ok(())) => debug!(repo = %pr.repo, pr = %number, action = ?event.action, "Synced mirror branch"),
            Ok(Err(e)) => warn!(repo = %pr.repo, pr = %number, error = %e, "Failed to sync mirror branch"),
            Err(e) => error!(repo = %pr.repo, pr = %number, error = %e, "Mirror task panicked"),
        }

        let description = if refresh { OPEN_DESCRIPTION } else { CLOSED_DESCRIPTION };
        self.set_review_status(&pr, BuildState::Success, description).await;
    }

    // ─── Helpers ──────────────────────────────────────────────────────────────

    async fn respond(&self, repo: &RepoId, number: PrNumber, body: &str) {
        if let Err(e) = self.inner.hosting.post_comment(repo, number, body).await {
            warn!(repo = %repo, pr = %number, error = %e, "Failed to post comment");
        }
    }

    async fn set_review_status(&self, pr: &PullRequest, state: BuildState, description: &str) {
        let context = &self.inner.config.review_context;
        if let Err(e) = self.inner.hosting.set_status(pr, state, context, description).await {
            warn!(repo = %pr.repo, pr = %pr.number, error = %e, "Failed to set review status");
        }
    }
}
