//! The squash-merge transaction.
//!
//! [`squash`] rewrites a pull request's commits into a single commit on its
//! base branch and pushes it. The whole transaction runs through one
//! [`Pipeline`], so the first failing git step aborts everything after it
//! (in particular the push) and the full git transcript becomes the error.
//!
//! # Steps
//!
//! 1. Fetch the PR head into `pr-<n>` and the base into `refs/shadow/<base>`.
//!    The shadow ref means fetching never has to update a checked-out branch.
//!    The fetched head must still be the commit whose build was checked.
//! 2. Reset, check out the base at the shadow ref, and clean. Whatever state a
//!    previous (possibly failed) attempt left behind is discarded.
//! 3. List commits unique to `pr-<n>` since the merge base; none means there
//!    is nothing to merge.
//! 4. Take the author from the oldest of those commits. The committer is the
//!    user who asked for the merge.
//! 5. Build the message (override or oldest commit's message, plus trailer).
//! 6. `merge --squash --no-commit`, then `commit -F -` with the message on stdin.
//! 7. Record `HEAD` and push the base branch.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::types::{InvalidSha, PullRequest, Sha, User};

use super::CommitIdentity;
use super::pipeline::{Invocation, Pipeline, PipelineFailure};
use super::workspace::WorkspaceError;

/// Width descriptions are reflowed to in override messages.
pub const REFLOW_WIDTH: usize = 76;

/// Trailer key linking a squash commit back to its pull request.
pub const PULL_REQUEST_TRAILER: &str = "GitHub-Pull-Request";

/// Errors from a squash-merge attempt.
#[derive(Debug, Error)]
pub enum SquashError {
    /// The PR branch has no commits that aren't already on the base branch.
    #[error("Nothing to merge, as far as I can tell.")]
    NothingToMerge,

    /// The PR head moved after its build status was checked.
    #[error("The pull request was updated to {actual} while I was checking {expected}; please ask again once the new commits are green.")]
    HeadMoved { expected: Sha, actual: String },

    /// The workspace could not be resolved or cloned.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// A git step failed; displays the transcript of every step that ran.
    #[error("{0}")]
    Git(#[source] PipelineFailure),

    /// `git rev-parse HEAD` printed something that isn't a SHA.
    #[error("unexpected commit hash from git: {0}")]
    InvalidSha(#[from] InvalidSha),
}

impl SquashError {
    /// Returns true if the failure happened while cloning the repository.
    pub fn is_clone_failure(&self) -> bool {
        matches!(self, SquashError::Workspace(WorkspaceError::Clone(_)))
    }
}

/// A commit message supplied in the merge command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOverride {
    pub subject: String,
    pub description: String,
}

/// Everything one squash-merge needs.
#[derive(Debug, Clone)]
pub struct SquashRequest {
    pub pr: PullRequest,
    /// The user who triggered the merge; becomes the committer.
    pub committer: User,
    pub message_override: Option<MessageOverride>,
}

/// Squash-merges `request.pr` into its base branch inside the checkout at
/// `workdir` and pushes the result. Returns the new commit's SHA.
pub fn squash(workdir: &Path, request: &SquashRequest) -> Result<Sha, SquashError> {
    let pr = &request.pr;
    let source = pr.number.branch_name();
    let base = pr.base_branch.as_str();
    let shadow = format!("refs/shadow/{}", base);

    let mut pipeline = Pipeline::new(workdir);

    pipeline.run(Invocation::git([
        "fetch".to_string(),
        "origin".to_string(),
        format!("+{}:{}", pr.number.head_ref(), source),
    ]));
    pipeline.run(Invocation::git([
        "fetch".to_string(),
        "origin".to_string(),
        format!("+refs/heads/{}:{}", base, shadow),
    ]));

    let fetched = pipeline.run(Invocation::git(["rev-parse", source.as_str()]));
    if !pipeline.is_failed() && !fetched.eq_ignore_ascii_case(pr.head_sha.as_str()) {
        info!(repo = %pr.repo, pr = %pr.number, expected = %pr.head_sha, actual = %fetched, "Pull request head moved");
        return Err(SquashError::HeadMoved {
            expected: pr.head_sha.clone(),
            actual: fetched,
        });
    }

    pipeline.run(Invocation::git(["reset", "--hard"]));
    pipeline.run(Invocation::git(["checkout", "-B", base, shadow.as_str()]));
    pipeline.run(Invocation::git(["reset", "--hard", shadow.as_str()]));
    pipeline.run(Invocation::git(["clean", "-fxd"]));

    let merge_base = pipeline.run(Invocation::git(["merge-base", source.as_str(), base]));
    let revs = pipeline.run(Invocation::git([
        "rev-list".to_string(),
        "--reverse".to_string(),
        format!("{}..{}", merge_base, source),
    ]));

    let oldest = revs.split_whitespace().next().unwrap_or_default().to_string();
    if oldest.is_empty() && !pipeline.is_failed() {
        info!(repo = %pr.repo, pr = %pr.number, "Pull request has no commits to merge");
        return Err(SquashError::NothingToMerge);
    }

    let author_name = pipeline.run(Invocation::git(["log", "-n1", "--pretty=format:%an", oldest.as_str()]));
    let author_email = pipeline.run(Invocation::git(["log", "-n1", "--pretty=format:%ae", oldest.as_str()]));

    let original_message = match &request.message_override {
        Some(_) => String::new(),
        None => pipeline.run(Invocation::git(["log", "-n1", "--pretty=format:%B", oldest.as_str()])),
    };
    let message = build_commit_message(
        request.message_override.as_ref(),
        &original_message,
        &pr.html_url,
    );

    let identity = CommitIdentity {
        author_name,
        author_email,
        committer_name: request.committer.name.clone(),
        committer_email: request.committer.email.clone(),
    };

    pipeline.run(identity.apply(Invocation::git(["merge", "--squash", "--no-commit", source.as_str()])));
    pipeline.run(identity.apply(Invocation::git(["commit", "-F", "-"]).stdin(message)));
    let head = pipeline.run(Invocation::git(["rev-parse", "HEAD"]));
    pipeline.run(Invocation::git(["push", "origin", base]));

    pipeline.finish().map_err(SquashError::Git)?;
    let sha = Sha::parse(&head)?;

    info!(
        repo = %pr.repo,
        pr = %pr.number,
        sha = %sha,
        author = %identity.author_email,
        committer = %identity.committer_email,
        "Squash-merged pull request"
    );
    Ok(sha)
}

/// Builds the squash commit message.
///
/// With an override, the body is the subject, a blank line, and the
/// description reflowed to [`REFLOW_WIDTH`] columns. Otherwise it is
/// `original`. Either way the trimmed body is followed by a blank line and a
/// `GitHub-Pull-Request: <url>` trailer.
pub fn build_commit_message(
    message_override: Option<&MessageOverride>,
    original: &str,
    pr_url: &str,
) -> String {
    let body = match message_override {
        Some(o) => format!("{}\n\n{}", o.subject.trim(), reflow(&o.description, REFLOW_WIDTH)),
        None => original.to_string(),
    };

    format!("{}\n\n{}: {}\n", body.trim(), PULL_REQUEST_TRAILER, pr_url)
}

/// Greedily re-wraps each paragraph of `text` to at most `width` columns.
///
/// Paragraphs are separated by blank lines and stay separated by exactly one.
/// A paragraph containing an indented line is treated as preformatted and kept
/// as is. Words longer than `width` get a line of their own.
pub fn reflow(text: &str, width: usize) -> String {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(reflow_paragraph(&current, width));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(reflow_paragraph(&current, width));
    }

    paragraphs.join("\n\n")
}

fn reflow_paragraph(lines: &[&str], width: usize) -> String {
    if lines.iter().any(|l| l.starts_with(char::is_whitespace)) {
        return lines.join("\n");
    }

    let mut out = String::new();
    let mut line_len = 0;
    for word in lines.iter().flat_map(|l| l.split_whitespace()) {
        let word_len = word.chars().count();
        if line_len == 0 {
            line_len = word_len;
        } else if line_len + 1 + word_len <= width {
            out.push(' ');
            line_len += 1 + word_len;
        } else {
            out.push('\n');
            line_len = word_len;
        }
        out.push_str(word);
    }
    out
}
