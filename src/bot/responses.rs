//! Comment texts the bot posts back on pull requests.
//!
//! Every response mentions the user who issued the command. Failure details
//! (usually a git transcript) are truncated so the comment stays under
//! GitHub's size limit.

use std::time::Duration;

use crate::types::{BuildStatus, Sha};

/// Maximum size of a GitHub comment body, in bytes.
pub const GITHUB_COMMENT_SIZE_LIMIT: usize = 65536;

/// Budget for the detail block, leaving room for the surrounding text.
const MAX_DETAIL_LEN: usize = GITHUB_COMMENT_SIZE_LIMIT - 1024;

pub fn no_access(login: &str) -> String {
    format!("@{} Sorry, I can't take merge requests from you on this repository.", login)
}

pub fn already_pending(login: &str) -> String {
    format!(
        "@{} A merge of this pull request is already pending. I'll comment here when it's done.",
        login
    )
}

pub fn waiting(login: &str) -> String {
    format!("@{} The build is still running. I'll merge as soon as it passes.", login)
}

pub fn bad_build(login: &str, status: &BuildStatus) -> String {
    format!(
        "@{} I can't merge this: the build status is {}.",
        login,
        status.describe()
    )
}

pub fn timeout(login: &str, waited: Duration) -> String {
    format!(
        "@{} I gave up waiting for the build after {}. Ask again once it's green.",
        login,
        format_duration(waited)
    )
}

pub fn interrupted(login: &str) -> String {
    format!(
        "@{} I was shut down while waiting for the build, so this won't be merged. Please ask again.",
        login
    )
}

pub fn clone_failed(login: &str, detail: &str) -> String {
    format!("@{} I couldn't clone the repository:\n\n{}", login, detail_block(detail))
}

pub fn error(login: &str, detail: &str) -> String {
    format!("@{} The merge failed:\n\n{}", login, detail_block(detail))
}

pub fn no_user(login: &str) -> String {
    format!(
        "@{} I need the name and public email on your GitHub profile to commit on your behalf. \
         Please make your email public and ask again.",
        login
    )
}

pub fn thanks(login: &str, sha: &Sha) -> String {
    format!("@{} Merged as {}. Thanks!", login, sha)
}

pub fn not_merging(login: &str) -> String {
    format!("@{} OK, this won't be merged as is.", login)
}

/// Formats a single-line detail as is and anything longer as a fenced block.
fn detail_block(detail: &str) -> String {
    let detail = truncate_with_suffix(detail.trim(), MAX_DETAIL_LEN);
    if !detail.contains('\n') {
        return detail;
    }
    let fence = if detail.contains("```") { "~~~" } else { "```" };
    format!("{fence}\n{detail}\n{fence}")
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        s if s >= 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}

/// Truncates a string to at most `max_len` bytes with a "... [truncated]" suffix.
fn truncate_with_suffix(s: &str, max_len: usize) -> String {
    const SUFFIX: &str = "... [truncated]";

    if s.len() <= max_len {
        return s.to_string();
    }

    let mut end = max_len.saturating_sub(SUFFIX.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}{}", &s[..end], SUFFIX)
}
