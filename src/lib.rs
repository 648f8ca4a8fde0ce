//! Merge Bot - a GitHub bot that squash-merges pull requests on command.
//!
//! Collaborators comment `@merge-bot merge` on a pull request. Once its
//! build is green the bot squashes the branch onto the base, pushes, thanks
//! the requester and closes the pull request. `@merge-bot stop` vetoes a
//! merge.

pub mod bot;
pub mod commands;
pub mod config;
pub mod git;
pub mod github;
pub mod permissions;
pub mod server;
pub mod types;
pub mod webhooks;
