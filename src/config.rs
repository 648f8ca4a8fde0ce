//! Process configuration, read from `MERGE_BOT_*` environment variables.
//!
//! | Variable | Required | Default |
//! |---|---|---|
//! | `MERGE_BOT_GITHUB_TOKEN` | yes | |
//! | `MERGE_BOT_WEBHOOK_SECRET` | yes | |
//! | `MERGE_BOT_NAME` | no | `merge-bot` |
//! | `MERGE_BOT_ALLOWED_USERS` | no | none (comma separated) |
//! | `MERGE_BOT_ALLOWED_TEAMS` | no | none (comma separated team slugs) |
//! | `MERGE_BOT_WORKSPACE_DIR` | no | `workspaces` |
//! | `MERGE_BOT_LISTEN_ADDR` | no | `0.0.0.0:3000` |
//! | `MERGE_BOT_CLONE_URL_TEMPLATE` | no | `git@github.com:{repo}.git` |
//! | `MERGE_BOT_REVIEW_CONTEXT` | no | `merge-bot/review` |
//! | `MERGE_BOT_MAX_WAIT_MINS` | no | `30` |
//! | `MERGE_BOT_MAX_POLL_INTERVAL_SECS` | no | `64` |
//! | `MERGE_BOT_TEAM_CACHE_TTL_SECS` | no | `300` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::bot::{BotConfig, DEFAULT_REVIEW_CONTEXT};
use crate::git::{DEFAULT_CLONE_URL_TEMPLATE, WorkspaceConfig};
use crate::permissions::DEFAULT_TEAM_CACHE_TTL;
use crate::webhooks::WebhookSecret;

pub const DEFAULT_BOT_NAME: &str = "merge-bot";
pub const DEFAULT_WORKSPACE_DIR: &str = "workspaces";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Errors from reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    pub webhook_secret: WebhookSecret,
    pub listen_addr: SocketAddr,
    pub allowed_users: Vec<String>,
    pub allowed_teams: Vec<String>,
    pub team_cache_ttl: Duration,
    pub workspace: WorkspaceConfig,
    pub bot: BotConfig,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to
    /// its value. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let github_token = required("MERGE_BOT_GITHUB_TOKEN")?;
        let webhook_secret = WebhookSecret::new(required("MERGE_BOT_WEBHOOK_SECRET")?);

        let listen_addr = parse_var(
            "MERGE_BOT_LISTEN_ADDR",
            get("MERGE_BOT_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
        )?;

        let mut workspace = WorkspaceConfig::new(
            get("MERGE_BOT_WORKSPACE_DIR").map_or_else(|| PathBuf::from(DEFAULT_WORKSPACE_DIR), PathBuf::from),
        );
        if let Some(template) = get("MERGE_BOT_CLONE_URL_TEMPLATE") {
            if !template.contains("{repo}") {
                return Err(ConfigError::Invalid {
                    var: "MERGE_BOT_CLONE_URL_TEMPLATE",
                    value: template,
                    reason: "missing {repo} placeholder".to_string(),
                });
            }
            workspace.clone_url_template = template;
        }

        let mut bot = BotConfig::new(get("MERGE_BOT_NAME").unwrap_or_else(|| DEFAULT_BOT_NAME.to_string()));
        bot.review_context = get("MERGE_BOT_REVIEW_CONTEXT").unwrap_or_else(|| DEFAULT_REVIEW_CONTEXT.to_string());
        if let Some(mins) = get("MERGE_BOT_MAX_WAIT_MINS") {
            let secs = positive("MERGE_BOT_MAX_WAIT_MINS", mins.clone())?
                .checked_mul(60)
                .ok_or_else(|| ConfigError::Invalid {
                    var: "MERGE_BOT_MAX_WAIT_MINS",
                    value: mins,
                    reason: "too large".to_string(),
                })?;
            bot.poll.max_wait = Duration::from_secs(secs);
        }
        if let Some(secs) = get("MERGE_BOT_MAX_POLL_INTERVAL_SECS") {
            bot.poll.max_interval = Duration::from_secs(positive("MERGE_BOT_MAX_POLL_INTERVAL_SECS", secs)?);
        }

        let team_cache_ttl = match get("MERGE_BOT_TEAM_CACHE_TTL_SECS") {
            Some(secs) => Duration::from_secs(parse_var("MERGE_BOT_TEAM_CACHE_TTL_SECS", secs)?),
            None => DEFAULT_TEAM_CACHE_TTL,
        };

        Ok(Config {
            github_token,
            webhook_secret,
            listen_addr,
            allowed_users: get("MERGE_BOT_ALLOWED_USERS").map(|v| split_list(&v)).unwrap_or_default(),
            allowed_teams: get("MERGE_BOT_ALLOWED_TEAMS").map(|v| split_list(&v)).unwrap_or_default(),
            team_cache_ttl,
            workspace,
            bot,
        })
    }
}

fn parse_var<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}

fn positive(var: &'static str, value: String) -> Result<u64, ConfigError> {
    let n: u64 = parse_var(var, value.clone())?;
    if n == 0 {
        return Err(ConfigError::Invalid {
            var,
            value,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(n)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
