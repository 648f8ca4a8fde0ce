//! Build status checks and their aggregation.
//!
//! A pull request's head commit carries any number of named status checks
//! (CI jobs, the bot's own review context, ...). The merge decision only ever
//! looks at the aggregate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single status check, or of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Success,
    Pending,
    Failure,
    Error,
}

impl BuildState {
    /// Returns the state as the lowercase string the status API uses.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            BuildState::Success => "success",
            BuildState::Pending => "pending",
            BuildState::Failure => "failure",
            BuildState::Error => "error",
        }
    }

    /// Returns true for states that end a merge attempt without merging.
    pub fn is_failing(&self) -> bool {
        matches!(self, BuildState::Failure | BuildState::Error)
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// One named status check reported against a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
    /// The check's context name (e.g. `ci/build`).
    pub context: String,
    pub state: BuildState,
    #[serde(default)]
    pub description: Option<String>,
}

impl StatusCheck {
    pub fn new(context: impl Into<String>, state: BuildState) -> Self {
        StatusCheck {
            context: context.into(),
            state,
            description: None,
        }
    }
}

/// The aggregate status of a commit, with the check responsible for a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStatus {
    pub state: BuildState,
    /// The first failing or erroring check, when `state` is failing.
    pub offending: Option<StatusCheck>,
}

impl BuildStatus {
    /// Aggregates a list of checks.
    ///
    /// Priority is failure/error > pending > success. When both failure and
    /// error checks are present, the first one in reported order decides the
    /// aggregate state. An empty list aggregates to pending: no evidence that
    /// the build has passed is not the same as a passing build.
    pub fn aggregate(checks: &[StatusCheck]) -> Self {
        if let Some(bad) = checks.iter().find(|c| c.state.is_failing()) {
            return BuildStatus {
                state: bad.state,
                offending: Some(bad.clone()),
            };
        }

        let state = if checks.is_empty() || checks.iter().any(|c| c.state == BuildState::Pending) {
            BuildState::Pending
        } else {
            BuildState::Success
        };

        BuildStatus {
            state,
            offending: None,
        }
    }

    /// Human-readable description used in bad-build responses.
    pub fn describe(&self) -> String {
        match &self.offending {
            Some(check) => format!("{} ({})", self.state, check.context),
            None => self.state.to_string(),
        }
    }
}
