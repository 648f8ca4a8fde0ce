//! Core domain types for the merge bot.

pub mod ids;
pub mod pr;
pub mod status;

pub use ids::{InvalidRepoName, InvalidSha, PrNumber, RepoId, Sha, validate_path_component};
pub use pr::{PullRequest, User};
pub use status::{BuildState, BuildStatus, StatusCheck};
