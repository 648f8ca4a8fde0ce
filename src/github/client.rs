//! Octocrab-backed [`HostingClient`].
//!
//! Uses octocrab's raw `get`/`post`/`patch` with small response structs
//! rather than its typed models, so only the fields the bot reads have to
//! deserialize.

use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{BuildState, PrNumber, PullRequest, RepoId, Sha, StatusCheck, User};

use super::{HostingClient, HostingError};

/// Maximum page size GitHub accepts for list endpoints.
const PER_PAGE: u32 = 100;

/// A GitHub API client shared by every repository the bot serves.
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
}

impl GitHubClient {
    pub fn new(client: Octocrab) -> Self {
        GitHubClient { client }
    }

    /// Creates a client authenticated with a personal access token.
    pub fn from_token(token: impl Into<String>) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client))
    }

    /// Lists the logins of a team's members, following pagination.
    pub async fn team_members(&self, org: &str, team: &str) -> Result<Vec<String>, HostingError> {
        let url = format!("/orgs/{}/teams/{}/members", org, team);
        let mut logins = Vec::new();
        let mut page = 1u32;

        loop {
            let members: Vec<RawLogin> = self
                .client
                .get(&url, Some(&PageParams { per_page: PER_PAGE, page }))
                .await
                .map_err(HostingError::api("list team members"))?;

            let is_last_page = members.len() < PER_PAGE as usize;
            logins.extend(members.into_iter().map(|m| m.login));
            if is_last_page {
                break;
            }
            page += 1;
        }

        debug!(org, team, members = logins.len(), "Fetched team members");
        Ok(logins)
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient").finish_non_exhaustive()
    }
}

// ─── Wire formats ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: u32,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct RawLogin {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    html_url: String,
    head: RawCommitRef,
    base: RawBranchRef,
}

#[derive(Debug, Deserialize)]
struct RawCommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RawBranchRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

impl RawPullRequest {
    fn into_pull_request(self, repo: &RepoId) -> Result<PullRequest, HostingError> {
        let head_sha = Sha::parse(&self.head.sha)
            .map_err(|e| HostingError::invalid("get pull request", e.to_string()))?;
        Ok(PullRequest {
            repo: repo.clone(),
            number: PrNumber(self.number),
            html_url: self.html_url,
            head_sha,
            base_branch: self.base.ref_name,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawCombinedStatus {
    #[serde(default)]
    statuses: Vec<StatusCheck>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl From<RawUser> for User {
    fn from(raw: RawUser) -> Self {
        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| raw.login.clone());
        User {
            login: raw.login,
            name,
            email: raw.email.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct StateRequest {
    state: &'static str,
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    state: &'static str,
    context: &'a str,
    description: &'a str,
}

// ─── HostingClient ────────────────────────────────────────────────────────────

impl HostingClient for GitHubClient {
    async fn pull_request(&self, repo: &RepoId, number: PrNumber) -> Result<PullRequest, HostingError> {
        let url = format!("/repos/{}/{}/pulls/{}", repo.owner, repo.repo, number.0);
        let raw: RawPullRequest = self
            .client
            .get(&url, None::<&()>)
            .await
            .map_err(HostingError::api("get pull request"))?;
        raw.into_pull_request(repo)
    }

    async fn statuses(&self, pr: &PullRequest) -> Result<Vec<StatusCheck>, HostingError> {
        let url = format!(
            "/repos/{}/{}/commits/{}/status",
            pr.repo.owner, pr.repo.repo, pr.head_sha
        );
        let combined: RawCombinedStatus = self
            .client
            .get(&url, Some(&PageParams { per_page: PER_PAGE, page: 1 }))
            .await
            .map_err(HostingError::api("get combined status"))?;
        Ok(combined.statuses)
    }

    async fn user(&self, login: &str) -> Result<User, HostingError> {
        let url = format!("/users/{}", login);
        let raw: RawUser = self
            .client
            .get(&url, None::<&()>)
            .await
            .map_err(HostingError::api("get user"))?;
        Ok(raw.into())
    }

    async fn post_comment(&self, repo: &RepoId, number: PrNumber, body: &str) -> Result<(), HostingError> {
        let url = format!("/repos/{}/{}/issues/{}/comments", repo.owner, repo.repo, number.0);
        let _: serde_json::Value = self
            .client
            .post(&url, Some(&CommentRequest { body }))
            .await
            .map_err(HostingError::api("post comment"))?;
        Ok(())
    }

    async fn close(&self, repo: &RepoId, number: PrNumber) -> Result<(), HostingError> {
        let url = format!("/repos/{}/{}/pulls/{}", repo.owner, repo.repo, number.0);
        let _: serde_json::Value = self
            .client
            .patch(&url, Some(&StateRequest { state: "closed" }))
            .await
            .map_err(HostingError::api("close pull request"))?;
        Ok(())
    }

    async fn set_status(
        &self,
        pr: &PullRequest,
        state: BuildState,
        context: &str,
        description: &str,
    ) -> Result<(), HostingError> {
        let url = format!(
            "/repos/{}/{}/statuses/{}",
            pr.repo.owner, pr.repo.repo, pr.head_sha
        );
        let _: serde_json::Value = self
            .client
            .post(
                &url,
                Some(&StatusRequest {
                    state: state.as_api_str(),
                    context,
                    description,
                }),
            )
            .await
            .map_err(HostingError::api("create status"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_request_response_maps_to_domain_type() {
        let json = r#"{
            "number": 42,
            "html_url": "https://github.com/octocat/hello/pull/42",
            "state": "open",
            "head": { "sha": "ABCDEF0123456789abcdef0123456789abcdef01", "ref": "feature" },
            "base": { "sha": "0000000000000000000000000000000000000000", "ref": "main" }
        }"#;
        let raw: RawPullRequest = serde_json::from_str(json).unwrap();
        let repo = RepoId::new("octocat", "hello");

        let pr = raw.into_pull_request(&repo).unwrap();

        assert_eq!(pr.number, PrNumber(42));
        assert_eq!(pr.base_branch, "main");
        assert_eq!(pr.head_sha.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(pr.repo, repo);
    }

    #[test]
    fn pull_request_with_bad_sha_is_invalid_response() {
        let json = r#"{
            "number": 1,
            "html_url": "https://github.com/o/r/pull/1",
            "head": { "sha": "nope" },
            "base": { "ref": "main" }
        }"#;
        let raw: RawPullRequest = serde_json::from_str(json).unwrap();

        let err = raw.into_pull_request(&RepoId::new("o", "r")).unwrap_err();

        assert!(matches!(err, HostingError::InvalidResponse { .. }));
    }

    #[test]
    fn combined_status_lists_checks() {
        let json = r#"{
            "state": "failure",
            "sha": "abcdef0123456789abcdef0123456789abcdef01",
            "statuses": [
                { "context": "ci/build", "state": "success", "description": "ok" },
                { "context": "ci/test", "state": "failure", "description": null }
            ]
        }"#;
        let combined: RawCombinedStatus = serde_json::from_str(json).unwrap();

        assert_eq!(combined.statuses.len(), 2);
        assert_eq!(combined.statuses[1].context, "ci/test");
        assert_eq!(combined.statuses[1].state, BuildState::Failure);
        assert_eq!(combined.statuses[0].description.as_deref(), Some("ok"));
    }

    #[test]
    fn user_name_falls_back_to_login() {
        let raw: RawUser = serde_json::from_str(r#"{ "login": "ada", "name": null, "email": null }"#).unwrap();
        let user = User::from(raw);

        assert_eq!(user.name, "ada");
        assert_eq!(user.email, "");
    }

    #[test]
    fn user_keeps_public_profile() {
        let raw: RawUser =
            serde_json::from_str(r#"{ "login": "ada", "name": "Ada L", "email": "ada@example.com" }"#).unwrap();
        let user = User::from(raw);

        assert_eq!(user.name, "Ada L");
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn status_request_uses_api_state_names() {
        let body = serde_json::to_value(StatusRequest {
            state: BuildState::Failure.as_api_str(),
            context: "merge-bot/review",
            description: "Not to be merged as is.",
        })
        .unwrap();

        assert_eq!(body["state"], "failure");
        assert_eq!(body["context"], "merge-bot/review");
    }
}
