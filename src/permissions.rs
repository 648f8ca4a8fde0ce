//! Who may issue merge and stop commands.
//!
//! [`TeamPermissions`] allows a fixed list of users plus the members of
//! configured teams in the repository owner's organisation. Team membership
//! is fetched through a [`TeamDirectory`] and cached for a configurable TTL.
//! Lookups fail closed: a user whose membership can't be fetched is denied.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::github::{GitHubClient, HostingError};
use crate::types::RepoId;

/// Default lifetime of a cached team member list.
pub const DEFAULT_TEAM_CACHE_TTL: Duration = Duration::from_secs(300);

/// Decides whether a user may command the bot on a repository.
pub trait PermissionResolver: Send + Sync + 'static {
    fn is_allowed(&self, repo: &RepoId, login: &str) -> impl Future<Output = bool> + Send;
}

/// Source of team member lists.
pub trait TeamDirectory: Send + Sync + 'static {
    fn team_members(
        &self,
        org: &str,
        team: &str,
    ) -> impl Future<Output = Result<Vec<String>, HostingError>> + Send;
}

impl TeamDirectory for GitHubClient {
    async fn team_members(&self, org: &str, team: &str) -> Result<Vec<String>, HostingError> {
        GitHubClient::team_members(self, org, team).await
    }
}

struct CachedTeam {
    fetched_at: Instant,
    members: HashSet<String>,
}

/// Allow-list plus team-membership permissions.
pub struct TeamPermissions<D> {
    directory: D,
    users: HashSet<String>,
    teams: Vec<String>,
    ttl: Duration,
    cache: Mutex<HashMap<(String, String), CachedTeam>>,
}

impl<D: TeamDirectory> TeamPermissions<D> {
    /// Creates a resolver. Logins are compared case-insensitively.
    pub fn new(
        directory: D,
        users: impl IntoIterator<Item = String>,
        teams: impl IntoIterator<Item = String>,
        ttl: Duration,
    ) -> Self {
        TeamPermissions {
            directory,
            users: users.into_iter().map(|u| u.to_lowercase()).collect(),
            teams: teams.into_iter().collect(),
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn is_team_member(&self, org: &str, team: &str, login: &str) -> bool {
        let key = (org.to_lowercase(), team.to_lowercase());
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.get(&key)
            && cached.fetched_at.elapsed() < self.ttl
        {
            return cached.members.contains(login);
        }

        match self.directory.team_members(org, team).await {
            Ok(members) => {
                debug!(org, team, "Refreshed team membership");
                let members: HashSet<String> = members.into_iter().map(|m| m.to_lowercase()).collect();
                let allowed = members.contains(login);
                cache.insert(
                    key,
                    CachedTeam {
                        fetched_at: Instant::now(),
                        members,
                    },
                );
                allowed
            }
            Err(e) => {
                warn!(org, team, error = %e, "Failed to fetch team members");
                false
            }
        }
    }
}

impl<D: TeamDirectory> PermissionResolver for TeamPermissions<D> {
    async fn is_allowed(&self, repo: &RepoId, login: &str) -> bool {
        let login = login.to_lowercase();
        if self.users.contains(&login) {
            return true;
        }

        for team in &self.teams {
            if self.is_team_member(&repo.owner, team, &login).await {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct FakeDirectory {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl TeamDirectory for FakeDirectory {
        async fn team_members(&self, org: &str, team: &str) -> Result<Vec<String>, HostingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HostingError::invalid("list team members", "boom"));
            }
            match (org, team) {
                ("octocat", "maintainers") => Ok(vec!["Grace".to_string(), "linus".to_string()]),
                _ => Ok(vec![]),
            }
        }
    }

    fn repo() -> RepoId {
        RepoId::new("octocat", "hello")
    }

    fn permissions(directory: FakeDirectory) -> TeamPermissions<FakeDirectory> {
        TeamPermissions::new(
            directory,
            vec!["Ada".to_string()],
            vec!["maintainers".to_string()],
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn allow_list_is_case_insensitive() {
        let directory = FakeDirectory::default();
        let perms = permissions(directory.clone());

        assert!(perms.is_allowed(&repo(), "ada").await);
        assert!(perms.is_allowed(&repo(), "ADA").await);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn team_members_are_allowed() {
        let perms = permissions(FakeDirectory::default());

        assert!(perms.is_allowed(&repo(), "grace").await);
        assert!(perms.is_allowed(&repo(), "Linus").await);
        assert!(!perms.is_allowed(&repo(), "mallory").await);
    }

    #[tokio::test]
    async fn teams_are_looked_up_in_the_repository_owner_org() {
        let perms = permissions(FakeDirectory::default());

        assert!(!perms.is_allowed(&RepoId::new("someone-else", "hello"), "grace").await);
    }

    #[tokio::test(start_paused = true)]
    async fn membership_is_cached_until_ttl_expires() {
        let directory = FakeDirectory::default();
        let perms = permissions(directory.clone());

        perms.is_allowed(&repo(), "grace").await;
        perms.is_allowed(&repo(), "mallory").await;
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        perms.is_allowed(&repo(), "grace").await;
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn directory_failure_denies_and_is_not_cached() {
        let directory = FakeDirectory {
            fail: true,
            ..Default::default()
        };
        let perms = permissions(directory.clone());

        assert!(!perms.is_allowed(&repo(), "grace").await);
        assert!(!perms.is_allowed(&repo(), "grace").await);
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
    }
}
