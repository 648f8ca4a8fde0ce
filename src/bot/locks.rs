//! Per-repository serialization.
//!
//! Every operation that touches a repository's workspace or decides a merge
//! holds that repository's lock. Different repositories never contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::types::RepoId;

/// Lazily created async mutexes, one per repository.
#[derive(Debug, Clone, Default)]
pub struct RepoLocks {
    locks: Arc<RwLock<HashMap<RepoId, Arc<Mutex<()>>>>>,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and returns the lock for `repo`. Released on drop.
    pub async fn lock(&self, repo: &RepoId) -> OwnedMutexGuard<()> {
        self.mutex_for(repo).await.lock_owned().await
    }

    async fn mutex_for(&self, repo: &RepoId) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(mutex) = locks.get(repo) {
                return Arc::clone(mutex);
            }
        }

        let mut locks = self.locks.write().await;

        // Another task may have created it between the two acquisitions.
        if let Some(mutex) = locks.get(repo) {
            return Arc::clone(mutex);
        }

        debug!(repo = %repo, "Creating repository lock");
        let mutex = Arc::new(Mutex::new(()));
        locks.insert(repo.clone(), Arc::clone(&mutex));
        mutex
    }

    /// Number of repositories that have had a lock created.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn same_repository_is_serialized() {
        let locks = RepoLocks::new();
        let repo = RepoId::new("octocat", "hello");

        let guard = locks.lock(&repo).await;

        let contender = {
            let locks = locks.clone();
            let repo = repo.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&repo).await;
            })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_repositories_do_not_contend() {
        let locks = RepoLocks::new();

        let _a = locks.lock(&RepoId::new("octocat", "a")).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(&RepoId::new("octocat", "b"))).await;

        assert!(b.is_ok());
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn locks_are_reused() {
        let locks = RepoLocks::new();
        let repo = RepoId::new("octocat", "hello");

        drop(locks.lock(&repo).await);
        drop(locks.lock(&repo).await);

        assert_eq!(locks.len().await, 1);
    }
}
