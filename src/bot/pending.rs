//! The set of pull requests with a deferred merge in flight.
//!
//! Entries are only added through [`PendingMerges::claim`] and only removed
//! when the returned [`PendingClaim`] is dropped, so every exit path of a
//! poller (merge, failure, timeout, cancellation, panic) releases its entry
//! exactly once.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::types::{PrNumber, RepoId};

type Key = (RepoId, PrNumber);

/// Process-wide set of pending (repository, PR) pairs.
#[derive(Debug, Clone, Default)]
pub struct PendingMerges {
    inner: Arc<Mutex<HashSet<Key>>>,
}

impl PendingMerges {
    pub fn new() -> Self {
        Self::default()
    }

    // The set stays consistent even if a holder panicked, so poisoning is ignored.
    fn entries(&self) -> MutexGuard<'_, HashSet<Key>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `pr` as pending. Returns `None` if it already is.
    pub fn claim(&self, repo: &RepoId, pr: PrNumber) -> Option<PendingClaim> {
        let key = (repo.clone(), pr);
        if !self.entries().insert(key.clone()) {
            return None;
        }
        debug!(repo = %repo, pr = %pr, "Claimed pending merge");
        Some(PendingClaim {
            set: self.clone(),
            key,
        })
    }

    pub fn contains(&self, repo: &RepoId, pr: PrNumber) -> bool {
        self.entries().contains(&(repo.clone(), pr))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ownership of one pending entry; releases it on drop.
#[derive(Debug)]
pub struct PendingClaim {
    set: PendingMerges,
    key: Key,
}

impl Drop for PendingClaim {
    fn drop(&mut self) {
        self.set.entries().remove(&self.key);
        debug!(repo = %self.key.0, pr = %self.key.1, "Released pending merge");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepoId {
        RepoId::new("octocat", "hello")
    }

    #[test]
    fn claim_is_exclusive_until_dropped() {
        let pending = PendingMerges::new();

        let claim = pending.claim(&repo(), PrNumber(7)).unwrap();
        assert!(pending.contains(&repo(), PrNumber(7)));
        assert!(pending.claim(&repo(), PrNumber(7)).is_none());

        drop(claim);
        assert!(!pending.contains(&repo(), PrNumber(7)));
        assert!(pending.claim(&repo(), PrNumber(7)).is_some());
    }

    #[test]
    fn failed_claim_does_not_release_existing_entry() {
        let pending = PendingMerges::new();

        let _claim = pending.claim(&repo(), PrNumber(7)).unwrap();
        assert!(pending.claim(&repo(), PrNumber(7)).is_none());

        assert!(pending.contains(&repo(), PrNumber(7)));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn same_number_in_different_repositories_is_independent() {
        let pending = PendingMerges::new();

        let _a = pending.claim(&repo(), PrNumber(7)).unwrap();
        let b = pending.claim(&RepoId::new("octocat", "other"), PrNumber(7));

        assert!(b.is_some());
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn claim_is_released_when_holder_panics() {
        let pending = PendingMerges::new();
        let for_thread = pending.clone();

        let result = std::thread::spawn(move || {
            let _claim = for_thread.claim(&RepoId::new("octocat", "hello"), PrNumber(7)).unwrap();
            panic!("poller blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(pending.is_empty());
    }
}
