//! Timing for deferred merges.
//!
//! When a merge is requested while the build is still pending, the bot
//! re-checks the aggregate status with exponential backoff:
//!
//! - **First wait**: 1 second
//! - **Growth**: doubled after each unsuccessful poll
//! - **Cap**: 64 seconds between polls (`MERGE_BOT_MAX_POLL_INTERVAL_SECS`)
//! - **Ceiling**: 30 minutes in total (`MERGE_BOT_MAX_WAIT_MINS`), after which
//!   the merge is abandoned with a timeout response
//!
//! The loop itself lives in [`super::MergeBot`]; this module only holds the
//! configuration and the backoff sequence.

use std::time::Duration;

/// Default first wait between polls.
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_secs(1);

/// Default cap on the wait between polls.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(64);

/// Default total time a deferred merge waits for a green build.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30 * 60);

/// Configuration for status polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait after the first unsuccessful poll.
    pub initial_interval: Duration,

    /// Upper bound on any single wait.
    pub max_interval: Duration,

    /// No poll starts once this much time has passed since polling began.
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PollConfig {
    pub fn new() -> Self {
        PollConfig {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    /// Returns the sequence of waits between polls.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_interval.min(self.max_interval),
            max: self.max_interval,
        }
    }
}

/// Infinite doubling sequence of waits, capped at a maximum.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current.saturating_mul(2).min(self.max);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_sequence_doubles_to_cap() {
        let waits: Vec<u64> = PollConfig::new().backoff().take(10).map(|d| d.as_secs()).collect();
        assert_eq!(waits, vec![1, 2, 4, 8, 16, 32, 64, 64, 64, 64]);
    }

    #[test]
    fn cap_need_not_be_a_power_of_two() {
        let config = PollConfig {
            max_interval: Duration::from_secs(10),
            ..PollConfig::new()
        };
        let waits: Vec<u64> = config.backoff().take(6).map(|d| d.as_secs()).collect();
        assert_eq!(waits, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn defaults() {
        let config = PollConfig::default();
        assert_eq!(config.max_wait, Duration::from_secs(1800));
        assert_eq!(config.max_interval, Duration::from_secs(64));
    }

    proptest! {
        #[test]
        fn waits_never_exceed_cap_and_never_shrink(
            initial_ms in 1u64..10_000,
            cap_ms in 1u64..200_000,
            n in 1usize..64,
        ) {
            let config = PollConfig {
                initial_interval: Duration::from_millis(initial_ms),
                max_interval: Duration::from_millis(cap_ms),
                max_wait: DEFAULT_MAX_WAIT,
            };
            let waits: Vec<Duration> = config.backoff().take(n).collect();

            prop_assert!(waits.iter().all(|w| *w <= config.max_interval));
            prop_assert!(waits.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
