//! Fixed retry schedule for canary pings.

use std::time::Duration;

/// Default waits before each attempt, in milliseconds.
pub const DEFAULT_BACKOFF_MS: [u64; 6] = [0, 250, 500, 1_000, 2_000, 4_000];

/// Ordered waits applied before each delivery attempt.
///
/// The schedule is literal data rather than a formula: entry `i` is slept
/// before attempt `i`, and its length bounds the number of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl BackoffSchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Build a schedule from millisecond values.
    pub fn from_millis(delays: &[u64]) -> Self {
        Self::new(delays.iter().copied().map(Duration::from_millis).collect())
    }

    /// Number of attempts this schedule allows.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Waits in attempt order.
    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.delays.iter().copied()
    }

    /// Sum of all waits, ignoring request time.
    pub fn total_wait(&self) -> Duration {
        self.delays.iter().sum()
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::from_millis(&DEFAULT_BACKOFF_MS)
    }
}
