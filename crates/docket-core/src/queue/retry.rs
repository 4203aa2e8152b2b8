//! Retry policy: decides backoff delays.

use chrono::{DateTime, Utc};

use super::QueueOptions;

/// What to do with an item whose handler just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Mark `Failed`, eligible again from this instant.
    RetryAt(DateTime<Utc>),

    /// Mark `FinallyFailed`.
    GiveUp,
}

/// Table-driven retry policy.
///
/// Entry `n` of the table is the delay (seconds) after the item's `n`-th
/// failure, counting from zero. Once an item has failed as many times as the
/// table has entries, the next failure is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    intervals: Vec<u64>,
}

impl RetryPolicy {
    pub fn new(intervals: impl Into<Vec<u64>>) -> Self {
        Self {
            intervals: intervals.into(),
        }
    }

    pub fn from_options(options: &QueueOptions) -> Self {
        Self::new(options.retry_intervals.clone())
    }

    /// Number of `Failed` statuses an item may collect before giving up.
    pub fn max_failures(&self) -> usize {
        self.intervals.len()
    }

    /// Decide the next step after a failed attempt.
    ///
    /// # Arguments
    /// * `failed_count` - `Failed` entries already in the item's history.
    /// * `attempt_started_at` - timestamp of the `Processing` status of the
    ///   attempt that failed.
    ///
    /// The delay is counted from the attempt start, not from the moment the
    /// failure is recorded, so a slow handler does not push retries out.
    /// The `Failed` status itself is stamped when it is recorded: a handler
    /// that runs longer than the interval leaves a `next_reevaluation`
    /// earlier than that status's timestamp, and the item is due at once.
    pub fn decide(&self, failed_count: usize, attempt_started_at: DateTime<Utc>) -> RetryDecision {
        let Some(&secs) = self.intervals.get(failed_count) else {
            return RetryDecision::GiveUp;
        };
        let at = i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|delay| attempt_started_at.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        RetryDecision::RetryAt(at)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_options(&QueueOptions::default())
    }
}
