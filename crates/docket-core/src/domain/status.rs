//! Item status entries and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a status entry.
///
/// State transitions:
/// - Enqueued -> Processing -> Processed (or deleted when `delete_on_success`)
/// - Enqueued -> Processing -> Failed -> Processing -> ... (retry table)
/// - Enqueued -> Processing -> FinallyFailed (retry table exhausted)
/// - Processing -> Enqueued (lease expired, orphan reclaim)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Waiting to be picked up (possibly not before `next_reevaluation`).
    Enqueued,

    /// Claimed by a worker. The status timestamp is the lease start.
    Processing,

    /// Handler succeeded.
    Processed,

    /// Handler failed, a retry is scheduled.
    Failed,

    /// Handler failed and the retry table is exhausted.
    FinallyFailed,
}

impl StatusKind {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, StatusKind::Processed | StatusKind::FinallyFailed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Enqueued => "Enqueued",
            StatusKind::Processing => "Processing",
            StatusKind::Processed => "Processed",
            StatusKind::Failed => "Failed",
            StatusKind::FinallyFailed => "FinallyFailed",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error captured from a failed handler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub message: String,

    /// Source chain or panic payload; empty when nothing beyond the message is known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stack: String,
}

/// One entry of an item's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusKind,
    pub timestamp: DateTime<Utc>,

    /// Earliest instant the item may be picked up. `None` means right away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_reevaluation: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<FailureDetail>,
}

impl Status {
    fn at(kind: StatusKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            timestamp,
            next_reevaluation: None,
            failure_detail: None,
        }
    }

    pub fn enqueued(timestamp: DateTime<Utc>, next_reevaluation: Option<DateTime<Utc>>) -> Self {
        Self {
            next_reevaluation,
            ..Self::at(StatusKind::Enqueued, timestamp)
        }
    }

    pub fn processing(timestamp: DateTime<Utc>) -> Self {
        Self::at(StatusKind::Processing, timestamp)
    }

    pub fn processed(timestamp: DateTime<Utc>) -> Self {
        Self::at(StatusKind::Processed, timestamp)
    }

    pub fn failed(timestamp: DateTime<Utc>, next_reevaluation: DateTime<Utc>) -> Self {
        Self {
            next_reevaluation: Some(next_reevaluation),
            ..Self::at(StatusKind::Failed, timestamp)
        }
    }

    pub fn finally_failed(timestamp: DateTime<Utc>) -> Self {
        Self::at(StatusKind::FinallyFailed, timestamp)
    }

    pub fn with_failure_detail(mut self, detail: FailureDetail) -> Self {
        self.failure_detail = Some(detail);
        self
    }

    /// May the item be picked up at `now`?
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_reevaluation.is_none_or(|at| at <= now)
    }
}
