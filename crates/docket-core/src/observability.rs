use serde::{Deserialize, Serialize};

use crate::domain::StatusKind;

/// Item counts by head status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub enqueued: usize,
    pub processing: usize,
    pub processed: usize,
    pub failed: usize,
    pub finally_failed: usize,
}

impl QueueCounts {
    pub fn record(&mut self, kind: StatusKind) {
        match kind {
            StatusKind::Enqueued => self.enqueued += 1,
            StatusKind::Processing => self.processing += 1,
            StatusKind::Processed => self.processed += 1,
            StatusKind::Failed => self.failed += 1,
            StatusKind::FinallyFailed => self.finally_failed += 1,
        }
    }

    /// Items that still have work ahead of them.
    pub fn pending(&self) -> usize {
        self.enqueued + self.processing + self.failed
    }

    pub fn total(&self) -> usize {
        self.pending() + self.processed + self.finally_failed
    }
}
