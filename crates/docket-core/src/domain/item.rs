//! Queued item: id + status history + payload.

use serde::{Deserialize, Serialize};

use super::{ItemId, Status, StatusKind};

/// The persisted document.
///
/// Design:
/// - `statuses` is newest first and never empty; `statuses[0]` is the head.
/// - New statuses are prepended. History is only dropped with the whole item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedItem<P> {
    pub id: ItemId,
    pub statuses: Vec<Status>,
    pub payload: P,
}

impl<P> QueuedItem<P> {
    pub fn new(id: ItemId, initial: Status, payload: P) -> Self {
        Self {
            id,
            statuses: vec![initial],
            payload,
        }
    }

    /// Current authoritative status.
    pub fn head(&self) -> &Status {
        // never empty: constructors seed one entry, stores reject empty histories
        &self.statuses[0]
    }

    pub fn head_kind(&self) -> StatusKind {
        self.head().kind
    }

    /// Prepend a new head status.
    pub fn push_status(&mut self, status: Status) {
        self.statuses.insert(0, status);
    }

    /// Number of `Failed` entries in the history.
    pub fn failed_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| s.kind == StatusKind::Failed)
            .count()
    }
}
