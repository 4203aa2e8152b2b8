//! ItemStore port - the document store that owns queued items.
//!
//! The store is the source of truth. Every state change the engine makes is a
//! single-document atomic "prepend a head status if the head matches" call, so
//! any number of workers, in any number of processes, can share one store.
//!
//! # Expected indexes
//! - (head status, head next_reevaluation): `HeadFilter::Eligible`
//! - (head status, head timestamp): `HeadFilter::StaleSince`
//!
//! Creating them is a bootstrap step (`ItemStore::bootstrap`), run once at
//! startup.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::domain::{ItemId, QueuedItem, Status, StatusKind};
use crate::error::StoreError;
use crate::observability::QueueCounts;

/// Which document a head transition may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadFilter {
    /// head = `status` AND (head.next_reevaluation is none OR <= `now`) [AND id = `id`]
    Eligible {
        status: StatusKind,
        now: DateTime<Utc>,
        id: Option<ItemId>,
    },

    /// head = `status` AND head.timestamp <= `before`
    StaleSince {
        status: StatusKind,
        before: DateTime<Utc>,
    },

    /// id = `id` AND head = `status` AND head.timestamp = `since`
    ///
    /// `since` is the lease start of one attempt, so a reclaimed and
    /// re-claimed item no longer matches the earlier attempt.
    Claimed {
        id: ItemId,
        status: StatusKind,
        since: DateTime<Utc>,
    },
}

impl HeadFilter {
    /// Evaluate the filter against an item.
    ///
    /// Stores that cannot push the filter down to a query language use this
    /// directly. An item without statuses matches nothing.
    pub fn matches<P>(&self, item: &QueuedItem<P>) -> bool {
        let Some(head) = item.statuses.first() else {
            return false;
        };
        match *self {
            HeadFilter::Eligible { status, now, id } => {
                head.kind == status && head.is_due(now) && id.is_none_or(|id| id == item.id)
            }
            HeadFilter::StaleSince { status, before } => {
                head.kind == status && head.timestamp <= before
            }
            HeadFilter::Claimed { id, status, since } => {
                item.id == id && head.kind == status && head.timestamp == since
            }
        }
    }

    /// Exact id this filter is pinned to, if any.
    pub fn item_id(&self) -> Option<ItemId> {
        match *self {
            HeadFilter::Eligible { id, .. } => id,
            HeadFilter::Claimed { id, .. } => Some(id),
            HeadFilter::StaleSince { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOperation {
    Insert,
}

/// One change-feed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: ChangeOperation,
    pub id: ItemId,
}

impl ChangeEvent {
    pub fn insert(id: ItemId) -> Self {
        Self {
            operation: ChangeOperation::Insert,
            id,
        }
    }
}

/// Push stream of change events. Ends or yields an error when the feed drops.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<ChangeEvent, StoreError>> + Send>>;

/// Document store holding the items of one queue.
#[async_trait]
pub trait ItemStore<P>: Send + Sync {
    /// One-time setup (indexes, collection options). Called at startup.
    async fn bootstrap(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Insert a new item. Fails with `StoreError::DuplicateId` when the id is
    /// taken and `StoreError::EmptyHistory` when `statuses` is empty.
    async fn insert_unique(&self, item: &QueuedItem<P>) -> Result<(), StoreError>;

    /// Atomically prepend `status` to at most one item matching `filter`.
    ///
    /// Returns the item as it was before the update, or `None` when nothing
    /// matched. Concurrent callers racing on the same item: exactly one wins.
    async fn transition_head(
        &self,
        filter: &HeadFilter,
        status: Status,
    ) -> Result<Option<QueuedItem<P>>, StoreError>;

    /// Remove an item entirely. Returns whether it existed.
    async fn delete(&self, id: ItemId) -> Result<bool, StoreError>;

    /// Atomically remove the item matching `filter`, if any.
    async fn delete_matching(&self, filter: &HeadFilter) -> Result<bool, StoreError>;

    async fn get(&self, id: ItemId) -> Result<Option<QueuedItem<P>>, StoreError>;

    /// Item counts by head status.
    async fn counts(&self) -> Result<QueueCounts, StoreError>;

    fn supports_change_feed(&self) -> bool {
        false
    }

    /// Subscribe to insert notifications.
    async fn watch_inserts(&self) -> Result<ChangeStream, StoreError> {
        Err(StoreError::FeedUnsupported)
    }
}
