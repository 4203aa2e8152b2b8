//! InMemoryItemStore - reference `ItemStore` for tests and demos.
//!
//! # Implementation notes
//! - `BTreeMap<ItemId, QueuedItem<P>>`: scans run in id order, so older items
//!   are picked first, like an id-indexed document collection.
//! - One `tokio::sync::Mutex` makes every primitive atomic. No lock is held
//!   across anything but map access.
//! - Inserts are published on a `broadcast` channel that backs the change feed.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

use crate::domain::{ItemId, QueuedItem, Status};
use crate::error::StoreError;
use crate::observability::QueueCounts;
use crate::ports::{ChangeEvent, ChangeStream, HeadFilter, ItemStore};

const FEED_CAPACITY: usize = 1024;

pub struct InMemoryItemStore<P> {
    items: Mutex<BTreeMap<ItemId, QueuedItem<P>>>,
    feed: broadcast::Sender<ChangeEvent>,
}

impl<P> InMemoryItemStore<P> {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            items: Mutex::new(BTreeMap::new()),
            feed,
        }
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

impl<P> Default for InMemoryItemStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P> ItemStore<P> for InMemoryItemStore<P>
where
    P: Clone + Send + Sync + 'static,
{
    async fn insert_unique(&self, item: &QueuedItem<P>) -> Result<(), StoreError> {
        if item.statuses.is_empty() {
            return Err(StoreError::EmptyHistory(item.id));
        }
        {
            let mut items = self.items.lock().await;
            if items.contains_key(&item.id) {
                return Err(StoreError::DuplicateId(item.id));
            }
            items.insert(item.id, item.clone());
        }
        // no subscribers is fine
        let _ = self.feed.send(ChangeEvent::insert(item.id));
        Ok(())
    }

    async fn transition_head(
        &self,
        filter: &HeadFilter,
        status: Status,
    ) -> Result<Option<QueuedItem<P>>, StoreError> {
        let mut items = self.items.lock().await;
        let found = match filter.item_id() {
            Some(id) => items.get_mut(&id).filter(|item| filter.matches(&**item)),
            None => items.values_mut().find(|item| filter.matches(&**item)),
        };
        let Some(item) = found else {
            return Ok(None);
        };

        let before = item.clone();
        debug!(item_id = %item.id, from = %item.head_kind(), to = %status.kind, "head transition");
        item.push_status(status);
        Ok(Some(before))
    }

    async fn delete(&self, id: ItemId) -> Result<bool, StoreError> {
        Ok(self.items.lock().await.remove(&id).is_some())
    }

    async fn delete_matching(&self, filter: &HeadFilter) -> Result<bool, StoreError> {
        let mut items = self.items.lock().await;
        let found = match filter.item_id() {
            Some(id) => items.get(&id).filter(|item| filter.matches(*item)).map(|item| item.id),
            None => items.values().find(|item| filter.matches(*item)).map(|item| item.id),
        };
        Ok(found.is_some_and(|id| items.remove(&id).is_some()))
    }

    async fn get(&self, id: ItemId) -> Result<Option<QueuedItem<P>>, StoreError> {
        Ok(self.items.lock().await.get(&id).cloned())
    }

    async fn counts(&self) -> Result<QueueCounts, StoreError> {
        let items = self.items.lock().await;
        let mut counts = QueueCounts::default();
        for item in items.values() {
            counts.record(item.head_kind());
        }
        Ok(counts)
    }

    fn supports_change_feed(&self) -> bool {
        true
    }

    async fn watch_inserts(&self) -> Result<ChangeStream, StoreError> {
        let stream = BroadcastStream::new(self.feed.subscribe()).map(|event| {
            event.map_err(|err| match err {
                BroadcastStreamRecvError::Lagged(n) => StoreError::FeedLagged(n),
            })
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::StatusKind;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn enqueued(ticks: u64) -> QueuedItem<String> {
        QueuedItem::new(
            ItemId::from_ticks(ticks),
            Status::enqueued(t0(), None),
            format!("payload-{ticks}"),
        )
    }

    fn claim_any() -> HeadFilter {
        HeadFilter::Eligible {
            status: StatusKind::Enqueued,
            now: t0(),
            id: None,
        }
    }

    #[tokio::test]
    async fn insert_then_get_roundtrips() {
        let store = InMemoryItemStore::new();
        let mut item = enqueued(1);
        item.push_status(Status::processing(t0()));
        store.insert_unique(&item).await.unwrap();

        let back = store.get(item.id).await.unwrap().unwrap();
        assert_eq!(back, item);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemoryItemStore::new();
        store.insert_unique(&enqueued(1)).await.unwrap();
        let err = store.insert_unique(&enqueued(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == ItemId::from_ticks(1)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn transition_returns_pre_update_document() {
        let store = InMemoryItemStore::new();
        store.insert_unique(&enqueued(1)).await.unwrap();

        let before = store
            .transition_head(&claim_any(), Status::processing(t0()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.head_kind(), StatusKind::Enqueued);
        assert_eq!(before.statuses.len(), 1);

        let after = store.get(before.id).await.unwrap().unwrap();
        assert_eq!(after.head_kind(), StatusKind::Processing);
        assert_eq!(after.statuses.len(), 2);
    }

    #[tokio::test]
    async fn transition_picks_lowest_id_first() {
        let store = InMemoryItemStore::new();
        store.insert_unique(&enqueued(20)).await.unwrap();
        store.insert_unique(&enqueued(10)).await.unwrap();

        let first = store
            .transition_head(&claim_any(), Status::processing(t0()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id, ItemId::from_ticks(10));
    }

    #[tokio::test]
    async fn transition_without_match_is_none() {
        let store = InMemoryItemStore::new();
        let future = QueuedItem::new(
            ItemId::from_ticks(1),
            Status::enqueued(t0(), Some(t0() + Duration::hours(1))),
            "later".to_string(),
        );
        store.insert_unique(&future).await.unwrap();

        let res = store
            .transition_head(&claim_any(), Status::processing(t0()))
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_transitions_have_one_winner() {
        let store = Arc::new(InMemoryItemStore::new());
        let item = enqueued(1);
        store.insert_unique(&item).await.unwrap();

        let filter = HeadFilter::Eligible {
            status: StatusKind::Enqueued,
            now: t0(),
            id: Some(item.id),
        };
        let mut joins = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            joins.push(tokio::spawn(async move {
                store
                    .transition_head(&filter, Status::processing(t0()))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for j in joins {
            if j.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn delete_removes_item() {
        let store = InMemoryItemStore::new();
        store.insert_unique(&enqueued(1)).await.unwrap();
        assert!(store.delete(ItemId::from_ticks(1)).await.unwrap());
        assert!(!store.delete(ItemId::from_ticks(1)).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_matching_respects_the_lease() {
        let store = InMemoryItemStore::new();
        let mut item = enqueued(1);
        item.push_status(Status::processing(t0()));
        store.insert_unique(&item).await.unwrap();

        let stale = HeadFilter::Claimed {
            id: item.id,
            status: StatusKind::Processing,
            since: t0() - Duration::minutes(1),
        };
        assert!(!store.delete_matching(&stale).await.unwrap());
        assert_eq!(store.len().await, 1);

        let current = HeadFilter::Claimed {
            id: item.id,
            status: StatusKind::Processing,
            since: t0(),
        };
        assert!(store.delete_matching(&current).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn empty_history_is_rejected_on_insert() {
        let store = InMemoryItemStore::new();
        let broken = QueuedItem {
            id: ItemId::from_ticks(9),
            statuses: vec![],
            payload: "broken".to_string(),
        };

        let err = store.insert_unique(&broken).await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyHistory(id) if id == broken.id));
        assert!(store.is_empty().await);

        // scans keep working
        let filter = HeadFilter::StaleSince {
            status: StatusKind::Processing,
            before: t0(),
        };
        assert!(
            store
                .transition_head(&filter, Status::enqueued(t0(), None))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn counts_by_head_status() {
        let store = InMemoryItemStore::new();
        store.insert_unique(&enqueued(1)).await.unwrap();
        store.insert_unique(&enqueued(2)).await.unwrap();
        store
            .transition_head(&claim_any(), Status::processing(t0()))
            .await
            .unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.enqueued, 1);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn change_feed_reports_inserts() {
        let store = InMemoryItemStore::new();
        let mut feed = store.watch_inserts().await.unwrap();

        store.insert_unique(&enqueued(7)).await.unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), feed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(event, ChangeEvent::insert(ItemId::from_ticks(7)));
    }
}
