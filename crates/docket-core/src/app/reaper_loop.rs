//! ReaperLoop - Lease 期限切れの回収
//!
//! # フロー
//! 1. `processing_timeout` より古い `Processing` の先頭を探す
//! 2. `Enqueued` を先頭に積み、メインループに戻す
//!
//! 回収された試行の遅れた結果は、lease 開始時刻が一致しないので捨てられる。

use std::sync::Arc;

use tokio::sync::watch;

use super::scheduler::drain_loop;
use crate::error::QueueError;
use crate::queue::Queue;

pub(crate) async fn run<P>(queue: Arc<Queue<P>>, shutdown: watch::Receiver<bool>)
where
    P: Clone + Send + Sync + 'static,
{
    let period = queue.options().orphaned_poll_interval;
    let name = queue.name().to_string();
    drain_loop("reaper", &name, period, shutdown, move || {
        let queue = Arc::clone(&queue);
        async move { Ok::<_, QueueError>(queue.enqueue_orphaned_processing().await?.is_some()) }
    })
    .await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::domain::{ItemId, QueuedItem, Status, StatusKind};
    use crate::impls::InMemoryItemStore;
    use crate::ports::ItemStore;
    use crate::queue::QueueOptions;

    #[tokio::test]
    async fn orphans_are_put_back() {
        let store = Arc::new(InMemoryItemStore::<String>::new());
        let queue = Arc::new(
            Queue::new(
                store.clone(),
                QueueOptions {
                    processing_timeout: Duration::from_secs(60),
                    orphaned_poll_interval: Duration::from_millis(10),
                    ..QueueOptions::default()
                },
            )
            .unwrap(),
        );
        let now = Utc::now();
        let orphans: Vec<ItemId> = ItemId::distinct_batch(&[
            ItemId::from_datetime(now),
            ItemId::from_datetime(now),
        ]);
        for id in &orphans {
            let item = QueuedItem::new(
                *id,
                Status::processing(now - chrono::Duration::minutes(5)),
                "stuck".to_string(),
            );
            store.insert_unique(&item).await.unwrap();
        }
        let busy = QueuedItem::new(
            ItemId::from_ticks(1),
            Status::processing(now),
            "busy".to_string(),
        );
        store.insert_unique(&busy).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run(Arc::clone(&queue), rx));

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if queue.counts().await.unwrap().enqueued == 2 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let still_busy = queue.get(busy.id).await.unwrap().unwrap();
        assert_eq!(still_busy.head_kind(), StatusKind::Processing);

        tx.send(true).unwrap();
        task.await.unwrap();
    }
}
