//! WorkerLoop - メインループと change feed タスク
//!
//! # フロー
//! 1. `Queue::dequeue` が期限の来た最古の `Enqueued` を claim
//! 2. ハンドラ実行後、エンジンが Processed / Failed / FinallyFailed を記録
//! 3. 取れたら即次へ、取れなければ `poll_interval` 待機
//!
//! push 有効時は `run_feed` が挿入イベントの id で直接 dequeue する。
//! feed が落ちても poll 側が拾う。

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::scheduler::{drain_loop, stopped, wait_or_stop};
use crate::error::QueueError;
use crate::ports::ChangeOperation;
use crate::queue::Queue;
use crate::typed::Handler;

pub(crate) async fn run<P>(
    queue: Arc<Queue<P>>,
    handler: Arc<dyn Handler<P>>,
    shutdown: watch::Receiver<bool>,
) where
    P: Clone + Send + Sync + 'static,
{
    let period = queue.options().poll_interval;
    let name = queue.name().to_string();
    drain_loop("main", &name, period, shutdown, move || {
        let queue = Arc::clone(&queue);
        let handler = Arc::clone(&handler);
        async move { Ok::<_, QueueError>(queue.dequeue(None, &*handler).await?.is_some()) }
    })
    .await;
}

/// Subscribe to the change feed and dequeue inserted items, resubscribing
/// after `feed_retry_delay` whenever the feed fails or ends.
pub(crate) async fn run_feed<P>(
    queue: Arc<Queue<P>>,
    handler: Arc<dyn Handler<P>>,
    mut shutdown: watch::Receiver<bool>,
) where
    P: Clone + Send + Sync + 'static,
{
    let retry_delay = queue.options().feed_retry_delay;
    info!(queue = %queue.name(), task = "feed", "loop started");

    'subscribe: loop {
        if *shutdown.borrow() {
            break;
        }
        match queue.store().watch_inserts().await {
            Ok(mut feed) => loop {
                let next = tokio::select! {
                    _ = stopped(&mut shutdown) => break 'subscribe,
                    next = feed.next() => next,
                };
                match next {
                    Some(Ok(event)) => match event.operation {
                        ChangeOperation::Insert => {
                            match queue.dequeue(Some(event.id), &*handler).await {
                                Ok(Some(_)) => {}
                                // a poll loop got there first
                                Ok(None) => {
                                    debug!(queue = %queue.name(), item_id = %event.id, "inserted item already taken")
                                }
                                Err(err) => {
                                    warn!(queue = %queue.name(), item_id = %event.id, error = %err, "push dequeue failed")
                                }
                            }
                        }
                    },
                    Some(Err(err)) => {
                        error!(queue = %queue.name(), error = %err, "change feed failed, resubscribing");
                        break;
                    }
                    None => {
                        warn!(queue = %queue.name(), "change feed ended, resubscribing");
                        break;
                    }
                }
            },
            Err(err) => {
                error!(queue = %queue.name(), error = %err, "change feed subscription failed");
            }
        }
        if wait_or_stop(retry_delay, &mut shutdown).await {
            break;
        }
    }
    info!(queue = %queue.name(), task = "feed", "loop stopped");
}
