//! RetryLoop - 再試行期限の来た `Failed` の回収

use std::sync::Arc;

use tokio::sync::watch;

use super::scheduler::drain_loop;
use crate::error::QueueError;
use crate::queue::Queue;
use crate::typed::Handler;

pub(crate) async fn run<P>(
    queue: Arc<Queue<P>>,
    handler: Arc<dyn Handler<P>>,
    shutdown: watch::Receiver<bool>,
) where
    P: Clone + Send + Sync + 'static,
{
    let period = queue.options().failed_poll_interval;
    let name = queue.name().to_string();
    drain_loop("retry", &name, period, shutdown, move || {
        let queue = Arc::clone(&queue);
        let handler = Arc::clone(&handler);
        async move { Ok::<_, QueueError>(queue.dequeue_failed(&*handler).await?.is_some()) }
    })
    .await;
}
