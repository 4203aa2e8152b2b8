//! Scheduler - runs the queue loops of one queue.
//!
//! # Loops
//! - main loop: `dequeue` at `poll_interval` ([`super::worker_loop`])
//! - retry loop: `dequeue_failed` at `failed_poll_interval` ([`super::retry_loop`])
//! - reaper loop: `enqueue_orphaned_processing` at `orphaned_poll_interval`
//!   ([`super::reaper_loop`])
//! - feed task (`WakeStrategy::PollAndFeed` only): dequeues inserted items as
//!   the store announces them
//!
//! Each loop is its own tokio task. They share one `watch` shutdown signal and
//! nothing else; a failing iteration is logged and the loop carries on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{reaper_loop, retry_loop, worker_loop};
use crate::error::QueueError;
use crate::queue::{Queue, QueueOptions};
use crate::typed::Handler;

/// How the main loop learns about new items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeStrategy {
    /// Poll only.
    Poll,
    /// Poll, plus dequeue inserted items straight from the change feed.
    PollAndFeed,
}

impl WakeStrategy {
    pub fn from_options(options: &QueueOptions) -> Self {
        if options.use_push_notification {
            WakeStrategy::PollAndFeed
        } else {
            WakeStrategy::Poll
        }
    }
}

pub struct Scheduler<P> {
    queue: Arc<Queue<P>>,
    handler: Arc<dyn Handler<P>>,
    strategy: WakeStrategy,
}

impl<P> Scheduler<P>
where
    P: Clone + Send + Sync + 'static,
{
    /// Strategy follows `use_push_notification` of the queue options.
    pub fn new(queue: Arc<Queue<P>>, handler: Arc<dyn Handler<P>>) -> Self {
        let strategy = WakeStrategy::from_options(queue.options());
        Self {
            queue,
            handler,
            strategy,
        }
    }

    pub fn strategy(&self) -> WakeStrategy {
        self.strategy
    }

    /// Spawn every loop of the queue.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut joins = Vec::with_capacity(4);

        joins.push(tokio::spawn(worker_loop::run(
            Arc::clone(&self.queue),
            Arc::clone(&self.handler),
            shutdown_rx.clone(),
        )));
        joins.push(tokio::spawn(retry_loop::run(
            Arc::clone(&self.queue),
            Arc::clone(&self.handler),
            shutdown_rx.clone(),
        )));
        joins.push(tokio::spawn(reaper_loop::run(
            Arc::clone(&self.queue),
            shutdown_rx.clone(),
        )));
        if self.strategy == WakeStrategy::PollAndFeed {
            joins.push(tokio::spawn(worker_loop::run_feed(
                Arc::clone(&self.queue),
                Arc::clone(&self.handler),
                shutdown_rx,
            )));
        }

        info!(queue = %self.queue.name(), strategy = ?self.strategy, "scheduler started");
        SchedulerHandle { shutdown_tx, joins }
    }
}

/// Handle of a running scheduler.
/// - dropping it (or `request_shutdown`) stops every loop
/// - `shutdown_and_join` waits for them
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Ask every loop to stop. In-flight handlers are not cancelled; loops
    /// stop taking new items.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                error!(error = %err, "queue loop task ended abnormally");
            }
        }
    }
}

/// Resolves once shutdown is requested or the handle is gone.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // Err means the sender was dropped, which also means stop
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Sleep for `period`. Returns `true` if shutdown came first.
pub(crate) async fn wait_or_stop(period: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(period) => false,
        _ = stopped(shutdown) => true,
    }
}

/// Run `step` until shutdown.
///
/// `step` returns whether it found work. While it does, the loop goes again
/// right away; otherwise it waits `period`. Errors are logged and treated as
/// "nothing found".
pub(crate) async fn drain_loop<F, Fut>(
    task: &'static str,
    queue: &str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut step: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, QueueError>>,
{
    info!(queue, task, "loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        match step().await {
            Ok(true) => {
                tokio::task::yield_now().await;
                continue;
            }
            Ok(false) => {}
            Err(err) => warn!(queue, task, error = %err, "loop iteration failed"),
        }
        if wait_or_stop(period, &mut shutdown).await {
            break;
        }
    }
    info!(queue, task, "loop stopped");
}
