//! Queue engine: enqueue, dequeue, failed retry and orphan reclaim.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tracing::{debug, info, warn};

use super::{QueueOptions, RetryDecision, RetryPolicy};
use crate::domain::{ItemId, QueuedItem, Status, StatusKind};
use crate::error::{HandlerError, QueueError, StoreError};
use crate::observability::QueueCounts;
use crate::ports::{Clock, HeadFilter, ItemStore, SystemClock};
use crate::typed::Handler;

/// Attempts at finding a free disambiguation counter before giving up.
pub const MAX_UNIQUE_ID_ATTEMPTS: u32 = 1000;

/// One queue over one item collection.
///
/// Design intent:
/// - The store decides who wins a claim (`transition_head`); the engine keeps
///   no state of its own, so any number of engines may share a store.
/// - Handler failures become status transitions. Store failures are returned
///   to the caller (a scheduler loop), which logs them and carries on.
pub struct Queue<P> {
    store: Arc<dyn ItemStore<P>>,
    clock: Arc<dyn Clock>,
    options: QueueOptions,
    retry_policy: RetryPolicy,
    processing_timeout: chrono::Duration,
}

impl<P> Queue<P>
where
    P: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn ItemStore<P>>, options: QueueOptions) -> Result<Self, QueueError> {
        Self::with_clock(store, options, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn ItemStore<P>>,
        options: QueueOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, QueueError> {
        options.validate()?;
        if options.use_push_notification && !store.supports_change_feed() {
            return Err(QueueError::InvalidOptions(
                "use_push_notification requires a store with a change feed".into(),
            ));
        }
        let processing_timeout = chrono::Duration::from_std(options.processing_timeout)
            .map_err(|e| QueueError::InvalidOptions(format!("processing_timeout: {e}")))?;
        Ok(Self {
            retry_policy: RetryPolicy::from_options(&options),
            store,
            clock,
            options,
            processing_timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.options.collection
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn ItemStore<P>> {
        &self.store
    }

    /// One-time store setup; run before the loops start.
    pub async fn bootstrap(&self) -> Result<(), QueueError> {
        self.store.bootstrap().await?;
        info!(queue = %self.name(), "store bootstrapped");
        Ok(())
    }

    /// Add a payload to the queue.
    ///
    /// The id comes from the current time; on collision the next counter is
    /// tried, up to `MAX_UNIQUE_ID_ATTEMPTS` times.
    pub async fn enqueue(
        &self,
        payload: P,
        next_reevaluation: Option<DateTime<Utc>>,
    ) -> Result<QueuedItem<P>, QueueError> {
        let now = self.clock.now();
        let base = ItemId::from_datetime(now);
        let mut item = QueuedItem::new(base, Status::enqueued(now, next_reevaluation), payload);

        for counter in 0..MAX_UNIQUE_ID_ATTEMPTS {
            item.id = ItemId::with_counter(base, counter);
            match self.store.insert_unique(&item).await {
                Ok(()) => {
                    debug!(queue = %self.name(), item_id = %item.id, "enqueued");
                    return Ok(item);
                }
                Err(StoreError::DuplicateId(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(QueueError::IdSpaceExhausted {
            base,
            attempts: MAX_UNIQUE_ID_ATTEMPTS,
        })
    }

    /// Claim one due `Enqueued` item (or exactly `item_id`), run `handler`
    /// on it and record the result.
    ///
    /// Returns the item as it was before the claim, or `None` when nothing
    /// was due.
    pub async fn dequeue(
        &self,
        item_id: Option<ItemId>,
        handler: &dyn Handler<P>,
    ) -> Result<Option<QueuedItem<P>>, QueueError> {
        self.claim_and_process(StatusKind::Enqueued, item_id, handler)
            .await
    }

    /// Same as `dequeue`, for items whose retry is due.
    pub async fn dequeue_failed(
        &self,
        handler: &dyn Handler<P>,
    ) -> Result<Option<QueuedItem<P>>, QueueError> {
        self.claim_and_process(StatusKind::Failed, None, handler)
            .await
    }

    /// Put one item whose lease expired back to `Enqueued`.
    pub async fn enqueue_orphaned_processing(&self) -> Result<Option<QueuedItem<P>>, QueueError> {
        let now = self.clock.now();
        // a timeout reaching past the calendar start never expires
        let before = now
            .checked_sub_signed(self.processing_timeout)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let filter = HeadFilter::StaleSince {
            status: StatusKind::Processing,
            before,
        };
        let reclaimed = self
            .store
            .transition_head(&filter, Status::enqueued(now, None))
            .await?;
        if let Some(item) = &reclaimed {
            warn!(
                queue = %self.name(),
                item_id = %item.id,
                lease_started = %item.head().timestamp,
                "reclaimed orphaned item"
            );
        }
        Ok(reclaimed)
    }

    pub async fn get(&self, id: ItemId) -> Result<Option<QueuedItem<P>>, QueueError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn counts(&self) -> Result<QueueCounts, QueueError> {
        Ok(self.store.counts().await?)
    }

    async fn claim_and_process(
        &self,
        source: StatusKind,
        item_id: Option<ItemId>,
        handler: &dyn Handler<P>,
    ) -> Result<Option<QueuedItem<P>>, QueueError> {
        let claimed_at = self.clock.now();
        let filter = HeadFilter::Eligible {
            status: source,
            now: claimed_at,
            id: item_id,
        };
        let Some(item) = self
            .store
            .transition_head(&filter, Status::processing(claimed_at))
            .await?
        else {
            return Ok(None);
        };
        debug!(queue = %self.name(), item_id = %item.id, from = %source, "claimed");

        let outcome = AssertUnwindSafe(handler.handle(item.payload.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(HandlerError::new("handler panicked").with_detail(panic_message(&*panic)))
            });

        match outcome {
            Ok(()) => self.complete(&item, claimed_at).await?,
            Err(err) => self.fail(&item, claimed_at, &err).await?,
        }
        Ok(Some(item))
    }

    async fn complete(
        &self,
        item: &QueuedItem<P>,
        attempt_started_at: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        if self.options.delete_on_success {
            let lease = lease_filter(item.id, attempt_started_at);
            if self.store.delete_matching(&lease).await? {
                debug!(queue = %self.name(), item_id = %item.id, "processed, deleted");
            } else {
                warn!(queue = %self.name(), item_id = %item.id, "lease lost before the item was deleted");
            }
            return Ok(());
        }
        self.finalize(
            item.id,
            attempt_started_at,
            Status::processed(self.clock.now()),
        )
        .await
    }

    /// Record a failed attempt.
    ///
    /// `attempt_started_at` is the timestamp of the `Processing` status this
    /// attempt prepended; the retry delay counts from there.
    async fn fail(
        &self,
        item: &QueuedItem<P>,
        attempt_started_at: DateTime<Utc>,
        err: &HandlerError,
    ) -> Result<(), QueueError> {
        let failed_count = item.failed_count();
        let now = self.clock.now();
        let mut status = match self.retry_policy.decide(failed_count, attempt_started_at) {
            RetryDecision::RetryAt(at) => {
                warn!(
                    queue = %self.name(),
                    item_id = %item.id,
                    failed_count,
                    retry_at = %at,
                    error = %err,
                    "handler failed, retry scheduled"
                );
                Status::failed(now, at)
            }
            RetryDecision::GiveUp => {
                warn!(
                    queue = %self.name(),
                    item_id = %item.id,
                    failed_count,
                    error = %err,
                    "handler failed, retries exhausted"
                );
                Status::finally_failed(now)
            }
        };
        if self.options.persist_failure_detail {
            status = status.with_failure_detail(err.to_failure_detail());
        }
        self.finalize(item.id, attempt_started_at, status).await
    }

    /// Prepend a terminal/retry status, provided this attempt still holds
    /// the lease.
    async fn finalize(
        &self,
        id: ItemId,
        attempt_started_at: DateTime<Utc>,
        status: Status,
    ) -> Result<(), QueueError> {
        let filter = lease_filter(id, attempt_started_at);
        let kind = status.kind;
        if self.store.transition_head(&filter, status).await?.is_none() {
            warn!(
                queue = %self.name(),
                item_id = %id,
                status = %kind,
                "lease lost before the result was recorded"
            );
        }
        Ok(())
    }
}

/// The `Processing` head one attempt prepended.
fn lease_filter(id: ItemId, attempt_started_at: DateTime<Utc>) -> HeadFilter {
    HeadFilter::Claimed {
        id,
        status: StatusKind::Processing,
        since: attempt_started_at,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        String::new()
    }
}
