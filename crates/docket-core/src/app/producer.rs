//! GenericQueue - typed producer side of the envelope queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{Envelope, QueuedItem};
use crate::error::QueueError;
use crate::observability::QueueCounts;
use crate::queue::Queue;
use crate::typed::Task;

/// Enqueues any `Task`; the registry on the consumer side picks the handler
/// by `Task::TYPE`.
#[derive(Clone)]
pub struct GenericQueue {
    queue: Arc<Queue<Envelope>>,
}

impl GenericQueue {
    pub fn new(queue: Arc<Queue<Envelope>>) -> Self {
        Self { queue }
    }

    pub async fn enqueue<T: Task>(
        &self,
        task: &T,
        next_reevaluation: Option<DateTime<Utc>>,
    ) -> Result<QueuedItem<Envelope>, QueueError> {
        let envelope = task.to_envelope().map_err(QueueError::Encode)?;
        self.queue.enqueue(envelope, next_reevaluation).await
    }

    pub async fn counts(&self) -> Result<QueueCounts, QueueError> {
        self.queue.counts().await
    }
}
