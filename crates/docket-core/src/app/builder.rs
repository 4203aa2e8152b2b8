//! AppBuilder - ストア・オプション・ハンドラのワイヤリング
//!
//! # 学習ポイント
//! - Builder パターン（`register` は `Result` を返す）
//! - 起動時検証（Fail-fast）: オプション検証、`expect_tasks()` のハンドラ有無
//! - ストアの bootstrap はループ起動前に一度だけ

use std::sync::Arc;

use super::producer::GenericQueue;
use super::scheduler::{Scheduler, SchedulerHandle};
use crate::domain::Envelope;
use crate::error::QueueError;
use crate::ports::{Clock, ItemStore, SystemClock};
use crate::queue::{Queue, QueueOptions};
use crate::typed::{Handler, RegistryError, Task, TypedRegistry};

/// Builds the generic (envelope) queue.
///
/// ```ignore
/// let app = AppBuilder::new(store)
///     .options(options)
///     .register::<SendInvoice, _>(SendInvoiceHandler)?
///     .expect_tasks(&["billing.send_invoice.v1"])
///     .build()
///     .await?;
/// let scheduler = app.start();
/// app.producer().enqueue(&SendInvoice { invoice_id: 7 }, None).await?;
/// ```
pub struct AppBuilder {
    store: Arc<dyn ItemStore<Envelope>>,
    options: QueueOptions,
    clock: Arc<dyn Clock>,
    registry: TypedRegistry,
    expected_tasks: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<String>),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl AppBuilder {
    pub fn new(store: Arc<dyn ItemStore<Envelope>>) -> Self {
        Self {
            store,
            options: QueueOptions::default(),
            clock: Arc::new(SystemClock),
            registry: TypedRegistry::new(),
            expected_tasks: None,
        }
    }

    pub fn options(mut self, options: QueueOptions) -> Self {
        self.options = options;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn expect_tasks(mut self, task_types: &[&str]) -> Self {
        self.expected_tasks = Some(task_types.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Check the wiring, bootstrap the store and produce the `App`.
    pub async fn build(self) -> Result<App, BuildError> {
        if let Some(expected_tasks) = &self.expected_tasks {
            let registered_types = self.registry.registered_types();
            let missing_tasks: Vec<String> = expected_tasks
                .iter()
                .filter(|x| !registered_types.contains(x))
                .cloned()
                .collect();
            if !missing_tasks.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing_tasks));
            }
        }

        let queue = Queue::with_clock(self.store, self.options, self.clock)?;
        queue.bootstrap().await?;

        Ok(App {
            queue: Arc::new(queue),
            registry: Arc::new(self.registry),
        })
    }
}

/// A built generic queue: producer side plus the handlers for its loops.
pub struct App {
    queue: Arc<Queue<Envelope>>,
    registry: Arc<TypedRegistry>,
}

impl App {
    pub fn producer(&self) -> GenericQueue {
        GenericQueue::new(Arc::clone(&self.queue))
    }

    pub fn queue(&self) -> &Arc<Queue<Envelope>> {
        &self.queue
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.registry.registered_types()
    }

    /// Spawn the queue loops, dispatching through the registry.
    pub fn start(&self) -> SchedulerHandle {
        let handler: Arc<dyn Handler<Envelope>> = self.registry.clone();
        Scheduler::new(Arc::clone(&self.queue), handler).spawn()
    }
}
