//! Handler traits.
//!
//! - `Handler<T>`: processes one payload; what the engine calls.
//! - `DynHandler`: object-safe, takes the raw JSON payload.
//! - `TypedHandler<T, H>`: type erasure from `Handler<T>` to `DynHandler`.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::task::Task;
use crate::error::HandlerError;

/// Processes a dequeued payload.
///
/// `Ok(())` marks the item processed; `Err` schedules a retry (or gives up,
/// see `RetryPolicy`). The same payload may be handled more than once.
#[async_trait]
pub trait Handler<T: Send + 'static>: Send + Sync {
    async fn handle(&self, payload: T) -> Result<(), HandlerError>;
}

/// Object-safe handler over raw JSON, stored in `TypedRegistry`.
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, payload: serde_json::Value) -> Result<(), HandlerError>;
    fn task_type(&self) -> &str;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn(T)>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, payload: serde_json::Value) -> Result<(), HandlerError> {
        let task: T = serde_json::from_value(payload)?;
        self.handler.handle(task).await
    }

    fn task_type(&self) -> &str {
        T::TYPE
    }
}

/// Handler backed by an async closure.
pub struct FnHandler<F>(F);

/// Wrap `Fn(T) -> impl Future<Output = Result<(), HandlerError>>` as a handler.
pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler(f)
}

#[async_trait]
impl<T, F, Fut> Handler<T> for FnHandler<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, payload: T) -> Result<(), HandlerError> {
        (self.0)(payload).await
    }
}
