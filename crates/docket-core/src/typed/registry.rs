//! TypedRegistry - ペイロード型タグ → Handler
//!
//! 起動時に一度だけ組み立て、以降は `Arc` で各ループから読み取り専用で共有する。
//!
//! # 学習ポイント
//! - `btree_map::Entry` による重複登録の検出
//! - 型消去された `DynHandler` の保持

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::Task;
use crate::domain::Envelope;
use crate::error::HandlerError;

/// Handlers of the generic queue, keyed by `Task::TYPE`.
///
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<SendInvoice, _>(SendInvoiceHandler)?;
/// let handler = registry.handler_for("billing.send_invoice.v1")?;
/// ```
#[derive(Default)]
pub struct TypedRegistry {
    // ordered, so `registered_types` is stable
    by_type: BTreeMap<&'static str, Arc<dyn DynHandler>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for task type '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One handler per tag; a second registration for the same tag fails.
    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        match self.by_type.entry(T::TYPE) {
            Entry::Occupied(taken) => Err(RegistryError::AlreadyRegistered(taken.key().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(TypedHandler::new(handler)));
                Ok(())
            }
        }
    }

    /// The handler bound to `payload_type`.
    pub fn handler_for(&self, payload_type: &str) -> Result<&Arc<dyn DynHandler>, HandlerError> {
        self.by_type.get(payload_type).ok_or_else(|| {
            HandlerError::new(format!(
                "no handler registered for payload type '{payload_type}'"
            ))
        })
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.by_type.keys().map(|tag| tag.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

/// The registry is the handler of the generic queue.
#[async_trait]
impl Handler<Envelope> for TypedRegistry {
    async fn handle(&self, envelope: Envelope) -> Result<(), HandlerError> {
        let handler = self.handler_for(envelope.payload_type())?;
        handler.handle_dyn(envelope.into_payload()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::fixtures::{AnotherTestTaskHandler, TestTaskHandler};
    use crate::typed::task::fixtures::{AnotherTestTask, TestTask};

    #[test]
    fn handler_is_found_by_its_tag() {
        let mut registry = TypedRegistry::new();
        assert!(registry.is_empty());
        registry.register::<TestTask, _>(TestTaskHandler).unwrap();

        let handler = registry.handler_for(TestTask::TYPE).unwrap();
        assert_eq!(handler.task_type(), TestTask::TYPE);
        assert!(registry.handler_for(AnotherTestTask::TYPE).is_err());
    }

    #[test]
    fn second_registration_keeps_the_first_handler() {
        let mut registry = TypedRegistry::new();
        registry.register::<TestTask, _>(TestTaskHandler).unwrap();
        let result = registry.register::<TestTask, _>(TestTaskHandler);
        match result {
            Err(RegistryError::AlreadyRegistered(tag)) => assert_eq!(tag, TestTask::TYPE),
            other => panic!("expected AlreadyRegistered, got {other:?}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registered_types_are_sorted() {
        let mut registry = TypedRegistry::new();
        registry.register::<TestTask, _>(TestTaskHandler).unwrap();
        registry
            .register::<AnotherTestTask, _>(AnotherTestTaskHandler)
            .unwrap();
        assert_eq!(
            registry.registered_types(),
            vec![AnotherTestTask::TYPE.to_string(), TestTask::TYPE.to_string()]
        );
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn dispatches_by_payload_type() {
        let mut registry = TypedRegistry::new();
        registry.register::<TestTask, _>(TestTaskHandler).unwrap();

        let ok = TestTask { value: 1 }.to_envelope().unwrap();
        registry.handle(ok).await.unwrap();

        let failing = TestTask { value: -5 }.to_envelope().unwrap();
        let err = registry.handle(failing).await.unwrap_err();
        assert_eq!(err.message(), "negative value -5");
    }

    #[tokio::test]
    async fn unknown_payload_type_fails() {
        let registry = TypedRegistry::new();
        let env = Envelope::new("nobody.listens.v1", serde_json::json!({}));
        let err = registry.handle(env).await.unwrap_err();
        assert!(err.message().contains("nobody.listens.v1"));
    }
}
