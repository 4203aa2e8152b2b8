use std::error::Error as StdError;
use std::fmt::Write as _;

use thiserror::Error;

use crate::domain::{FailureDetail, ItemId};

/// Persistence adapter failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An item with this id already exists.
    #[error("duplicate item id {0}")]
    DuplicateId(ItemId),

    /// Items are stored with at least one status.
    #[error("item {0} has an empty status history")]
    EmptyHistory(ItemId),

    #[error("change feed is not supported by this store")]
    FeedUnsupported,

    #[error("change feed lagged, {0} events dropped")]
    FeedLagged(u64),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Infrastructure failure (connection, timeout, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Queue engine failures.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every disambiguation counter for this timestamp was taken.
    #[error("unable to find a unique id for base {base} after {attempts} attempts")]
    IdSpaceExhausted { base: ItemId, attempts: u32 },

    #[error("invalid queue options: {0}")]
    InvalidOptions(String),

    #[error("payload encode: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Error returned by a payload handler.
///
/// The engine turns it into a `Failed` / `FinallyFailed` status; it never
/// reaches the loop that called `dequeue`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    detail: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: String::new(),
        }
    }

    /// Capture an error and its `source()` chain.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut detail = String::new();
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(detail, "caused by: {cause}");
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            detail,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn to_failure_detail(&self) -> FailureDetail {
        FailureDetail {
            message: self.message.clone(),
            stack: self.detail.clone(),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("json decode: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner")]
    struct Inner;

    #[test]
    fn from_error_records_source_chain() {
        let err = HandlerError::from_error(&Outer(Inner));
        assert_eq!(err.message(), "outer");
        assert_eq!(err.detail(), "caused by: inner\n");
        assert_eq!(err.to_string(), "outer");
    }

    #[test]
    fn failure_detail_copies_message_and_detail() {
        let detail = HandlerError::new("boom")
            .with_detail("at step 3")
            .to_failure_detail();
        assert_eq!(detail.message, "boom");
        assert_eq!(detail.stack, "at step 3");
    }
}
