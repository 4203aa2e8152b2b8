//! Queue module: options, retry policy and the queue engine.

mod engine;
mod options;
mod retry;

pub use engine::{MAX_UNIQUE_ID_ATTEMPTS, Queue};
pub use options::QueueOptions;
pub use retry::{RetryDecision, RetryPolicy};
