//! Queue options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Tunables of one queue.
///
/// Durations (de)serialize as fractional seconds, so a TOML file can say
/// `poll_interval = 0.5`. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    /// Name used in logs (and by drivers as the collection name).
    pub collection: String,

    /// How often the main loop polls for enqueued items.
    #[serde(with = "secs_f64")]
    pub poll_interval: Duration,

    /// How often the retry loop polls for failed items.
    #[serde(with = "secs_f64")]
    pub failed_poll_interval: Duration,

    /// How often the reaper looks for expired leases.
    #[serde(with = "secs_f64")]
    pub orphaned_poll_interval: Duration,

    /// A `Processing` head older than this is treated as orphaned.
    #[serde(with = "secs_f64")]
    pub processing_timeout: Duration,

    /// Dequeue inserted items straight from the store's change feed.
    pub use_push_notification: bool,

    /// Pause before resubscribing after the change feed drops.
    #[serde(with = "secs_f64")]
    pub feed_retry_delay: Duration,

    /// Retry table in seconds; entry `n` is the delay after the `n`-th failure.
    pub retry_intervals: Vec<u64>,

    /// Keep the handler error on the `Failed` status.
    pub persist_failure_detail: bool,

    /// Delete items instead of marking them `Processed`.
    pub delete_on_success: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            collection: "queue_items".to_string(),
            poll_interval: Duration::from_secs(1),
            failed_poll_interval: Duration::from_secs(10),
            orphaned_poll_interval: Duration::from_secs(60),
            processing_timeout: Duration::from_secs(30 * 60),
            use_push_notification: false,
            feed_retry_delay: Duration::from_millis(100),
            retry_intervals: vec![1, 2, 10, 30, 60, 3600],
            persist_failure_detail: false,
            delete_on_success: false,
        }
    }
}

impl QueueOptions {
    /// Reject options the loops cannot run with.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.processing_timeout.is_zero() {
            return Err(QueueError::InvalidOptions(
                "processing_timeout must be greater than zero".into(),
            ));
        }
        for (name, interval) in [
            ("poll_interval", self.poll_interval),
            ("failed_poll_interval", self.failed_poll_interval),
            ("orphaned_poll_interval", self.orphaned_poll_interval),
        ] {
            if interval.is_zero() {
                return Err(QueueError::InvalidOptions(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if chrono::Duration::from_std(self.processing_timeout).is_err() {
            return Err(QueueError::InvalidOptions(
                "processing_timeout is out of range".into(),
            ));
        }
        Ok(())
    }
}

mod secs_f64 {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = QueueOptions::default();
        assert_eq!(o.poll_interval, Duration::from_secs(1));
        assert_eq!(o.failed_poll_interval, Duration::from_secs(10));
        assert_eq!(o.orphaned_poll_interval, Duration::from_secs(60));
        assert_eq!(o.processing_timeout, Duration::from_secs(1800));
        assert_eq!(o.retry_intervals, vec![1, 2, 10, 30, 60, 3600]);
        assert!(!o.use_push_notification);
        assert!(!o.persist_failure_detail);
        assert!(!o.delete_on_success);
        assert!(o.validate().is_ok());
    }

    #[test]
    fn zero_processing_timeout_is_rejected() {
        let o = QueueOptions {
            processing_timeout: Duration::ZERO,
            ..QueueOptions::default()
        };
        assert!(matches!(o.validate(), Err(QueueError::InvalidOptions(_))));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let o = QueueOptions {
            failed_poll_interval: Duration::ZERO,
            ..QueueOptions::default()
        };
        let err = o.validate().unwrap_err();
        assert!(err.to_string().contains("failed_poll_interval"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let o: QueueOptions = serde_json::from_str(
            r#"{"poll_interval": 0.25, "delete_on_success": true, "retry_intervals": [5]}"#,
        )
        .unwrap();
        assert_eq!(o.poll_interval, Duration::from_millis(250));
        assert!(o.delete_on_success);
        assert_eq!(o.retry_intervals, vec![5]);
        assert_eq!(o.processing_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn negative_durations_do_not_parse() {
        let res: Result<QueueOptions, _> = serde_json::from_str(r#"{"poll_interval": -1.0}"#);
        assert!(res.is_err());
    }
}
