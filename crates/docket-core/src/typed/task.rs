//! Task trait - binds a payload type to its type tag.
//!
//! # Trait bounds
//! - `Serialize`: stored as JSON inside an `Envelope`
//! - `DeserializeOwned`: decoded back before the handler runs
//! - `Send + Sync + 'static`: handlers live behind `Arc` across tasks

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::Envelope;

/// A payload that can travel on the generic queue.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SendInvoice {
///     invoice_id: u64,
/// }
///
/// impl Task for SendInvoice {
///     const TYPE: &'static str = "billing.send_invoice.v1";
/// }
/// ```
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type tag, `{namespace}.{name}.v{major}` by convention.
    const TYPE: &'static str;

    fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        Ok(Envelope::new(Self::TYPE, serde_json::to_value(self)?))
    }
}
