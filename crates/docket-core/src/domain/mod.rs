//! Domain model (ids, statuses, items, envelopes).

pub mod envelope;
pub mod ids;
pub mod item;
pub mod status;

pub use envelope::Envelope;
pub use ids::ItemId;
pub use item::QueuedItem;
pub use status::{FailureDetail, Status, StatusKind};
