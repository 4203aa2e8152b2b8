//! Ports - the seams to the outside world.
//!
//! - **ItemStore**: the document store (source of truth for items)
//! - **Clock**: "now", swappable in tests

pub mod clock;
pub mod item_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::item_store::{ChangeEvent, ChangeOperation, ChangeStream, HeadFilter, ItemStore};
