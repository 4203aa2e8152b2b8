//! Typed - typed payload API for the generic queue.
//!
//! Two layers:
//! - **Typed**: `Task` trait, `Handler<T>` trait - checked at compile time
//! - **Dyn**: `DynHandler` trait - object-safe, type-erased, stored in the registry

pub mod handler;
pub mod registry;
pub mod task;

pub use self::handler::{DynHandler, FnHandler, Handler, TypedHandler, handler_fn};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::Task;
