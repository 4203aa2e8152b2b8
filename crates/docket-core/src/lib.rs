//! docket-core
//!
//! Durable work queue over a document store.
//!
//! # Modules
//! - **domain**: items, status history, ids, envelopes
//! - **ports**: `ItemStore` (the document store) and `Clock`
//! - **queue**: the engine (`Queue`), options and retry policy
//! - **typed**: typed payloads for the generic queue (`Task`, `Handler`, `TypedRegistry`)
//! - **app**: `AppBuilder`, producer and the scheduler loops
//! - **impls**: in-memory store
//! - **error**, **observability**: error types and queue counts

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod typed;
