//! RELAY Events - Listener Registry and Dispatch
//!
//! This crate binds typed listeners to payload types and delivers events to
//! them. Storage lives in `relay-core`; this crate owns the registry and the
//! delivery algorithms.
//!
//! # Delivery Models
//!
//! ```text
//!   trigger   synchronous, caller keeps the event, nothing is stored
//!   run       per-type batches, FIFO within a type, types in any order
//!   run_bus   one shared queue, FIFO across every type
//! ```
//!
//! Within one type, listeners fire newest first. Payloads with drop glue are
//! destroyed by a reserved teardown delegate after every user listener has
//! seen them.
//!
//! # Key Types
//!
//! - `Dispatcher`: registry plus the three delivery paths
//! - `Delegate<A>`: comparable listener handle (`EventDelegate<T>`, `ViewDelegate`)
//! - `DelegateKey` / `Identity` / `BindingKind`: how delegates are told apart

mod delegate;
mod dispatcher;
mod event_data;

pub use delegate::{BindingKind, Delegate, DelegateKey, EventDelegate, Identity, ViewDelegate};
pub use dispatcher::Dispatcher;

// Re-export core types for convenience
pub use relay_core::{
    Batcher, DispatchError, EventInfo, QueueError, RelayConfig, RelayError, RelayResult, TypeKey,
    Viewer,
};
