//! RELAY Core - Event Storage
//!
//! Type-erased storage primitives for the RELAY dispatcher. Nothing in this
//! crate knows about listeners; it only stages, views and orders payloads.
//!
//! # Architecture
//!
//! ```text
//!             per payload type                     across payload types
//!   ┌────────────────────────────────┐     ┌─────────────────────────────┐
//!   │ Batcher<T> ──push──→ Arena     │     │ EventQueue (one page)       │
//!   │                      │         │     │ [hdr|A][hdr|B][hdr|A] ...   │
//!   │ Viewer<T> ←─as_slice─┘         │     │  read ──→            ←── write
//!   └────────────────────────────────┘     └─────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - `Arena`: growable 64-byte aligned buffer holding one payload type at a time
//! - `Batcher<T>`: typed append-only facade over an arena
//! - `Viewer<T>`: zero-copy read-only slice of staged values
//! - `EventQueue`: fixed page of tagged records in emission order
//! - `TypeKey` / `EventInfo`: payload identity and layout
//! - `RelayConfig`: page size and arena pre-reservation

mod arena;
mod batcher;
mod config;
mod error;
mod info;
mod queue;
mod viewer;

pub use arena::{Arena, ARENA_ALIGN};
pub use batcher::Batcher;
pub use config::{RelayConfig, MAX_ARENA_INITIAL_CAPACITY, MIN_QUEUE_PAGE_SIZE};
pub use error::{
    fatal, ArenaError, ConfigError, DispatchError, QueueError, RelayError, RelayResult,
};
pub use info::{stride_of, EventInfo, TypeKey};
pub use queue::{EventQueue, MAX_RECORD_SIZE, PAGE_ALIGN, PAGE_SIZE};
pub use viewer::Viewer;
