//! Event Module - lookup lifecycle notifications
//!
//! Key types:
//! - `LookupEvent`: Envelope with id + timestamp + kind
//! - `EventKind`: binding / search / panel / selection events
//! - `EventLog`: Thread-safe, append-only log
//! - `EventEmitter`: Trait for dependency injection
//! - `NoopEmitter`: Zero-cost no-op for hosts that don't listen

mod emitter;
mod log;

pub use emitter::{EventEmitter, NoopEmitter};
pub use log::{EventKind, EventLog, LookupEvent};
